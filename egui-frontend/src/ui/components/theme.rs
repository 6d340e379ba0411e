//! # Theme Configuration
//!
//! Centralized colors for the charge slot calendar. Widgets pull their
//! colors from here rather than hard-coding them.

pub mod colors {
    use eframe::egui::Color32;

    /// Free slot button
    pub const FREE_CELL: Color32 = Color32::WHITE;
    /// Slot reserved by the signed-in user
    pub const MINE_CELL: Color32 = Color32::from_rgb(134, 239, 172);
    /// Slot reserved by anyone else
    pub const TAKEN_CELL: Color32 = Color32::from_rgb(209, 213, 219);

    pub const CELL_BORDER: Color32 = Color32::from_rgb(156, 163, 175);
    pub const CELL_TEXT: Color32 = Color32::from_rgb(31, 41, 55);
    pub const TAKEN_CELL_TEXT: Color32 = Color32::from_rgb(75, 85, 99);

    pub const DAY_HEADER_BACKGROUND: Color32 = Color32::from_rgb(243, 244, 246);
    pub const DAY_HEADER_TEXT: Color32 = Color32::from_rgb(17, 24, 39);

    pub const LOGIN_BUTTON: Color32 = Color32::from_rgb(37, 99, 235);

    pub const ERROR_BACKGROUND: Color32 = Color32::from_rgb(254, 226, 226);
    pub const ERROR_TEXT: Color32 = Color32::from_rgb(153, 27, 27);
}
