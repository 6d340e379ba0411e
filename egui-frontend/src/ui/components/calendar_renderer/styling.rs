use eframe::egui::{self, Color32};
use shared::CellState;

use crate::ui::components::theme::colors;

/// Spacing in pixels between calendar columns and cells
pub const CALENDAR_CARD_SPACING: f32 = 6.0;

/// Height of a single slot button
pub const CELL_HEIGHT: f32 = 48.0;

/// Calendar header styling constants
pub mod header {
    /// Height for day headers
    pub const HEADER_HEIGHT: f32 = 30.0;

    /// Font size for day headers
    pub const HEADER_FONT_SIZE: f32 = 14.0;
}

/// Background of a slot button
pub fn cell_fill(state: CellState) -> Color32 {
    match state {
        CellState::Free => colors::FREE_CELL,
        CellState::Mine => colors::MINE_CELL,
        CellState::Taken => colors::TAKEN_CELL,
    }
}

pub fn cell_text_color(state: CellState) -> Color32 {
    match state {
        CellState::Taken => colors::TAKEN_CELL_TEXT,
        CellState::Free | CellState::Mine => colors::CELL_TEXT,
    }
}

pub fn cell_stroke() -> egui::Stroke {
    egui::Stroke::new(1.0, colors::CELL_BORDER)
}

/// Hover text describing what a click will do
pub fn cell_hover_text(state: CellState) -> &'static str {
    match state {
        CellState::Free => "Click to reserve this slot",
        CellState::Mine => "Click to cancel your reservation",
        CellState::Taken => "Reserved by someone else",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_state_has_a_distinct_fill() {
        let fills = [
            cell_fill(CellState::Free),
            cell_fill(CellState::Mine),
            cell_fill(CellState::Taken),
        ];
        assert_ne!(fills[0], fills[1]);
        assert_ne!(fills[1], fills[2]);
        assert_ne!(fills[0], fills[2]);
    }

    #[test]
    fn test_mine_is_green_and_taken_is_gray() {
        assert_eq!(cell_fill(CellState::Mine), Color32::from_rgb(134, 239, 172));
        assert_eq!(cell_fill(CellState::Taken), Color32::from_rgb(209, 213, 219));
        assert_eq!(cell_fill(CellState::Free), Color32::WHITE);
    }

    #[test]
    fn test_hover_text_matches_click_behaviour() {
        assert!(cell_hover_text(CellState::Mine).contains("cancel"));
        assert!(cell_hover_text(CellState::Free).contains("reserve"));
    }
}
