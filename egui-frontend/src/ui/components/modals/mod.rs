//! # Modals Module
//!
//! ## Module Organization:
//! - `login_modal` - Email prompt for the sign-in link
//! - `notice_modal` - Blocking notice the user acknowledges with OK

pub mod login_modal;
pub mod notice_modal;

use eframe::egui;

use crate::ui::app_state::ChargeSlotApp;

impl ChargeSlotApp {
    /// Render whichever modal is active
    pub fn render_modals(&mut self, ctx: &egui::Context) {
        self.render_login_modal(ctx);
        self.render_notice_modal(ctx);
    }
}
