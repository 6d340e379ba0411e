//! # App Coordinator Module
//!
//! Main update loop of the application.
//!
//! ## Application Flow:
//! 1. Apply results of finished background work
//! 2. Render header (greeting or login button)
//! 3. Render loading screen OR the reservation grid
//! 4. Render error banner and any active modal

use eframe::egui;

use crate::ui::app_state::ChargeSlotApp;

impl eframe::App for ChargeSlotApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.process_messages();

        if self.login_modal.open && ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            self.dismiss_login();
        }

        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            self.render_header(ui);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.render_error_banner(ui);

            if self.loading {
                self.render_loading_screen(ui);
                return;
            }

            self.render_calendar(ui);
        });

        self.render_modals(ctx);
    }
}

impl ChargeSlotApp {
    /// Render the loading screen
    pub fn render_loading_screen(&self, ui: &mut egui::Ui) {
        ui.vertical_centered(|ui| {
            ui.add_space(100.0);
            ui.spinner();
            ui.label("Loading reservations...");
        });
    }
}
