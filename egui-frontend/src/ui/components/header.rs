use eframe::egui;

use crate::ui::app_state::ChargeSlotApp;
use crate::ui::components::theme::colors;

impl ChargeSlotApp {
    /// Title plus either the greeting or the login button
    pub fn render_header(&mut self, ui: &mut egui::Ui) {
        ui.add_space(8.0);
        ui.horizontal(|ui| {
            ui.label(
                egui::RichText::new("🔌 Evening Charging Reservations")
                    .size(22.0)
                    .strong(),
            );

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if self.pending_actions > 0 {
                    ui.spinner();
                }

                match &self.current_user {
                    Some(user) => {
                        ui.label(format!("👋 Welcome, {}", user.display_name()));
                    }
                    None if !self.loading => {
                        let login_button = egui::Button::new(
                            egui::RichText::new("Log in / Sign up").color(egui::Color32::WHITE),
                        )
                        .fill(colors::LOGIN_BUTTON)
                        .rounding(egui::Rounding::same(4.0));

                        if ui.add(login_button).clicked() {
                            self.login_modal.open = true;
                        }
                    }
                    None => {}
                }
            });
        });
        ui.add_space(8.0);
    }

    /// Dismissable error banner above the grid
    pub fn render_error_banner(&mut self, ui: &mut egui::Ui) {
        let Some(message) = self.error_message.clone() else {
            return;
        };

        egui::Frame::none()
            .fill(colors::ERROR_BACKGROUND)
            .rounding(egui::Rounding::same(4.0))
            .inner_margin(egui::Margin::same(8.0))
            .show(ui, |ui| {
                ui.horizontal(|ui| {
                    ui.label(egui::RichText::new(message).color(colors::ERROR_TEXT));
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.small_button("✕").clicked() {
                            self.error_message = None;
                        }
                    });
                });
            });
        ui.add_space(8.0);
    }
}
