//! # Login Modal
//!
//! Asks for an email address and requests a one-time sign-in link. Blank
//! input is submitted as-is; the identity service treats it as a no-op.

use eframe::egui;

use crate::ui::app_state::ChargeSlotApp;

impl ChargeSlotApp {
    pub fn render_login_modal(&mut self, ctx: &egui::Context) {
        if !self.login_modal.open {
            return;
        }

        let mut submit = false;
        let mut cancel = false;

        egui::Window::new("Log in / Sign up")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
            .show(ctx, |ui| {
                ui.label("Enter your email to receive a sign-in link:");
                ui.add_space(6.0);

                let response = ui.add(
                    egui::TextEdit::singleline(&mut self.login_modal.email_input)
                        .hint_text("you@example.com")
                        .desired_width(280.0),
                );
                if ui.memory(|m| m.focused().is_none()) {
                    response.request_focus();
                }
                if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                    submit = true;
                }

                ui.add_space(8.0);
                ui.horizontal(|ui| {
                    if ui.button("Send link").clicked() {
                        submit = true;
                    }
                    if ui.button("Cancel").clicked() {
                        cancel = true;
                    }
                });
            });

        if submit {
            self.submit_login(ctx);
        } else if cancel {
            self.dismiss_login();
        }
    }

    /// Close the prompt and forget what was typed
    pub fn dismiss_login(&mut self) {
        self.login_modal.open = false;
        self.login_modal.email_input.clear();
    }
}
