use eframe::egui;

use crate::ui::app_state::ChargeSlotApp;

impl ChargeSlotApp {
    /// Blocking notice; nothing else is clickable until it is acknowledged
    pub fn render_notice_modal(&mut self, ctx: &egui::Context) {
        let Some(notice) = self.notice.clone() else {
            return;
        };

        let screen = ctx.screen_rect();
        egui::Area::new(egui::Id::new("notice_backdrop"))
            .order(egui::Order::Middle)
            .fixed_pos(screen.min)
            .show(ctx, |ui| {
                let (rect, _) = ui.allocate_exact_size(screen.size(), egui::Sense::click());
                ui.painter()
                    .rect_filled(rect, egui::Rounding::ZERO, egui::Color32::from_black_alpha(96));
            });

        egui::Window::new("Notice")
            .collapsible(false)
            .resizable(false)
            .order(egui::Order::Foreground)
            .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
            .show(ctx, |ui| {
                ui.label(notice);
                ui.add_space(8.0);
                if ui.button("OK").clicked() || ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                    self.notice = None;
                }
            });
    }
}
