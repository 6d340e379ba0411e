//! # Calendar Renderer
//!
//! Draws the reservation grid: seven day columns with a header each and one
//! button per evening slot. The grid is rebuilt every frame from the
//! backend's current reservation list, so a reload from the change feed
//! shows up on the next repaint without any extra bookkeeping here.

use eframe::egui;
use shared::{CalendarCell, CalendarDay};

use super::styling::*;
use crate::ui::app_state::ChargeSlotApp;
use crate::ui::components::theme::colors;

impl ChargeSlotApp {
    /// Render the full reservation grid
    pub fn render_calendar(&mut self, ui: &mut egui::Ui) {
        let reservations = self.backend.reservation_service.reservations();
        let grid = self.backend.calendar_service.generate_grid(
            &self.day_window,
            &reservations,
            self.current_user.as_ref(),
        );

        let mut clicked: Option<CalendarCell> = None;

        ui.spacing_mut().item_spacing = egui::vec2(CALENDAR_CARD_SPACING, CALENDAR_CARD_SPACING);
        ui.columns(grid.days.len().max(1), |columns| {
            for (column, day) in columns.iter_mut().zip(grid.days.iter()) {
                if let Some(cell) = draw_day_column(column, day) {
                    clicked = Some(cell);
                }
            }
        });

        if let Some(cell) = clicked {
            let ctx = ui.ctx().clone();
            self.dispatch_cell(&ctx, cell);
        }
    }
}

/// Draw one day column, returning the cell that was clicked, if any
fn draw_day_column(ui: &mut egui::Ui, day: &CalendarDay) -> Option<CalendarCell> {
    draw_day_header(ui, &day.header_label);

    let mut clicked = None;
    for cell in &day.cells {
        if draw_cell(ui, cell).clicked() {
            clicked = Some(cell.clone());
        }
    }
    clicked
}

fn draw_day_header(ui: &mut egui::Ui, label: &str) {
    egui::Frame::none()
        .fill(colors::DAY_HEADER_BACKGROUND)
        .rounding(egui::Rounding::same(4.0))
        .show(ui, |ui| {
            ui.set_min_height(header::HEADER_HEIGHT);
            ui.centered_and_justified(|ui| {
                ui.label(
                    egui::RichText::new(label)
                        .size(header::HEADER_FONT_SIZE)
                        .strong()
                        .color(colors::DAY_HEADER_TEXT),
                );
            });
        });
}

fn draw_cell(ui: &mut egui::Ui, cell: &CalendarCell) -> egui::Response {
    let text = egui::RichText::new(cell.label()).color(cell_text_color(cell.state));
    let button = egui::Button::new(text)
        .fill(cell_fill(cell.state))
        .stroke(cell_stroke())
        .rounding(egui::Rounding::same(4.0))
        .min_size(egui::vec2(ui.available_width(), CELL_HEIGHT));

    ui.add(button).on_hover_text(cell_hover_text(cell.state))
}
