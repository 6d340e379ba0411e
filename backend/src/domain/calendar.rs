//! Calendar domain logic for the charge slot calendar.
//!
//! Builds the week × slot grid from the day window, the fixed slot list, the
//! reservation list and the current user. Everything here is pure; the UI
//! only handles presentation and dispatching the cell actions.

use chrono::{Local, NaiveDate};
use shared::{
    format_reservation_date, CalendarCell, CalendarDay, CellState, DayWindow, Reservation,
    ReservationGrid, TimeSlot, User,
};
use tracing::debug;

/// Calendar service that handles all grid-related business logic
#[derive(Clone, Debug, Default)]
pub struct CalendarService;

impl CalendarService {
    pub fn new() -> Self {
        Self
    }

    /// Seven days starting at `reference_date`
    pub fn day_window(&self, reference_date: NaiveDate) -> DayWindow {
        DayWindow::starting_at(reference_date)
    }

    /// Day window starting from the host's local date
    pub fn current_day_window(&self) -> DayWindow {
        self.day_window(Local::now().date_naive())
    }

    /// First reservation matching (date, slot) in list order.
    ///
    /// A linear scan; duplicate rows for the same cell are possible and only
    /// the first one is ever displayed.
    pub fn find_reservation<'a>(
        &self,
        reservations: &'a [Reservation],
        date: &str,
        slot: TimeSlot,
    ) -> Option<&'a Reservation> {
        reservations.iter().find(|r| r.matches(date, slot))
    }

    /// State of a cell given its matching reservation and the current user
    pub fn cell_state(&self, reservation: Option<&Reservation>, user: Option<&User>) -> CellState {
        match (reservation, user) {
            (None, _) => CellState::Free,
            (Some(r), Some(u)) if r.is_owned_by(u) => CellState::Mine,
            (Some(_), _) => CellState::Taken,
        }
    }

    /// Column header, e.g. "Wed 01/10"
    pub fn format_day_header(&self, date: NaiveDate) -> String {
        date.format("%a %m/%d").to_string()
    }

    /// Generate the full grid: one column per day, one cell per slot
    pub fn generate_grid(
        &self,
        window: &DayWindow,
        reservations: &[Reservation],
        user: Option<&User>,
    ) -> ReservationGrid {
        let days: Vec<CalendarDay> = window
            .days()
            .iter()
            .map(|&date| {
                let iso_date = format_reservation_date(date);
                let cells = TimeSlot::ALL
                    .iter()
                    .map(|&slot| {
                        let reservation = self.find_reservation(reservations, &iso_date, slot);
                        CalendarCell {
                            date,
                            slot,
                            state: self.cell_state(reservation, user),
                            reservation_id: reservation.map(|r| r.id.clone()),
                        }
                    })
                    .collect();

                CalendarDay {
                    date,
                    header_label: self.format_day_header(date),
                    iso_date,
                    cells,
                }
            })
            .collect();

        debug!(
            "Generated grid with {} days from {} reservations",
            days.len(),
            reservations.len()
        );

        ReservationGrid { days }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::ReservationId;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn user(id: &str) -> User {
        User {
            id: id.to_string(),
            email: Some(format!("{}@example.com", id)),
        }
    }

    fn reservation(id: &str, user_id: &str, date: &str, slot: &str) -> Reservation {
        Reservation {
            id: ReservationId::new(id),
            user_id: user_id.to_string(),
            date: date.to_string(),
            time_slot: slot.to_string(),
        }
    }

    #[test]
    fn test_day_window_from_reference_date() {
        let service = CalendarService::new();
        let window = service.day_window(date(2024, 1, 10));

        assert_eq!(window.days().len(), 7);
        assert_eq!(window.first(), Some(date(2024, 1, 10)));
        assert_eq!(window.last(), Some(date(2024, 1, 16)));
    }

    #[test]
    fn test_grid_always_has_35_cells() {
        let service = CalendarService::new();
        let window = service.day_window(date(2024, 1, 10));

        let empty = service.generate_grid(&window, &[], None);
        assert_eq!(empty.cells().count(), 35);

        let busy: Vec<Reservation> = (0..20)
            .map(|i| reservation(&i.to_string(), "u1", "2024-01-11", "18:00-19:00"))
            .chain(std::iter::once(reservation("99", "u2", "2031-05-05", "19:00-20:00")))
            .collect();
        let grid = service.generate_grid(&window, &busy, Some(&user("u1")));
        assert_eq!(grid.cells().count(), 35);
        assert_eq!(grid.days.len(), 7);
        assert!(grid.days.iter().all(|d| d.cells.len() == 5));
    }

    #[test]
    fn test_cell_states() {
        let service = CalendarService::new();
        let window = service.day_window(date(2024, 1, 10));
        let rows = vec![reservation("1", "u1", "2024-01-10", "18:00-19:00")];

        let as_owner = service.generate_grid(&window, &rows, Some(&user("u1")));
        let cell = as_owner.cell(date(2024, 1, 10), TimeSlot::Evening18).unwrap();
        assert_eq!(cell.state, CellState::Mine);
        assert_eq!(cell.reservation_id, Some(ReservationId::new("1")));

        let as_other = service.generate_grid(&window, &rows, Some(&user("u2")));
        let cell = as_other.cell(date(2024, 1, 10), TimeSlot::Evening18).unwrap();
        assert_eq!(cell.state, CellState::Taken);

        let signed_out = service.generate_grid(&window, &rows, None);
        let cell = signed_out.cell(date(2024, 1, 10), TimeSlot::Evening18).unwrap();
        assert_eq!(cell.state, CellState::Taken);

        let free = signed_out.cell(date(2024, 1, 10), TimeSlot::Evening19).unwrap();
        assert_eq!(free.state, CellState::Free);
        assert_eq!(free.reservation_id, None);
    }

    #[test]
    fn test_duplicate_rows_show_first_match() {
        // Two racing reserves can leave two rows for one cell.
        let service = CalendarService::new();
        let window = service.day_window(date(2024, 1, 10));
        let rows = vec![
            reservation("1", "u2", "2024-01-12", "21:00-22:00"),
            reservation("2", "u1", "2024-01-12", "21:00-22:00"),
        ];

        let grid = service.generate_grid(&window, &rows, Some(&user("u1")));
        let cell = grid.cell(date(2024, 1, 12), TimeSlot::Evening21).unwrap();
        assert_eq!(cell.state, CellState::Taken);
        assert_eq!(cell.reservation_id, Some(ReservationId::new("1")));
    }

    #[test]
    fn test_rows_outside_window_are_ignored() {
        let service = CalendarService::new();
        let window = service.day_window(date(2024, 1, 10));
        let rows = vec![
            reservation("1", "u1", "2024-01-09", "18:00-19:00"),
            reservation("2", "u1", "2024-01-17", "18:00-19:00"),
            reservation("3", "u1", "2024-01-10", "17:00-18:00"),
        ];

        let grid = service.generate_grid(&window, &rows, Some(&user("u1")));
        assert!(grid.cells().all(|c| c.state == CellState::Free));
    }

    #[test]
    fn test_day_headers_and_iso_dates() {
        let service = CalendarService::new();
        let window = service.day_window(date(2024, 1, 10));
        let grid = service.generate_grid(&window, &[], None);

        assert_eq!(grid.days[0].header_label, "Wed 01/10");
        assert_eq!(grid.days[0].iso_date, "2024-01-10");
        assert_eq!(grid.days[6].header_label, "Tue 01/16");
    }

    #[test]
    fn test_cell_labels() {
        let service = CalendarService::new();
        let window = service.day_window(date(2024, 1, 10));
        let rows = vec![
            reservation("1", "u1", "2024-01-10", "18:00-19:00"),
            reservation("2", "u2", "2024-01-10", "19:00-20:00"),
        ];
        let grid = service.generate_grid(&window, &rows, Some(&user("u1")));
        let labels: Vec<String> = grid.days[0].cells.iter().map(|c| c.label()).collect();

        assert_eq!(labels[0], "18:00-19:00 (mine)");
        assert_eq!(labels[1], "19:00-20:00 (taken)");
        assert_eq!(labels[2], "20:00-21:00");
    }
}
