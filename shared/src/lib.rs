use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use chrono::{Duration, NaiveDate};

/// Date format used by the reservations table ("YYYY-MM-DD")
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Number of days shown in the reservation calendar
pub const DAY_WINDOW_LENGTH: usize = 7;

/// Signed-in user as reported by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl User {
    /// Email for greeting purposes, falling back to the raw id
    pub fn display_name(&self) -> &str {
        self.email.as_deref().unwrap_or(&self.id)
    }
}

/// Store-assigned reservation identifier.
///
/// The reservations table may use an integer or a uuid primary key, so the id
/// is accepted in either JSON form and carried around as an opaque string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReservationId(String);

impl ReservationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for ReservationId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ReservationId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Int(i64),
            Str(String),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Int(n) => ReservationId(n.to_string()),
            RawId::Str(s) => ReservationId(s),
        })
    }
}

/// One user's claim on one (date, time slot) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    /// ID of the user owning this reservation
    pub user_id: String,
    /// Calendar day in "YYYY-MM-DD" form
    pub date: String,
    /// Slot label, one of the `TimeSlot` labels
    pub time_slot: String,
}

impl Reservation {
    /// Whether this row occupies the given cell (value equality on date and label)
    pub fn matches(&self, date: &str, slot: TimeSlot) -> bool {
        self.date == date && self.time_slot == slot.label()
    }

    pub fn is_owned_by(&self, user: &User) -> bool {
        self.user_id == user.id
    }
}

/// Insert payload for a new reservation row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReservation {
    pub user_id: String,
    pub date: String,
    pub time_slot: String,
}

/// One-hour evening charging windows, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TimeSlot {
    #[serde(rename = "18:00-19:00")]
    Evening18,
    #[serde(rename = "19:00-20:00")]
    Evening19,
    #[serde(rename = "20:00-21:00")]
    Evening20,
    #[serde(rename = "21:00-22:00")]
    Evening21,
    #[serde(rename = "22:00-23:00")]
    Evening22,
}

impl TimeSlot {
    pub const ALL: [TimeSlot; 5] = [
        TimeSlot::Evening18,
        TimeSlot::Evening19,
        TimeSlot::Evening20,
        TimeSlot::Evening21,
        TimeSlot::Evening22,
    ];

    /// Label stored in the `time_slot` column
    pub fn label(&self) -> &'static str {
        match self {
            TimeSlot::Evening18 => "18:00-19:00",
            TimeSlot::Evening19 => "19:00-20:00",
            TimeSlot::Evening20 => "20:00-21:00",
            TimeSlot::Evening21 => "21:00-22:00",
            TimeSlot::Evening22 => "22:00-23:00",
        }
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimeSlotParseError(pub String);

impl fmt::Display for TimeSlotParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown time slot label: {}", self.0)
    }
}

impl std::error::Error for TimeSlotParseError {}

impl FromStr for TimeSlot {
    type Err = TimeSlotParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TimeSlot::ALL
            .iter()
            .copied()
            .find(|slot| slot.label() == s)
            .ok_or_else(|| TimeSlotParseError(s.to_string()))
    }
}

/// Seven consecutive days starting at a reference date.
///
/// Computed once when the calendar loads; it does not roll over with the clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayWindow {
    days: Vec<NaiveDate>,
}

impl DayWindow {
    pub fn starting_at(reference_date: NaiveDate) -> Self {
        let days = (0..DAY_WINDOW_LENGTH as i64)
            .map(|offset| reference_date + Duration::days(offset))
            .collect();
        Self { days }
    }

    pub fn days(&self) -> &[NaiveDate] {
        &self.days
    }

    pub fn first(&self) -> Option<NaiveDate> {
        self.days.first().copied()
    }

    pub fn last(&self) -> Option<NaiveDate> {
        self.days.last().copied()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.days.contains(&date)
    }
}

/// Format a date the way the reservations table stores it
pub fn format_reservation_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Rendering state of a single calendar cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellState {
    /// No reservation for this (date, slot)
    Free,
    /// Reserved by the current user
    Mine,
    /// Reserved by someone else (or by anyone, when signed out)
    Taken,
}

/// What a click on a cell dispatches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellAction {
    Reserve,
    Cancel,
}

impl CellState {
    /// Mine cancels; free and taken both attempt a reserve, which the
    /// existence guard turns into a no-op for taken cells.
    pub fn action(&self) -> CellAction {
        match self {
            CellState::Mine => CellAction::Cancel,
            CellState::Free | CellState::Taken => CellAction::Reserve,
        }
    }
}

/// One (day, slot) cell of the reservation grid
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarCell {
    pub date: NaiveDate,
    pub slot: TimeSlot,
    pub state: CellState,
    /// Row backing this cell, when reserved
    pub reservation_id: Option<ReservationId>,
}

impl CalendarCell {
    pub fn iso_date(&self) -> String {
        format_reservation_date(self.date)
    }

    pub fn action(&self) -> CellAction {
        self.state.action()
    }

    /// Button text for this cell
    pub fn label(&self) -> String {
        match self.state {
            CellState::Free => self.slot.label().to_string(),
            CellState::Mine => format!("{} (mine)", self.slot.label()),
            CellState::Taken => format!("{} (taken)", self.slot.label()),
        }
    }
}

/// A day column of the reservation grid
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarDay {
    pub date: NaiveDate,
    /// "YYYY-MM-DD" used for matching reservations
    pub iso_date: String,
    /// Column header, e.g. "Wed 01/10"
    pub header_label: String,
    pub cells: Vec<CalendarCell>,
}

/// Full week × slot grid
#[derive(Debug, Clone, PartialEq)]
pub struct ReservationGrid {
    pub days: Vec<CalendarDay>,
}

impl ReservationGrid {
    pub fn cells(&self) -> impl Iterator<Item = &CalendarCell> {
        self.days.iter().flat_map(|day| day.cells.iter())
    }

    pub fn cell(&self, date: NaiveDate, slot: TimeSlot) -> Option<&CalendarCell> {
        self.cells().find(|cell| cell.date == date && cell.slot == slot)
    }
}

/// Kind of row-level change pushed by the change feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
    Other,
}

impl ChangeKind {
    pub fn from_wire(kind: &str) -> Self {
        match kind.to_ascii_uppercase().as_str() {
            "INSERT" => ChangeKind::Insert,
            "UPDATE" => ChangeKind::Update,
            "DELETE" => ChangeKind::Delete,
            _ => ChangeKind::Other,
        }
    }
}

/// Notification that rows of a table changed; which rows is not reported
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: String,
    pub kind: ChangeKind,
}
