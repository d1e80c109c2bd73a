use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
    ClockIn,
    ClockOut,
    StandUp,
    LunchOut,
    LunchIn,
}

impl EventKind {
    /// Only clock-in/out participate in the toggle state machine.
    pub fn is_clock_action(self) -> bool {
        matches!(self, EventKind::ClockIn | EventKind::ClockOut)
    }

    pub fn is_arrival(self) -> bool {
        self == EventKind::ClockIn
    }

    pub fn is_departure(self) -> bool {
        self == EventKind::ClockOut
    }

    pub fn opposite(self) -> Option<EventKind> {
        match self {
            EventKind::ClockIn => Some(EventKind::ClockOut),
            EventKind::ClockOut => Some(EventKind::ClockIn),
            _ => None,
        }
    }
}

/// Immutable entry of the event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClockEvent {
    pub employee_id: u64,
    pub kind: EventKind,
    pub timestamp: NaiveDateTime,
    pub actor: String,
    pub location: Option<String>,
}

impl ClockEvent {
    pub fn new(employee_id: u64, kind: EventKind, timestamp: NaiveDateTime) -> Self {
        Self {
            employee_id,
            kind,
            timestamp,
            actor: "system".to_string(),
            location: None,
        }
    }

    pub fn by(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }

    pub fn at_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }
}
