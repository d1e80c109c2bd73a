use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AttendanceStatus {
    Early,
    OnTime,
    Late,
    Absent,
}

impl AttendanceStatus {
    pub fn is_present(self) -> bool {
        self != AttendanceStatus::Absent
    }

    /// Early arrivals count as punctual.
    pub fn is_punctual(self) -> bool {
        matches!(self, AttendanceStatus::Early | AttendanceStatus::OnTime)
    }
}

/// Canonical daily fact, unique per (employee, date).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub employee_id: u64,
    pub date: NaiveDate,
    pub arrival_time: Option<NaiveTime>,
    pub departure_time: Option<NaiveTime>,
    pub status: AttendanceStatus,
    pub completion_percentage: f64,
    pub is_problematic_day: bool,
}

impl AttendanceRecord {
    /// Arrival as minutes after midnight.
    pub fn arrival_minutes(&self) -> Option<f64> {
        use chrono::Timelike;
        self.arrival_time
            .map(|t| f64::from(t.hour() * 60 + t.minute()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn early_counts_as_punctual_but_late_does_not() {
        assert!(AttendanceStatus::Early.is_punctual());
        assert!(AttendanceStatus::OnTime.is_punctual());
        assert!(!AttendanceStatus::Late.is_punctual());
        assert!(AttendanceStatus::Late.is_present());
        assert!(!AttendanceStatus::Absent.is_present());
    }

    #[test]
    fn status_storage_name() {
        assert_eq!(AttendanceStatus::OnTime.to_string(), "on_time");
    }
}
