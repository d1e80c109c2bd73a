use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// Directory entry as this core sees it. The directory itself is owned elsewhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Employee {
    pub id: u64,
    pub full_name: String,
    pub is_active: bool,
    /// Baseline arrival; falls back to the department's opening time when unset.
    pub assigned_arrival_time: Option<NaiveTime>,
    pub assigned_departure_time: Option<NaiveTime>,
    pub assigned_lunch_time: Option<NaiveTime>,
    pub department: Option<String>,
}

impl Employee {
    pub fn new(id: u64, full_name: impl Into<String>) -> Self {
        Self {
            id,
            full_name: full_name.into(),
            is_active: true,
            assigned_arrival_time: None,
            assigned_departure_time: None,
            assigned_lunch_time: None,
            department: None,
        }
    }

    pub fn with_department(mut self, department: impl Into<String>) -> Self {
        self.department = Some(department.into());
        self
    }

    pub fn with_schedule(mut self, arrival: NaiveTime, departure: NaiveTime) -> Self {
        self.assigned_arrival_time = Some(arrival);
        self.assigned_departure_time = Some(departure);
        self
    }

    pub fn with_lunch(mut self, lunch: NaiveTime) -> Self {
        self.assigned_lunch_time = Some(lunch);
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    pub fn department_name(&self) -> Option<&str> {
        self.department.as_deref()
    }
}
