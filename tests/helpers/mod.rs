//! Shared fixtures for the attendance core integration tests.
//!
//! Every harness runs on the in-memory stores and a [`ManualClock`] so time
//! only moves when a test moves it.

#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use std::sync::Arc;

use hrm_attendance::calendar::ScheduleCalendar;
use hrm_attendance::clock::{Clock, ManualClock};
use hrm_attendance::model::{AttendanceRecord, AttendanceStatus, Employee};
use hrm_attendance::store::memory::{
    MemoryAttendanceStore, MemoryDirectory, MemoryDurableCache, MemoryEventLog,
};
use hrm_attendance::store::{AttendanceStore, EmployeeDirectory};
use hrm_attendance::{AttendanceCore, CoreSettings, Stores};

/// Monday 2025-03-03.
pub fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 3).unwrap()
}

pub fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

pub fn at(date: NaiveDate, h: u32, m: u32, s: u32) -> NaiveDateTime {
    date.and_hms_opt(h, m, s).unwrap()
}

/// Office worker on an 08:00 to 16:30 schedule.
pub fn clerk(id: u64) -> Employee {
    Employee::new(id, format!("Clerk {id}"))
        .with_department("Finance")
        .with_schedule(time(8, 0), time(16, 30))
}

pub fn record(
    employee_id: u64,
    date: NaiveDate,
    status: AttendanceStatus,
    completion: f64,
) -> AttendanceRecord {
    let present = status.is_present();
    AttendanceRecord {
        employee_id,
        date,
        arrival_time: present.then(|| time(8, 10)),
        departure_time: present.then(|| time(16, 30)),
        status,
        completion_percentage: completion,
        is_problematic_day: completion < 34.0,
    }
}

pub struct Harness {
    pub core: AttendanceCore,
    pub clock: Arc<ManualClock>,
    pub events: Arc<MemoryEventLog>,
    pub records: Arc<MemoryAttendanceStore>,
    pub durable: Arc<MemoryDurableCache>,
}

impl Harness {
    pub fn new(employees: Vec<Employee>, start: NaiveDateTime) -> Self {
        Self::with_directory(Arc::new(MemoryDirectory::new(employees)), start)
    }

    pub fn with_directory(directory: Arc<dyn EmployeeDirectory>, start: NaiveDateTime) -> Self {
        let clock = Arc::new(ManualClock::new(start));
        let events = Arc::new(MemoryEventLog::new());
        let records = Arc::new(MemoryAttendanceStore::new());
        let durable = Arc::new(MemoryDurableCache::new());
        let stores = Stores {
            directory,
            events: events.clone(),
            records: records.clone(),
            durable_cache: durable.clone(),
        };
        let core = AttendanceCore::new(
            stores,
            Arc::new(ScheduleCalendar::default()),
            clock.clone(),
            CoreSettings::default(),
        );
        Self {
            core,
            clock,
            events,
            records,
            durable,
        }
    }

    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }

    pub fn set(&self, to: NaiveDateTime) {
        self.clock.set(to);
    }

    /// Store `days` consecutive records for one employee, ending yesterday.
    pub async fn seed_history(
        &self,
        employee_id: u64,
        days: i64,
        entry: impl Fn(i64) -> (AttendanceStatus, f64),
    ) {
        let today = self.clock.now().date();
        for i in 1..=days {
            let (status, completion) = entry(i);
            self.records
                .upsert(&record(employee_id, today - Duration::days(i), status, completion))
                .await
                .unwrap();
        }
    }
}
