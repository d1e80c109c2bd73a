//! Persistence seams of the core.
//!
//! Every boundary the core reads or writes through is a trait here, so the
//! services are constructed with whatever backend the caller supplies:
//! [`mysql`] for the server, [`memory`] for tests and local runs.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::cache::key::CacheEntry;
use crate::error::Result;
use crate::model::{AttendanceRecord, ClockEvent, Employee};

pub mod memory;
pub mod mysql;

/// Read-only view of the employee directory.
#[async_trait]
pub trait EmployeeDirectory: Send + Sync {
    async fn employee(&self, id: u64) -> Result<Option<Employee>>;

    async fn active_employees(&self) -> Result<Vec<Employee>>;
}

/// Append-only log of clock events; the source of truth.
#[async_trait]
pub trait EventLog: Send + Sync {
    async fn append(&self, event: &ClockEvent) -> Result<()>;

    /// Events of one employee on one day, oldest first.
    async fn events_for_day(&self, employee_id: u64, date: NaiveDate) -> Result<Vec<ClockEvent>>;

    /// Most recent ClockIn/ClockOut of an employee, any day.
    async fn latest_clock_event(&self, employee_id: u64) -> Result<Option<ClockEvent>>;

    /// All events on one day, oldest first.
    async fn events_on(&self, date: NaiveDate) -> Result<Vec<ClockEvent>>;
}

/// Derived attendance records, unique per (employee, date).
#[async_trait]
pub trait AttendanceStore: Send + Sync {
    /// Insert or overwrite the record for its (employee, date).
    async fn upsert(&self, record: &AttendanceRecord) -> Result<()>;

    async fn get(&self, employee_id: u64, date: NaiveDate) -> Result<Option<AttendanceRecord>>;

    /// Records with `start <= date <= end`, ordered by date then employee.
    async fn records_between(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<AttendanceRecord>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DurableCacheStats {
    pub total_entries: u64,
    pub expired_entries: u64,
}

/// Slowest cache level. Its expiry column is the authoritative one.
#[async_trait]
pub trait DurableCache: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<CacheEntry>>;

    async fn store(&self, entry: &CacheEntry) -> Result<()>;

    /// Delete entries whose key contains `pattern`.
    async fn delete_matching(&self, pattern: &str) -> Result<u64>;

    async fn delete_tagged(&self, tag: &str) -> Result<u64>;

    async fn stats(&self, now: NaiveDateTime) -> Result<DurableCacheStats>;

    async fn purge_expired(&self, now: NaiveDateTime) -> Result<u64>;
}
