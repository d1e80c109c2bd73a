use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use super::{AttendanceStore, DurableCache, DurableCacheStats, EmployeeDirectory, EventLog};
use crate::cache::key::CacheEntry;
use crate::error::Result;
use crate::model::{AttendanceRecord, ClockEvent, Employee};

#[derive(Debug, Default)]
pub struct MemoryDirectory {
    employees: RwLock<BTreeMap<u64, Employee>>,
}

impl MemoryDirectory {
    pub fn new(employees: impl IntoIterator<Item = Employee>) -> Self {
        Self {
            employees: RwLock::new(employees.into_iter().map(|e| (e.id, e)).collect()),
        }
    }

    pub async fn insert(&self, employee: Employee) {
        self.employees.write().await.insert(employee.id, employee);
    }
}

#[async_trait]
impl EmployeeDirectory for MemoryDirectory {
    async fn employee(&self, id: u64) -> Result<Option<Employee>> {
        Ok(self.employees.read().await.get(&id).cloned())
    }

    async fn active_employees(&self) -> Result<Vec<Employee>> {
        Ok(self
            .employees
            .read()
            .await
            .values()
            .filter(|e| e.is_active)
            .cloned()
            .collect())
    }
}

#[derive(Debug, Default)]
pub struct MemoryEventLog {
    events: RwLock<Vec<ClockEvent>>,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }

    pub async fn all(&self) -> Vec<ClockEvent> {
        self.events.read().await.clone()
    }
}

#[async_trait]
impl EventLog for MemoryEventLog {
    async fn append(&self, event: &ClockEvent) -> Result<()> {
        let mut events = self.events.write().await;
        // keep timestamp order; equal timestamps stay in append order
        let at = events.partition_point(|e| e.timestamp <= event.timestamp);
        events.insert(at, event.clone());
        Ok(())
    }

    async fn events_for_day(&self, employee_id: u64, date: NaiveDate) -> Result<Vec<ClockEvent>> {
        Ok(self
            .events
            .read()
            .await
            .iter()
            .filter(|e| e.employee_id == employee_id && e.date() == date)
            .cloned()
            .collect())
    }

    async fn latest_clock_event(&self, employee_id: u64) -> Result<Option<ClockEvent>> {
        Ok(self
            .events
            .read()
            .await
            .iter()
            .rev()
            .find(|e| e.employee_id == employee_id && e.kind.is_clock_action())
            .cloned())
    }

    async fn events_on(&self, date: NaiveDate) -> Result<Vec<ClockEvent>> {
        Ok(self
            .events
            .read()
            .await
            .iter()
            .filter(|e| e.date() == date)
            .cloned()
            .collect())
    }
}

#[derive(Debug, Default)]
pub struct MemoryAttendanceStore {
    records: RwLock<BTreeMap<(NaiveDate, u64), AttendanceRecord>>,
}

impl MemoryAttendanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl AttendanceStore for MemoryAttendanceStore {
    async fn upsert(&self, record: &AttendanceRecord) -> Result<()> {
        self.records
            .write()
            .await
            .insert((record.date, record.employee_id), record.clone());
        Ok(())
    }

    async fn get(&self, employee_id: u64, date: NaiveDate) -> Result<Option<AttendanceRecord>> {
        Ok(self.records.read().await.get(&(date, employee_id)).cloned())
    }

    async fn records_between(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<AttendanceRecord>> {
        if start > end {
            return Ok(Vec::new());
        }
        Ok(self
            .records
            .read()
            .await
            .range((start, u64::MIN)..=(end, u64::MAX))
            .map(|(_, r)| r.clone())
            .collect())
    }
}

#[derive(Debug, Default)]
pub struct MemoryDurableCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryDurableCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl DurableCache for MemoryDurableCache {
    async fn load(&self, key: &str) -> Result<Option<CacheEntry>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn store(&self, entry: &CacheEntry) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(entry.key.clone(), entry.clone());
        Ok(())
    }

    async fn delete_matching(&self, pattern: &str) -> Result<u64> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !key.contains(pattern));
        Ok((before - entries.len()) as u64)
    }

    async fn delete_tagged(&self, tag: &str) -> Result<u64> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.has_tag(tag));
        Ok((before - entries.len()) as u64)
    }

    async fn stats(&self, now: NaiveDateTime) -> Result<DurableCacheStats> {
        let entries = self.entries.read().await;
        Ok(DurableCacheStats {
            total_entries: entries.len() as u64,
            expired_entries: entries.values().filter(|e| !e.is_live(now)).count() as u64,
        })
    }

    async fn purge_expired(&self, now: NaiveDateTime) -> Result<u64> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        Ok((before - entries.len()) as u64)
    }
}
