use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use sqlx::MySqlPool;
use std::str::FromStr;

use super::{AttendanceStore, DurableCache, DurableCacheStats, EmployeeDirectory, EventLog};
use crate::cache::key::{CacheEntry, CacheType};
use crate::error::{AttendanceError, Result};
use crate::model::{AttendanceRecord, AttendanceStatus, ClockEvent, Employee, EventKind};

/// All stores over one MySQL pool. Table layout lives in `sql/schema.sql`.
#[derive(Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct EventRow {
    employee_id: u64,
    kind: String,
    occurred_at: NaiveDateTime,
    actor: String,
    location: Option<String>,
}

impl TryFrom<EventRow> for ClockEvent {
    type Error = AttendanceError;

    fn try_from(row: EventRow) -> Result<Self> {
        let kind = EventKind::from_str(&row.kind)
            .map_err(|_| AttendanceError::Storage(format!("unknown event kind `{}`", row.kind)))?;
        Ok(ClockEvent {
            employee_id: row.employee_id,
            kind,
            timestamp: row.occurred_at,
            actor: row.actor,
            location: row.location,
        })
    }
}

#[derive(sqlx::FromRow)]
struct RecordRow {
    employee_id: u64,
    date: NaiveDate,
    arrival_time: Option<NaiveTime>,
    departure_time: Option<NaiveTime>,
    status: String,
    completion_percentage: f64,
    is_problematic_day: bool,
}

impl TryFrom<RecordRow> for AttendanceRecord {
    type Error = AttendanceError;

    fn try_from(row: RecordRow) -> Result<Self> {
        let status = AttendanceStatus::from_str(&row.status).map_err(|_| {
            AttendanceError::Storage(format!("unknown attendance status `{}`", row.status))
        })?;
        Ok(AttendanceRecord {
            employee_id: row.employee_id,
            date: row.date,
            arrival_time: row.arrival_time,
            departure_time: row.departure_time,
            status,
            completion_percentage: row.completion_percentage,
            is_problematic_day: row.is_problematic_day,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CacheRow {
    cache_key: String,
    payload: String,
    expires_at: NaiveDateTime,
    cache_type: String,
    tags: String,
}

impl TryFrom<CacheRow> for CacheEntry {
    type Error = AttendanceError;

    fn try_from(row: CacheRow) -> Result<Self> {
        let cache_type = CacheType::from_str(&row.cache_type).unwrap_or(CacheType::General);
        Ok(CacheEntry {
            key: row.cache_key,
            payload: serde_json::from_str(&row.payload)?,
            expires_at: row.expires_at,
            cache_type,
            tags: row
                .tags
                .split(',')
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect(),
        })
    }
}

/// Tags are stored as `,a,b,` so a single LIKE finds whole tags.
fn encode_tags(tags: &[String]) -> String {
    if tags.is_empty() {
        String::new()
    } else {
        format!(",{},", tags.join(","))
    }
}

fn like_escape(raw: &str) -> String {
    raw.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[async_trait]
impl EmployeeDirectory for MySqlStore {
    async fn employee(&self, id: u64) -> Result<Option<Employee>> {
        let employee = sqlx::query_as::<_, Employee>(
            r#"
            SELECT id, full_name, is_active, assigned_arrival_time,
                   assigned_departure_time, assigned_lunch_time, department
            FROM employees
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(employee)
    }

    async fn active_employees(&self) -> Result<Vec<Employee>> {
        let employees = sqlx::query_as::<_, Employee>(
            r#"
            SELECT id, full_name, is_active, assigned_arrival_time,
                   assigned_departure_time, assigned_lunch_time, department
            FROM employees
            WHERE is_active = TRUE
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(employees)
    }
}

#[async_trait]
impl EventLog for MySqlStore {
    async fn append(&self, event: &ClockEvent) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO clock_events (employee_id, kind, occurred_at, actor, location)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(event.employee_id)
        .bind(event.kind.as_ref())
        .bind(event.timestamp)
        .bind(&event.actor)
        .bind(&event.location)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn events_for_day(&self, employee_id: u64, date: NaiveDate) -> Result<Vec<ClockEvent>> {
        let rows = sqlx::query_as::<_, EventRow>(
            r#"
            SELECT employee_id, kind, occurred_at, actor, location
            FROM clock_events
            WHERE employee_id = ? AND DATE(occurred_at) = ?
            ORDER BY occurred_at, id
            "#,
        )
        .bind(employee_id)
        .bind(date)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(ClockEvent::try_from).collect()
    }

    async fn latest_clock_event(&self, employee_id: u64) -> Result<Option<ClockEvent>> {
        let row = sqlx::query_as::<_, EventRow>(
            r#"
            SELECT employee_id, kind, occurred_at, actor, location
            FROM clock_events
            WHERE employee_id = ? AND kind IN ('clock_in', 'clock_out')
            ORDER BY occurred_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(employee_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(ClockEvent::try_from).transpose()
    }

    async fn events_on(&self, date: NaiveDate) -> Result<Vec<ClockEvent>> {
        let rows = sqlx::query_as::<_, EventRow>(
            r#"
            SELECT employee_id, kind, occurred_at, actor, location
            FROM clock_events
            WHERE DATE(occurred_at) = ?
            ORDER BY occurred_at, id
            "#,
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(ClockEvent::try_from).collect()
    }
}

#[async_trait]
impl AttendanceStore for MySqlStore {
    async fn upsert(&self, record: &AttendanceRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO attendance_records
                (employee_id, date, arrival_time, departure_time, status,
                 completion_percentage, is_problematic_day)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE
                arrival_time = VALUES(arrival_time),
                departure_time = VALUES(departure_time),
                status = VALUES(status),
                completion_percentage = VALUES(completion_percentage),
                is_problematic_day = VALUES(is_problematic_day)
            "#,
        )
        .bind(record.employee_id)
        .bind(record.date)
        .bind(record.arrival_time)
        .bind(record.departure_time)
        .bind(record.status.as_ref())
        .bind(record.completion_percentage)
        .bind(record.is_problematic_day)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, employee_id: u64, date: NaiveDate) -> Result<Option<AttendanceRecord>> {
        let row = sqlx::query_as::<_, RecordRow>(
            r#"
            SELECT employee_id, date, arrival_time, departure_time, status,
                   completion_percentage, is_problematic_day
            FROM attendance_records
            WHERE employee_id = ? AND date = ?
            "#,
        )
        .bind(employee_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;
        row.map(AttendanceRecord::try_from).transpose()
    }

    async fn records_between(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<AttendanceRecord>> {
        let rows = sqlx::query_as::<_, RecordRow>(
            r#"
            SELECT employee_id, date, arrival_time, departure_time, status,
                   completion_percentage, is_problematic_day
            FROM attendance_records
            WHERE date BETWEEN ? AND ?
            ORDER BY date, employee_id
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        // one corrupt row must not sink a whole analysis window
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            match AttendanceRecord::try_from(row) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(error = %e, "Skipping unreadable attendance record"),
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl DurableCache for MySqlStore {
    async fn load(&self, key: &str) -> Result<Option<CacheEntry>> {
        let row = sqlx::query_as::<_, CacheRow>(
            r#"
            SELECT cache_key, payload, expires_at, cache_type, tags
            FROM analytics_cache
            WHERE cache_key = ?
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        row.map(CacheEntry::try_from).transpose()
    }

    async fn store(&self, entry: &CacheEntry) -> Result<()> {
        let payload = serde_json::to_string(&entry.payload)?;
        sqlx::query(
            r#"
            INSERT INTO analytics_cache (cache_key, payload, expires_at, cache_type, tags)
            VALUES (?, ?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE
                payload = VALUES(payload),
                expires_at = VALUES(expires_at),
                cache_type = VALUES(cache_type),
                tags = VALUES(tags)
            "#,
        )
        .bind(&entry.key)
        .bind(payload)
        .bind(entry.expires_at)
        .bind(entry.cache_type.as_ref())
        .bind(encode_tags(&entry.tags))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_matching(&self, pattern: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM analytics_cache WHERE cache_key LIKE ?")
            .bind(format!("%{}%", like_escape(pattern)))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_tagged(&self, tag: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM analytics_cache WHERE tags LIKE ?")
            .bind(format!("%,{},%", like_escape(tag)))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn stats(&self, now: NaiveDateTime) -> Result<DurableCacheStats> {
        let (total, expired): (i64, Option<i64>) = sqlx::query_as(
            r#"
            SELECT COUNT(*), CAST(SUM(expires_at <= ?) AS SIGNED)
            FROM analytics_cache
            "#,
        )
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(DurableCacheStats {
            total_entries: total.max(0) as u64,
            expired_entries: expired.unwrap_or(0).max(0) as u64,
        })
    }

    async fn purge_expired(&self, now: NaiveDateTime) -> Result<u64> {
        let result = sqlx::query("DELETE FROM analytics_cache WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
