//! Out-of-band batch that warms the cache with daily and weekly rollups.
//!
//! Each category is computed and cached on its own; a failing category is
//! logged and reported without stopping the others. Re-running a day only
//! overwrites the same keys.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use strum::{AsRefStr, Display};
use tracing::{error, info};

use super::patterns::{StatusTally, department_metrics, mean_completion, week_start, DepartmentMetrics};
use super::department_map;
use super::status::StatusDeriver;
use crate::cache::{CacheKey, CacheStats, CacheTier};
use crate::clock::Clock;
use crate::error::{AttendanceError, Result};
use crate::model::{AttendanceRecord, Employee, EventKind, UNKNOWN_DEPARTMENT, normalize_department};
use crate::store::{AttendanceStore, EmployeeDirectory, EventLog};
use crate::utils::stats::{percentage, round2};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PrecomputeCategory {
    DepartmentSummaries,
    EmployeeStatuses,
    AttendanceRollup,
    SystemMetrics,
    WeeklySummary,
    TrendAnalysis,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryOutcome {
    pub category: PrecomputeCategory,
    /// Entries written to the cache.
    pub cached: usize,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrecomputeReport {
    pub date: NaiveDate,
    pub categories: Vec<CategoryOutcome>,
}

impl PrecomputeReport {
    pub fn total_cached(&self) -> usize {
        self.categories.iter().map(|c| c.cached).sum()
    }

    pub fn failed(&self) -> Vec<PrecomputeCategory> {
        self.categories
            .iter()
            .filter(|c| c.error.is_some())
            .map(|c| c.category)
            .collect()
    }

    pub fn outcome(&self, category: PrecomputeCategory) -> Option<&CategoryOutcome> {
        self.categories.iter().find(|c| c.category == category)
    }
}

/// Clock activity of one department on one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepartmentSummary {
    pub department: String,
    pub date: NaiveDate,
    pub employee_count: usize,
    pub event_count: usize,
    pub clock_in_count: usize,
    /// Share of the department's active employees that clocked in.
    pub attendance_rate: f64,
    pub generated_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRollup {
    pub date: NaiveDate,
    pub total_records: usize,
    pub punctual: usize,
    pub late: usize,
    pub absent: usize,
    pub problematic: usize,
    pub attendance_rate: f64,
    pub punctuality_rate: f64,
    pub average_completion: f64,
}

impl DailyRollup {
    pub fn of(date: NaiveDate, records: &[&AttendanceRecord]) -> Self {
        let tally = StatusTally::of(records.iter().copied());
        Self {
            date,
            total_records: tally.total,
            punctual: tally.punctual,
            late: tally.late,
            absent: tally.absent,
            problematic: tally.problematic,
            attendance_rate: round2(tally.attendance_rate()),
            punctuality_rate: round2(tally.punctuality_rate()),
            average_completion: round2(mean_completion(records.iter().copied())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemMetrics {
    pub date: NaiveDate,
    pub active_employees: usize,
    pub events_recorded: usize,
    pub clock_ins: usize,
    pub clock_outs: usize,
    pub cache_hit_rate: f64,
    pub generated_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklySummary {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub departments: Vec<DepartmentMetrics>,
    pub generated_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendAnalysis {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// One entry per calendar day of the week, empty days included.
    pub days: Vec<DailyRollup>,
    pub average_attendance_rate: f64,
    pub generated_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrecomputeStatus {
    pub today_ready: bool,
    pub yesterday_ready: bool,
    pub current_week_ready: bool,
    pub cache: CacheStats,
    pub checked_at: NaiveDateTime,
}

/// Monday and Sunday of the ISO week containing `date`.
pub fn week_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = week_start(date);
    (start, start + Duration::days(6))
}

pub struct PrecomputeScheduler {
    directory: Arc<dyn EmployeeDirectory>,
    events: Arc<dyn EventLog>,
    records: Arc<dyn AttendanceStore>,
    deriver: Arc<StatusDeriver>,
    cache: Arc<CacheTier>,
    clock: Arc<dyn Clock>,
}

fn outcome(category: PrecomputeCategory, result: Result<usize>) -> CategoryOutcome {
    match result {
        Ok(cached) => {
            info!(category = %category, cached, "Precomputed category");
            CategoryOutcome {
                category,
                cached,
                error: None,
            }
        }
        Err(e) => {
            error!(category = %category, error = %e, "Precompute category failed");
            CategoryOutcome {
                category,
                cached: 0,
                error: Some(e.to_string()),
            }
        }
    }
}

fn cache_failure(key: &CacheKey) -> AttendanceError {
    AttendanceError::Storage(format!("failed to persist cache entry {}", key.render()))
}

impl PrecomputeScheduler {
    pub fn new(
        directory: Arc<dyn EmployeeDirectory>,
        events: Arc<dyn EventLog>,
        records: Arc<dyn AttendanceStore>,
        deriver: Arc<StatusDeriver>,
        cache: Arc<CacheTier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            directory,
            events,
            records,
            deriver,
            cache,
            clock,
        }
    }

    async fn store<T: Serialize>(&self, key: CacheKey, value: &T) -> Result<usize> {
        if self.cache.put(&key, value, None).await {
            Ok(1)
        } else {
            Err(cache_failure(&key))
        }
    }

    pub async fn precompute_daily(&self, date: NaiveDate) -> PrecomputeReport {
        info!(%date, "Starting daily precomputation");
        let categories = vec![
            outcome(
                PrecomputeCategory::DepartmentSummaries,
                self.department_summaries(date).await,
            ),
            outcome(
                PrecomputeCategory::EmployeeStatuses,
                self.employee_statuses(date).await,
            ),
            outcome(
                PrecomputeCategory::AttendanceRollup,
                self.attendance_rollup(date).await,
            ),
            outcome(PrecomputeCategory::SystemMetrics, self.system_metrics(date).await),
        ];
        let report = PrecomputeReport { date, categories };
        info!(%date, cached = report.total_cached(), failed = report.failed().len(), "Daily precomputation finished");
        report
    }

    pub async fn precompute_weekly(&self, date: NaiveDate) -> PrecomputeReport {
        let (start, end) = week_bounds(date);
        info!(%start, %end, "Starting weekly precomputation");
        let categories = vec![
            outcome(
                PrecomputeCategory::WeeklySummary,
                self.weekly_summary(start, end).await,
            ),
            outcome(
                PrecomputeCategory::TrendAnalysis,
                self.trend_analysis(start, end).await,
            ),
        ];
        PrecomputeReport { date, categories }
    }

    async fn department_summaries(&self, date: NaiveDate) -> Result<usize> {
        let employees = self.directory.active_employees().await?;
        let events = self.events.events_on(date).await?;

        let mut departments: BTreeMap<String, BTreeSet<u64>> = BTreeMap::new();
        for employee in &employees {
            departments
                .entry(normalize_department(employee.department.as_deref()))
                .or_default()
                .insert(employee.id);
        }

        let now = self.clock.now();
        let mut cached = 0;
        for (department, members) in departments {
            let mine: Vec<_> = events
                .iter()
                .filter(|e| members.contains(&e.employee_id))
                .collect();
            let clocked_in: BTreeSet<u64> = mine
                .iter()
                .filter(|e| e.kind == EventKind::ClockIn)
                .map(|e| e.employee_id)
                .collect();
            let summary = DepartmentSummary {
                department: department.clone(),
                date,
                employee_count: members.len(),
                event_count: mine.len(),
                clock_in_count: mine.iter().filter(|e| e.kind == EventKind::ClockIn).count(),
                attendance_rate: round2(percentage(clocked_in.len(), members.len())),
                generated_at: now,
            };
            cached += self
                .store(CacheKey::DepartmentSummary { department, date }, &summary)
                .await?;
        }
        Ok(cached)
    }

    async fn employee_statuses(&self, date: NaiveDate) -> Result<usize> {
        let employees = self.directory.active_employees().await?;
        let snapshots = join_all(employees.iter().map(|e| self.snapshot(e, date))).await;
        let mut cached = 0;
        for (employee, result) in employees.iter().zip(snapshots) {
            match result {
                Ok(()) => cached += 1,
                Err(e) => error!(employee_id = employee.id, %date, error = %e, "Failed to precompute status"),
            }
        }
        Ok(cached)
    }

    async fn snapshot(&self, employee: &Employee, date: NaiveDate) -> Result<()> {
        let snapshot = self.deriver.snapshot(employee.id, date).await?;
        self.store(
            CacheKey::EmployeeStatus {
                employee_id: employee.id,
                date,
            },
            &snapshot,
        )
        .await
        .map(|_| ())
    }

    async fn attendance_rollup(&self, date: NaiveDate) -> Result<usize> {
        let records = self.records.records_between(date, date).await?;
        let refs: Vec<&AttendanceRecord> = records.iter().collect();
        self.store(CacheKey::AttendanceSummary { date }, &DailyRollup::of(date, &refs))
            .await
    }

    async fn system_metrics(&self, date: NaiveDate) -> Result<usize> {
        let employees = self.directory.active_employees().await?;
        let events = self.events.events_on(date).await?;
        let metrics = SystemMetrics {
            date,
            active_employees: employees.len(),
            events_recorded: events.len(),
            clock_ins: events.iter().filter(|e| e.kind == EventKind::ClockIn).count(),
            clock_outs: events.iter().filter(|e| e.kind == EventKind::ClockOut).count(),
            cache_hit_rate: self.cache.stats().await.cache_hit_rate,
            generated_at: self.clock.now(),
        };
        self.store(CacheKey::SystemMetrics { date }, &metrics).await
    }

    async fn weekly_summary(&self, start: NaiveDate, end: NaiveDate) -> Result<usize> {
        let records = self.records.records_between(start, end).await?;
        let department_of =
            department_map(self.directory.as_ref(), records.iter().map(|r| r.employee_id)).await?;

        let mut grouped: BTreeMap<String, Vec<&AttendanceRecord>> = BTreeMap::new();
        for record in &records {
            let department = department_of
                .get(&record.employee_id)
                .map_or(UNKNOWN_DEPARTMENT, String::as_str);
            grouped.entry(department.to_string()).or_default().push(record);
        }

        let summary = WeeklySummary {
            start,
            end,
            departments: grouped
                .into_iter()
                .map(|(department, rs)| department_metrics(department, &rs))
                .collect(),
            generated_at: self.clock.now(),
        };
        self.store(CacheKey::WeeklySummary { start, end }, &summary).await
    }

    async fn trend_analysis(&self, start: NaiveDate, end: NaiveDate) -> Result<usize> {
        let records = self.records.records_between(start, end).await?;
        let days: Vec<DailyRollup> = start
            .iter_days()
            .take_while(|d| *d <= end)
            .map(|day| {
                let on_day: Vec<&AttendanceRecord> = records.iter().filter(|r| r.date == day).collect();
                DailyRollup::of(day, &on_day)
            })
            .collect();
        let with_data: Vec<f64> = days
            .iter()
            .filter(|d| d.total_records > 0)
            .map(|d| d.attendance_rate)
            .collect();
        let average = crate::utils::stats::mean(&with_data).unwrap_or(0.0);

        let trend = TrendAnalysis {
            start,
            end,
            days,
            average_attendance_rate: round2(average),
            generated_at: self.clock.now(),
        };
        self.store(CacheKey::TrendAnalysis { start, end }, &trend).await
    }

    /// Purge expired entries from the durable tier.
    pub async fn cleanup_expired(&self) -> u64 {
        self.cache.purge_expired().await
    }

    pub async fn status(&self) -> PrecomputeStatus {
        let today = self.clock.today();
        let yesterday = today - Duration::days(1);
        let (start, end) = week_bounds(today);

        let ready = |key: CacheKey| async move {
            self.cache
                .get::<serde_json::Value>(&key, None)
                .await
                .is_some()
        };
        PrecomputeStatus {
            today_ready: ready(CacheKey::AttendanceSummary { date: today }).await,
            yesterday_ready: ready(CacheKey::AttendanceSummary { date: yesterday }).await,
            current_week_ready: ready(CacheKey::WeeklySummary { start, end }).await,
            cache: self.cache.stats().await,
            checked_at: self.clock.now(),
        }
    }

    /// One scheduled tick: today's daily and weekly passes, then cleanup.
    pub async fn run_once(&self) -> Vec<PrecomputeReport> {
        let today = self.clock.today();
        let reports = vec![
            self.precompute_daily(today).await,
            self.precompute_weekly(today).await,
        ];
        self.cleanup_expired().await;
        reports
    }
}
