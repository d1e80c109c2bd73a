//! Daily and weekly cache warming by the precompute scheduler.

mod helpers;

use async_trait::async_trait;
use chrono::Duration;
use std::sync::Arc;

use helpers::{Harness, at, clerk, monday, record, time};
use hrm_attendance::cache::CacheKey;
use hrm_attendance::model::{AttendanceStatus, Employee};
use hrm_attendance::service::precompute::{
    DailyRollup, DepartmentSummary, PrecomputeCategory, TrendAnalysis, WeeklySummary, week_bounds,
};
use hrm_attendance::store::{AttendanceStore, EmployeeDirectory};
use hrm_attendance::{AttendanceError, Result};

/// Directory whose backend is down.
struct UnreachableDirectory;

#[async_trait]
impl EmployeeDirectory for UnreachableDirectory {
    async fn employee(&self, _id: u64) -> Result<Option<Employee>> {
        Err(AttendanceError::Storage("directory unreachable".into()))
    }

    async fn active_employees(&self) -> Result<Vec<Employee>> {
        Err(AttendanceError::Storage("directory unreachable".into()))
    }
}

fn guard(id: u64) -> Employee {
    Employee::new(id, format!("Guard {id}"))
        .with_department("Security")
        .with_schedule(time(8, 0), time(16, 0))
}

/// Two employees clock in on Monday morning; the clerk also leaves.
async fn busy_monday() -> Harness {
    let h = Harness::new(vec![clerk(1), guard(2)], at(monday(), 8, 0, 0));
    h.core.toggles.toggle(1, "kiosk", None).await.unwrap();
    h.core.toggles.toggle(2, "kiosk", None).await.unwrap();
    h.set(at(monday(), 16, 30, 0));
    h.core.toggles.toggle(1, "kiosk", None).await.unwrap();
    h.set(at(monday(), 17, 0, 0));
    h
}

#[tokio::test]
async fn daily_pass_caches_every_category() {
    let h = busy_monday().await;

    let report = h.core.scheduler.precompute_daily(monday()).await;
    assert!(report.failed().is_empty());
    assert_eq!(
        report.outcome(PrecomputeCategory::DepartmentSummaries).unwrap().cached,
        2
    );
    assert_eq!(report.outcome(PrecomputeCategory::EmployeeStatuses).unwrap().cached, 2);
    assert_eq!(report.total_cached(), 6);

    let rollup: DailyRollup = h
        .core
        .cache
        .get(&CacheKey::AttendanceSummary { date: monday() }, None)
        .await
        .unwrap();
    assert_eq!(rollup.total_records, 2);
    assert_eq!(rollup.punctual, 2);
    assert_eq!(rollup.attendance_rate, 100.0);

    let security: DepartmentSummary = h
        .core
        .cache
        .get(
            &CacheKey::DepartmentSummary {
                department: "Security".to_string(),
                date: monday(),
            },
            None,
        )
        .await
        .unwrap();
    assert_eq!(security.employee_count, 1);
    assert_eq!(security.clock_in_count, 1);
    assert_eq!(security.attendance_rate, 100.0);

    let status = h.core.scheduler.status().await;
    assert!(status.today_ready);
    assert!(!status.yesterday_ready);
    assert!(!status.current_week_ready);
}

#[tokio::test]
async fn weekly_pass_covers_monday_to_sunday() {
    let h = busy_monday().await;
    h.core.scheduler.precompute_daily(monday()).await;

    let report = h.core.scheduler.precompute_weekly(monday()).await;
    assert!(report.failed().is_empty());

    let (start, end) = week_bounds(monday());
    assert_eq!(start, monday());
    assert_eq!(end, monday() + Duration::days(6));

    let summary: WeeklySummary = h
        .core
        .cache
        .get(&CacheKey::WeeklySummary { start, end }, None)
        .await
        .unwrap();
    let departments: Vec<&str> = summary
        .departments
        .iter()
        .map(|d| d.department.as_str())
        .collect();
    assert_eq!(departments, vec!["Finance", "Security"]);

    let trend: TrendAnalysis = h
        .core
        .cache
        .get(&CacheKey::TrendAnalysis { start, end }, None)
        .await
        .unwrap();
    assert_eq!(trend.days.len(), 7);
    assert_eq!(trend.average_attendance_rate, 100.0);

    assert!(h.core.scheduler.status().await.current_week_ready);
}

#[tokio::test]
async fn weekly_summary_keeps_records_of_departed_employees() {
    let h = Harness::new(vec![clerk(1), guard(2).inactive()], at(monday(), 18, 0, 0));
    for day in 0..3 {
        let date = monday() + Duration::days(day);
        h.records
            .upsert(&record(1, date, AttendanceStatus::OnTime, 100.0))
            .await
            .unwrap();
        h.records
            .upsert(&record(2, date, AttendanceStatus::Late, 66.67))
            .await
            .unwrap();
    }

    let report = h.core.scheduler.precompute_weekly(monday()).await;
    assert!(report.failed().is_empty());

    let (start, end) = week_bounds(monday());
    let summary: WeeklySummary = h
        .core
        .cache
        .get(&CacheKey::WeeklySummary { start, end }, None)
        .await
        .unwrap();
    let security = summary
        .departments
        .iter()
        .find(|d| d.department == "Security")
        .unwrap();
    assert_eq!(security.total_records, 3);
    assert_eq!(summary.departments.len(), 2);
}

#[tokio::test]
async fn rerunning_a_day_overwrites_the_same_keys() {
    let h = busy_monday().await;
    h.core.scheduler.precompute_daily(monday()).await;
    let entries = h.durable.len().await;

    h.advance(Duration::minutes(5));
    h.core.scheduler.precompute_daily(monday()).await;
    assert_eq!(h.durable.len().await, entries);
}

#[tokio::test]
async fn failing_category_does_not_stop_the_others() {
    let h = Harness::with_directory(Arc::new(UnreachableDirectory), at(monday(), 17, 0, 0));

    let daily = h.core.scheduler.precompute_daily(monday()).await;
    assert_eq!(
        daily.failed(),
        vec![
            PrecomputeCategory::DepartmentSummaries,
            PrecomputeCategory::EmployeeStatuses,
            PrecomputeCategory::SystemMetrics,
        ]
    );
    let rollup = daily.outcome(PrecomputeCategory::AttendanceRollup).unwrap();
    assert_eq!(rollup.cached, 1);
    assert_eq!(rollup.error, None);
    let departments = daily.outcome(PrecomputeCategory::DepartmentSummaries).unwrap();
    assert!(departments.error.as_deref().unwrap().contains("directory unreachable"));

    let weekly = h.core.scheduler.precompute_weekly(monday()).await;
    assert_eq!(weekly.failed(), vec![PrecomputeCategory::WeeklySummary]);
    assert_eq!(weekly.outcome(PrecomputeCategory::TrendAnalysis).unwrap().cached, 1);
}

#[tokio::test]
async fn run_once_then_cleanup_after_expiry() {
    let h = busy_monday().await;

    let reports = h.core.scheduler.run_once().await;
    assert_eq!(reports.len(), 2);
    assert!(reports.iter().all(|r| r.failed().is_empty()));
    let cached = h.durable.len().await as u64;
    assert!(cached > 0);

    // longest TTL is two hours
    h.advance(Duration::hours(3));
    assert_eq!(h.core.scheduler.cleanup_expired().await, cached);
    assert!(h.durable.is_empty().await);
}
