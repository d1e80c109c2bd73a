//! Pattern, anomaly and forecast passes through the analytics service.

mod helpers;

use helpers::{Harness, at, clerk, monday};
use hrm_attendance::clock::Clock;
use hrm_attendance::model::{AttendanceStatus, Employee, UNKNOWN_DEPARTMENT};
use hrm_attendance::cache::CacheKey;
use hrm_attendance::service::Analysis;
use hrm_attendance::service::patterns::PatternReport;
use hrm_attendance::utils::stats::{mean, sample_stdev};

fn harness() -> Harness {
    // Monday four weeks after the fixture week
    let today = monday() + chrono::Duration::days(28);
    Harness::new((1..=4).map(clerk).collect(), at(today, 18, 0, 0))
}

#[tokio::test]
async fn single_high_day_is_the_only_outlier() {
    let h = harness();
    // nineteen days at 50 and one at 100
    h.seed_history(1, 20, |i| {
        let completion = if i == 7 { 100.0 } else { 50.0 };
        (AttendanceStatus::OnTime, completion)
    })
    .await;
    // steady colleague to reach the minimum sample
    h.seed_history(2, 20, |_| (AttendanceStatus::OnTime, 100.0)).await;

    let report = h
        .core
        .analytics
        .detect_anomalies(60)
        .await
        .unwrap()
        .computed()
        .expect("enough records for anomaly detection");

    assert_eq!(report.outliers.len(), 1);
    let outlier = &report.outliers[0];
    assert_eq!(outlier.employee_id, 1);
    assert_eq!(outlier.completion_percentage, 100.0);

    let mut values = vec![50.0; 19];
    values.push(100.0);
    let m = mean(&values).unwrap();
    let sd = sample_stdev(&values).unwrap();
    assert_eq!(outlier.expected_low, m - 2.0 * sd);
    assert_eq!(outlier.expected_high, m + 2.0 * sd);

    assert!(report.unusual_patterns.is_empty());
    assert!(report.data_quality_issues.is_empty());
}

#[tokio::test]
async fn recent_absence_streak_is_flagged() {
    let h = harness();
    // i counts back from yesterday: the last ten days are absences
    h.seed_history(1, 20, |i| {
        if i <= 10 {
            (AttendanceStatus::Absent, 0.0)
        } else {
            (AttendanceStatus::OnTime, 100.0)
        }
    })
    .await;
    h.seed_history(2, 20, |_| (AttendanceStatus::OnTime, 100.0)).await;

    let report = h
        .core
        .analytics
        .detect_anomalies(60)
        .await
        .unwrap()
        .computed()
        .unwrap();

    assert_eq!(report.unusual_patterns.len(), 1);
    let shift = &report.unusual_patterns[0];
    assert_eq!(shift.employee_id, 1);
    assert_eq!(shift.recent_absent_rate, 100.0);
    assert_eq!(shift.previous_absent_rate, 0.0);
}

#[tokio::test]
async fn out_of_range_completion_is_a_data_quality_issue() {
    let h = harness();
    h.seed_history(1, 15, |i| {
        let completion = if i == 3 { 140.0 } else { 100.0 };
        (AttendanceStatus::OnTime, completion)
    })
    .await;
    h.seed_history(2, 15, |_| (AttendanceStatus::OnTime, 100.0)).await;

    let report = h
        .core
        .analytics
        .detect_anomalies(60)
        .await
        .unwrap()
        .computed()
        .unwrap();
    assert_eq!(report.data_quality_issues.len(), 1);
    assert_eq!(report.data_quality_issues[0].employee_id, 1);
    assert_eq!(report.data_quality_issues[0].value, Some(140.0));
}

#[tokio::test]
async fn too_little_history_reports_required_and_available() {
    let h = harness();
    h.seed_history(1, 12, |_| (AttendanceStatus::OnTime, 100.0)).await;

    assert_eq!(
        h.core.analytics.detect_anomalies(60).await.unwrap(),
        Analysis::InsufficientData {
            required: 30,
            available: 12
        }
    );
    assert_eq!(
        h.core.analytics.forecast(7).await.unwrap(),
        Analysis::InsufficientData {
            required: 30,
            available: 12
        }
    );
}

#[tokio::test]
async fn pattern_results_are_cached_until_invalidated() {
    let h = harness();
    h.seed_history(1, 10, |_| (AttendanceStatus::Late, 66.67)).await;

    let first = h.core.analytics.analyze_patterns(30).await.unwrap();
    assert!(!first.is_computed());

    for id in 2..=4 {
        h.seed_history(id, 10, |_| (AttendanceStatus::OnTime, 100.0)).await;
    }
    // same day, same window: the cached verdict stands
    assert_eq!(h.core.analytics.analyze_patterns(30).await.unwrap(), first);

    assert!(h.core.cache.invalidate_pattern("patterns:").await >= 1);
    let report = h
        .core
        .analytics
        .analyze_patterns(30)
        .await
        .unwrap()
        .computed()
        .expect("forty records after invalidation");
    assert_eq!(report.total_records, 40);
}

#[tokio::test]
async fn forecast_stays_within_percentage_bounds() {
    let h = harness();
    for id in 1..=4 {
        h.seed_history(id, 20, |_| (AttendanceStatus::OnTime, 100.0)).await;
    }

    let series = h
        .core
        .analytics
        .forecast(30)
        .await
        .unwrap()
        .computed()
        .unwrap();

    assert_eq!(series.points.len(), 30);
    assert_eq!(series.points[0].date, h.core.clock.today() + chrono::Duration::days(1));
    for point in &series.points {
        assert_eq!(point.predicted_attendance_rate, 100.0);
        assert_eq!(point.predicted_punctuality_rate, 100.0);
    }
}

#[tokio::test]
async fn analytics_reject_out_of_range_windows() {
    let h = harness();
    assert!(h.core.analytics.analyze_patterns(0).await.unwrap_err().is_validation());
    assert!(h.core.analytics.detect_anomalies(366).await.unwrap_err().is_validation());
    assert!(h.core.analytics.forecast(0).await.unwrap_err().is_validation());
    assert!(h.core.analytics.forecast(91).await.unwrap_err().is_validation());
}

#[tokio::test]
async fn departed_employee_keeps_their_department() {
    let today = monday() + chrono::Duration::days(28);
    let auditor = Employee::new(3, "Auditor").with_department("Security");
    let h = Harness::new(vec![clerk(1), clerk(2).inactive(), auditor], at(today, 18, 0, 0));
    h.seed_history(2, 20, |_| (AttendanceStatus::OnTime, 100.0)).await;
    h.seed_history(3, 20, |_| (AttendanceStatus::Late, 66.67)).await;

    let report = h
        .core
        .analytics
        .analyze_patterns(30)
        .await
        .unwrap()
        .computed()
        .unwrap();

    let former = report
        .employees
        .profiles
        .iter()
        .find(|p| p.employee_id == 2)
        .unwrap();
    assert_eq!(former.department, "Finance");

    let mut departments: Vec<&str> = report
        .departments
        .departments
        .iter()
        .map(|d| d.department.as_str())
        .collect();
    departments.sort();
    assert_eq!(departments, vec!["Finance", "Security"]);
    assert!(!departments.contains(&UNKNOWN_DEPARTMENT));
}

#[tokio::test]
async fn rederiving_a_past_day_refreshes_cached_patterns() {
    let h = harness();
    for id in 1..=4 {
        h.seed_history(id, 10, |_| (AttendanceStatus::OnTime, 100.0)).await;
    }
    let rate_of_first = |report: &PatternReport| {
        report
            .employees
            .profiles
            .iter()
            .find(|p| p.employee_id == 1)
            .map(|p| p.attendance_rate)
    };

    let before = h.core.analytics.analyze_patterns(30).await.unwrap().computed().unwrap();
    assert_eq!(rate_of_first(&before), Some(100.0));

    // the Friday before has no clock events, so it re-derives as absent
    let friday = h.core.clock.today() - chrono::Duration::days(3);
    let record = h.core.deriver.derive_status(1, friday).await.unwrap().unwrap();
    assert_eq!(record.status, AttendanceStatus::Absent);

    let after = h.core.analytics.analyze_patterns(30).await.unwrap().computed().unwrap();
    assert_eq!(rate_of_first(&after), Some(90.0));

    // an unchanged re-derivation leaves the fresh report cached
    h.core.deriver.derive_status(1, friday).await.unwrap();
    let key = CacheKey::PatternReport {
        lookback_days: 30,
        as_of: h.core.clock.today(),
    };
    let cached: Option<Analysis<PatternReport>> = h.core.cache.get(&key, None).await;
    assert_eq!(cached, Some(Analysis::Computed(after)));
}
