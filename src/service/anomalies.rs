use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{AsRefStr, Display};

use super::Analysis;
use crate::model::{AttendanceRecord, AttendanceStatus};
use crate::utils::stats::{mean, percentage, round2, sample_stdev};

pub const MIN_RECORDS: usize = 30;
/// Outlier statistics need more than this many samples per employee.
pub const OUTLIER_MIN_SAMPLES: usize = 5;
pub const SHIFT_WINDOW: usize = 10;
/// Percentage points the recent absence rate must exceed the prior one by.
pub const SHIFT_THRESHOLD: f64 = 30.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionOutlier {
    pub employee_id: u64,
    pub date: NaiveDate,
    pub completion_percentage: f64,
    pub expected_low: f64,
    pub expected_high: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbsenceShift {
    pub employee_id: u64,
    pub recent_absent_rate: f64,
    pub previous_absent_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DataQualityIssue {
    CompletionOutOfRange,
    NonFiniteCompletion,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataQualityFinding {
    pub employee_id: u64,
    pub date: NaiveDate,
    pub issue: DataQualityIssue,
    /// `None` when the stored value is not a finite number.
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyReport {
    pub lookback_days: u32,
    pub outliers: Vec<CompletionOutlier>,
    pub unusual_patterns: Vec<AbsenceShift>,
    pub data_quality_issues: Vec<DataQualityFinding>,
}

impl AnomalyReport {
    pub fn is_clean(&self) -> bool {
        self.outliers.is_empty() && self.unusual_patterns.is_empty() && self.data_quality_issues.is_empty()
    }
}

pub fn detect_anomalies(records: &[AttendanceRecord], lookback_days: u32) -> Analysis<AnomalyReport> {
    if records.len() < MIN_RECORDS {
        return Analysis::InsufficientData {
            required: MIN_RECORDS,
            available: records.len(),
        };
    }

    let mut by_employee: BTreeMap<u64, Vec<&AttendanceRecord>> = BTreeMap::new();
    for record in records {
        by_employee.entry(record.employee_id).or_default().push(record);
    }

    let mut outliers = Vec::new();
    let mut unusual_patterns = Vec::new();
    for (employee_id, mut history) in by_employee {
        history.sort_by_key(|r| r.date);
        outliers.extend(completion_outliers(&history));
        if let Some(shift) = absence_shift(employee_id, &history) {
            unusual_patterns.push(shift);
        }
    }

    Analysis::Computed(AnomalyReport {
        lookback_days,
        outliers,
        unusual_patterns,
        data_quality_issues: data_quality_issues(records),
    })
}

/// Days whose completion is more than two sample deviations from the mean.
pub fn completion_outliers(history: &[&AttendanceRecord]) -> Vec<CompletionOutlier> {
    let usable: Vec<&AttendanceRecord> = history
        .iter()
        .copied()
        .filter(|r| r.completion_percentage.is_finite())
        .collect();
    if usable.len() <= OUTLIER_MIN_SAMPLES {
        return Vec::new();
    }
    let values: Vec<f64> = usable.iter().map(|r| r.completion_percentage).collect();
    let (Some(m), Some(sd)) = (mean(&values), sample_stdev(&values)) else {
        return Vec::new();
    };
    usable
        .into_iter()
        .filter(|r| (r.completion_percentage - m).abs() > 2.0 * sd)
        .map(|r| CompletionOutlier {
            employee_id: r.employee_id,
            date: r.date,
            completion_percentage: r.completion_percentage,
            expected_low: m - 2.0 * sd,
            expected_high: m + 2.0 * sd,
        })
        .collect()
}

/// Compares the last ten records against the ten before them.
pub fn absence_shift(employee_id: u64, history: &[&AttendanceRecord]) -> Option<AbsenceShift> {
    if history.len() < 2 * SHIFT_WINDOW {
        return None;
    }
    let split = history.len() - SHIFT_WINDOW;
    let absent_rate = |window: &[&AttendanceRecord]| {
        let absent = window
            .iter()
            .filter(|r| r.status == AttendanceStatus::Absent)
            .count();
        percentage(absent, window.len())
    };
    let recent = absent_rate(&history[split..]);
    let previous = absent_rate(&history[split - SHIFT_WINDOW..split]);
    (recent > previous + SHIFT_THRESHOLD).then(|| AbsenceShift {
        employee_id,
        recent_absent_rate: round2(recent),
        previous_absent_rate: round2(previous),
    })
}

pub fn data_quality_issues(records: &[AttendanceRecord]) -> Vec<DataQualityFinding> {
    records
        .iter()
        .filter_map(|r| {
            let value = r.completion_percentage;
            let issue = if !value.is_finite() {
                DataQualityIssue::NonFiniteCompletion
            } else if !(0.0..=100.0).contains(&value) {
                DataQualityIssue::CompletionOutOfRange
            } else {
                return None;
            };
            Some(DataQualityFinding {
                employee_id: r.employee_id,
                date: r.date,
                issue,
                value: value.is_finite().then_some(value),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(employee_id: u64, n: i64, status: AttendanceStatus, completion: f64) -> AttendanceRecord {
        AttendanceRecord {
            employee_id,
            date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap() + Duration::days(n),
            arrival_time: None,
            departure_time: None,
            status,
            completion_percentage: completion,
            is_problematic_day: false,
        }
    }

    #[test]
    fn rising_absences_are_flagged() {
        let mut history = Vec::new();
        for n in 0..10 {
            history.push(record(1, n, AttendanceStatus::OnTime, 100.0));
        }
        for n in 10..20 {
            let status = if n % 2 == 0 { AttendanceStatus::Absent } else { AttendanceStatus::OnTime };
            history.push(record(1, n, status, 100.0));
        }
        let refs: Vec<&AttendanceRecord> = history.iter().collect();
        let shift = absence_shift(1, &refs).unwrap();
        assert_eq!(shift.recent_absent_rate, 50.0);
        assert_eq!(shift.previous_absent_rate, 0.0);

        assert!(absence_shift(1, &refs[1..]).is_none());
    }

    #[test]
    fn out_of_range_and_non_finite_values_are_data_quality_issues() {
        let records = vec![
            record(1, 0, AttendanceStatus::OnTime, 120.0),
            record(1, 1, AttendanceStatus::OnTime, f64::NAN),
            record(1, 2, AttendanceStatus::OnTime, 100.0),
        ];
        let issues = data_quality_issues(&records);
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].issue, DataQualityIssue::CompletionOutOfRange);
        assert_eq!(issues[0].value, Some(120.0));
        assert_eq!(issues[1].issue, DataQualityIssue::NonFiniteCompletion);
        assert_eq!(issues[1].value, None);
    }

    #[test]
    fn non_finite_values_stay_out_of_outlier_statistics() {
        let mut history: Vec<AttendanceRecord> =
            (0..8).map(|n| record(1, n, AttendanceStatus::OnTime, 80.0)).collect();
        history.push(record(1, 8, AttendanceStatus::OnTime, f64::INFINITY));
        let refs: Vec<&AttendanceRecord> = history.iter().collect();
        assert!(completion_outliers(&refs).is_empty());
    }

    #[test]
    fn small_windows_are_insufficient() {
        let records: Vec<_> = (0..12).map(|n| record(1, n, AttendanceStatus::OnTime, 100.0)).collect();
        assert_eq!(
            detect_anomalies(&records, 60),
            Analysis::InsufficientData { required: 30, available: 12 }
        );
    }
}
