use chrono::{Duration, NaiveDate};
use std::sync::Arc;
use tracing::{info, warn};

use super::{Analysis, department_map};
use super::anomalies::{self, AnomalyReport};
use super::forecast::{self, ForecastSeries};
use super::patterns::{self, PatternReport};
use crate::cache::{CacheKey, CacheTier};
use crate::clock::Clock;
use crate::error::{AttendanceError, Result};
use crate::model::AttendanceRecord;
use crate::store::{AttendanceStore, EmployeeDirectory};

pub const MAX_LOOKBACK_DAYS: u32 = 365;

/// Pattern, anomaly and forecast passes over the derived records, served
/// through the cache tier.
pub struct AnalyticsService {
    records: Arc<dyn AttendanceStore>,
    directory: Arc<dyn EmployeeDirectory>,
    cache: Arc<CacheTier>,
    clock: Arc<dyn Clock>,
}

fn validate_lookback(lookback_days: u32) -> Result<()> {
    if (1..=MAX_LOOKBACK_DAYS).contains(&lookback_days) {
        Ok(())
    } else {
        Err(AttendanceError::Validation(format!(
            "lookback_days must be between 1 and {MAX_LOOKBACK_DAYS}, got {lookback_days}"
        )))
    }
}

impl AnalyticsService {
    pub fn new(
        records: Arc<dyn AttendanceStore>,
        directory: Arc<dyn EmployeeDirectory>,
        cache: Arc<CacheTier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            records,
            directory,
            cache,
            clock,
        }
    }

    async fn window(&self, as_of: NaiveDate, days: u32) -> Result<Vec<AttendanceRecord>> {
        let start = as_of - Duration::days(i64::from(days));
        self.records.records_between(start, as_of).await
    }

    pub async fn analyze_patterns(&self, lookback_days: u32) -> Result<Analysis<PatternReport>> {
        validate_lookback(lookback_days)?;
        let as_of = self.clock.today();
        let key = CacheKey::PatternReport {
            lookback_days,
            as_of,
        };
        self.cache
            .get_or_compute(&key, None, || async {
                let records = self.window(as_of, lookback_days).await?;
                let departments = department_map(
                    self.directory.as_ref(),
                    records.iter().map(|r| r.employee_id),
                )
                .await?;
                let analysis = patterns::analyze_patterns(&records, &departments, lookback_days);
                log_outcome("patterns", &analysis, records.len());
                Ok(analysis)
            })
            .await
    }

    pub async fn detect_anomalies(&self, lookback_days: u32) -> Result<Analysis<AnomalyReport>> {
        validate_lookback(lookback_days)?;
        let as_of = self.clock.today();
        let key = CacheKey::AnomalyReport {
            lookback_days,
            as_of,
        };
        self.cache
            .get_or_compute(&key, None, || async {
                let records = self.window(as_of, lookback_days).await?;
                let analysis = anomalies::detect_anomalies(&records, lookback_days);
                if let Analysis::Computed(report) = &analysis {
                    if !report.data_quality_issues.is_empty() {
                        warn!(
                            issues = report.data_quality_issues.len(),
                            "Attendance records with data quality issues"
                        );
                    }
                }
                log_outcome("anomalies", &analysis, records.len());
                Ok(analysis)
            })
            .await
    }

    pub async fn forecast(&self, days_ahead: u32) -> Result<Analysis<ForecastSeries>> {
        forecast::validate_days_ahead(days_ahead)?;
        let as_of = self.clock.today();
        let key = CacheKey::Forecast { days_ahead, as_of };
        self.cache
            .get_or_compute(&key, None, || async {
                let records = self.window(as_of, forecast::HISTORY_DAYS).await?;
                let analysis = forecast::forecast(&records, as_of, days_ahead)?;
                log_outcome("forecast", &analysis, records.len());
                Ok(analysis)
            })
            .await
    }
}

fn log_outcome<T>(pass: &str, analysis: &Analysis<T>, records: usize) {
    match analysis {
        Analysis::Computed(_) => info!(pass, records, "Analysis computed"),
        Analysis::InsufficientData {
            required,
            available,
        } => warn!(pass, required, available, "Not enough data for analysis"),
    }
}
