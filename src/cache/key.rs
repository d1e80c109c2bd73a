use chrono::{NaiveDate, NaiveDateTime};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display as StrumDisplay, EnumString};

/// Cache category; decides the time-to-live of an entry.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    StrumDisplay,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CacheType {
    EmployeeStatus,
    SystemPerformance,
    DepartmentStats,
    AttendanceHeatmap,
    DailySummary,
    EmployeeAnalytics,
    General,
    ComprehensiveReport,
}

impl CacheType {
    pub fn ttl_secs(self) -> i64 {
        match self {
            CacheType::EmployeeStatus | CacheType::SystemPerformance => 300,
            CacheType::DepartmentStats | CacheType::AttendanceHeatmap => 1800,
            CacheType::DailySummary | CacheType::EmployeeAnalytics | CacheType::General => 3600,
            CacheType::ComprehensiveReport => 7200,
        }
    }

    pub fn ttl(self) -> chrono::Duration {
        chrono::Duration::seconds(self.ttl_secs())
    }
}

/// Dependency tag; invalidating a tag drops every entry carrying it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display)]
pub enum CacheTag {
    #[display(fmt = "employee:{}", _0)]
    Employee(u64),
    #[display(fmt = "date:{}", _0)]
    Date(NaiveDate),
    #[display(fmt = "department:{}", _0)]
    Department(String),
    #[display(fmt = "analytics")]
    Analytics,
}

/// Typed cache key. The rendered string is what both tiers store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    EmployeeStatus { employee_id: u64, date: NaiveDate },
    DepartmentSummary { department: String, date: NaiveDate },
    AttendanceSummary { date: NaiveDate },
    SystemMetrics { date: NaiveDate },
    WeeklySummary { start: NaiveDate, end: NaiveDate },
    TrendAnalysis { start: NaiveDate, end: NaiveDate },
    PatternReport { lookback_days: u32, as_of: NaiveDate },
    AnomalyReport { lookback_days: u32, as_of: NaiveDate },
    Forecast { days_ahead: u32, as_of: NaiveDate },
}

impl CacheKey {
    pub fn render(&self) -> String {
        match self {
            CacheKey::EmployeeStatus { employee_id, date } => {
                format!("employee_status:{employee_id}:{date}")
            }
            CacheKey::DepartmentSummary { department, date } => {
                format!("dept_summary:{department}:{date}")
            }
            CacheKey::AttendanceSummary { date } => format!("attendance_summary:{date}"),
            CacheKey::SystemMetrics { date } => format!("system_metrics:{date}"),
            CacheKey::WeeklySummary { start, end } => format!("weekly_summary:{start}:{end}"),
            CacheKey::TrendAnalysis { start, end } => format!("trend_analysis:{start}:{end}"),
            CacheKey::PatternReport {
                lookback_days,
                as_of,
            } => format!("patterns:{lookback_days}:{as_of}"),
            CacheKey::AnomalyReport {
                lookback_days,
                as_of,
            } => format!("anomalies:{lookback_days}:{as_of}"),
            CacheKey::Forecast { days_ahead, as_of } => format!("forecast:{days_ahead}:{as_of}"),
        }
    }

    pub fn cache_type(&self) -> CacheType {
        match self {
            CacheKey::EmployeeStatus { .. } => CacheType::EmployeeStatus,
            CacheKey::DepartmentSummary { .. } => CacheType::DepartmentStats,
            CacheKey::AttendanceSummary { .. } => CacheType::DailySummary,
            CacheKey::SystemMetrics { .. } => CacheType::SystemPerformance,
            CacheKey::WeeklySummary { .. } | CacheKey::TrendAnalysis { .. } => {
                CacheType::ComprehensiveReport
            }
            CacheKey::PatternReport { .. } | CacheKey::AnomalyReport { .. } => {
                CacheType::EmployeeAnalytics
            }
            CacheKey::Forecast { .. } => CacheType::ComprehensiveReport,
        }
    }

    /// Entities whose change makes this entry stale.
    pub fn tags(&self) -> Vec<CacheTag> {
        match self {
            CacheKey::EmployeeStatus { employee_id, date } => {
                vec![CacheTag::Employee(*employee_id), CacheTag::Date(*date)]
            }
            CacheKey::DepartmentSummary { department, date } => vec![
                CacheTag::Department(department.clone()),
                CacheTag::Date(*date),
            ],
            CacheKey::AttendanceSummary { date } | CacheKey::SystemMetrics { date } => {
                vec![CacheTag::Date(*date)]
            }
            CacheKey::WeeklySummary { start, end } | CacheKey::TrendAnalysis { start, end } => {
                start
                    .iter_days()
                    .take_while(|d| d <= end)
                    .map(CacheTag::Date)
                    .collect()
            }
            CacheKey::PatternReport { as_of, .. }
            | CacheKey::AnomalyReport { as_of, .. }
            | CacheKey::Forecast { as_of, .. } => {
                vec![CacheTag::Analytics, CacheTag::Date(*as_of)]
            }
        }
    }
}

/// Entry as persisted in the durable tier.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: String,
    pub payload: serde_json::Value,
    pub expires_at: NaiveDateTime,
    pub cache_type: CacheType,
    pub tags: Vec<String>,
}

impl CacheEntry {
    pub fn is_live(&self, now: NaiveDateTime) -> bool {
        self.expires_at > now
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}
