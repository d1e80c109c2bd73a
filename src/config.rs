use chrono::{Duration, NaiveDate};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;

use crate::CoreSettings;
use crate::calendar::{Holiday, ScheduleCalendar};
use crate::error::AttendanceError;
use crate::service::DerivationSettings;

#[derive(Clone, Debug)]
pub struct Config {
    pub server_addr: String,
    pub database_url: String,
    pub api_prefix: String,
    pub log_dir: String,

    pub debounce_secs: i64,
    pub grace_minutes: i64,
    pub pattern_lookback_days: u32,
    pub cache_max_capacity: u64,
    /// 0 disables the background precompute loop.
    pub precompute_interval_secs: u64,

    pub holidays: Vec<Holiday>,
}

fn invalid(name: &str, raw: &str, why: &str) -> anyhow::Error {
    AttendanceError::Configuration(format!("{name}={raw:?}: {why}")).into()
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> anyhow::Result<T> {
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| invalid(name, &raw, "not a valid number")),
    }
}

/// `YYYY-MM-DD[=Name]` entries separated by commas.
pub fn parse_holidays(raw: &str) -> anyhow::Result<Vec<Holiday>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (date, name) = entry.split_once('=').unwrap_or((entry, "Holiday"));
            let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
                .map_err(|_| invalid("HOLIDAYS", entry, "expected YYYY-MM-DD[=Name]"))?;
            Ok(Holiday {
                date,
                name: name.trim().to_string(),
            })
        })
        .collect()
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from any variable source; used by `from_env` and tests.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let required = |name: &str| {
            lookup(name).ok_or_else(|| -> anyhow::Error {
                AttendanceError::Configuration(format!("{name} must be set")).into()
            })
        };

        let debounce_secs: i64 = parse_or(&lookup, "DEBOUNCE_SECS", 5)?;
        if !(1..=60).contains(&debounce_secs) {
            return Err(invalid(
                "DEBOUNCE_SECS",
                &debounce_secs.to_string(),
                "must be between 1 and 60",
            ));
        }
        let grace_minutes: i64 = parse_or(&lookup, "GRACE_MINUTES", 30)?;
        if !(0..=240).contains(&grace_minutes) {
            return Err(invalid(
                "GRACE_MINUTES",
                &grace_minutes.to_string(),
                "must be between 0 and 240",
            ));
        }
        let pattern_lookback_days: u32 = parse_or(&lookup, "PATTERN_LOOKBACK_DAYS", 60)?;
        if !(1..=365).contains(&pattern_lookback_days) {
            return Err(invalid(
                "PATTERN_LOOKBACK_DAYS",
                &pattern_lookback_days.to_string(),
                "must be between 1 and 365",
            ));
        }

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            api_prefix: lookup("API_PREFIX").unwrap_or_else(|| "/api".to_string()),
            log_dir: lookup("LOG_DIR").unwrap_or_else(|| "logs".to_string()),
            debounce_secs,
            grace_minutes,
            pattern_lookback_days,
            cache_max_capacity: parse_or(&lookup, "CACHE_MAX_CAPACITY", 100_000)?,
            precompute_interval_secs: parse_or(&lookup, "PRECOMPUTE_INTERVAL_SECS", 900)?,
            holidays: match lookup("HOLIDAYS") {
                Some(raw) => parse_holidays(&raw)?,
                None => Vec::new(),
            },
        })
    }

    pub fn core_settings(&self) -> CoreSettings {
        CoreSettings {
            debounce: Duration::seconds(self.debounce_secs),
            derivation: DerivationSettings {
                grace: Duration::minutes(self.grace_minutes),
                ..DerivationSettings::default()
            },
            cache_max_capacity: self.cache_max_capacity,
        }
    }

    /// Built-in department schedules plus the configured holidays.
    pub fn calendar(&self) -> ScheduleCalendar {
        self.holidays
            .iter()
            .fold(ScheduleCalendar::default(), |calendar, h| {
                calendar.with_holiday(h.date, h.name.clone())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::OpeningHoursCalendar;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    const BASE: [(&str, &str); 2] = [
        ("SERVER_ADDR", "127.0.0.1:8080"),
        ("DATABASE_URL", "mysql://localhost/hrm"),
    ];

    #[test]
    fn defaults_apply_when_unset() {
        let config = Config::from_lookup(lookup(&BASE)).unwrap();
        assert_eq!(config.api_prefix, "/api");
        assert_eq!(config.debounce_secs, 5);
        assert_eq!(config.grace_minutes, 30);
        assert_eq!(config.precompute_interval_secs, 900);
        assert!(config.holidays.is_empty());
    }

    #[test]
    fn missing_database_url_is_a_configuration_error() {
        let err = Config::from_lookup(lookup(&BASE[..1])).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AttendanceError>(),
            Some(AttendanceError::Configuration(_))
        ));
    }

    #[test]
    fn debounce_window_is_bounded() {
        let mut vars = BASE.to_vec();
        vars.push(("DEBOUNCE_SECS", "120"));
        assert!(Config::from_lookup(lookup(&vars)).is_err());
        vars.pop();
        vars.push(("DEBOUNCE_SECS", "soon"));
        assert!(Config::from_lookup(lookup(&vars)).is_err());
    }

    #[test]
    fn holidays_close_the_calendar() {
        let mut vars = BASE.to_vec();
        vars.push(("HOLIDAYS", "2025-12-25=Christmas Day, 2025-12-26"));
        let config = Config::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(config.holidays.len(), 2);
        assert_eq!(config.holidays[1].name, "Holiday");

        let calendar = config.calendar();
        let christmas = NaiveDate::from_ymd_opt(2025, 12, 25).unwrap();
        assert!(!calendar.is_working_day(None, christmas));
        assert_eq!(calendar.holiday(christmas), Some("Christmas Day"));
    }

    #[test]
    fn malformed_holiday_is_rejected() {
        assert!(parse_holidays("25/12/2025").is_err());
    }
}
