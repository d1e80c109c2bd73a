use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{AsRefStr, Display};

use super::Analysis;
use super::patterns::{StatusTally, weekday_name};
use crate::error::{AttendanceError, Result};
use crate::model::AttendanceRecord;
use crate::utils::stats::{clamp_percentage, mean, round2};

pub const MIN_RECORDS: usize = 30;
pub const MIN_HISTORY_DAYS: usize = 7;
/// Window of history the forecast is fitted on.
pub const HISTORY_DAYS: u32 = 60;
pub const MAX_DAYS_AHEAD: u32 = 90;
const RECENT_DAYS: usize = 14;
/// Linear drift in percentage points per day ahead.
const DAILY_DRIFT: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Confidence {
    Medium,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub weekday: String,
    pub predicted_attendance_rate: f64,
    pub predicted_punctuality_rate: f64,
    pub confidence: Confidence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSeries {
    pub as_of: NaiveDate,
    pub days_ahead: u32,
    pub history_days: u32,
    pub model: String,
    pub points: Vec<ForecastPoint>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Rates {
    attendance: f64,
    punctuality: f64,
}

impl From<&StatusTally> for Rates {
    fn from(tally: &StatusTally) -> Self {
        Self {
            attendance: tally.attendance_rate(),
            punctuality: tally.punctuality_rate(),
        }
    }
}

pub fn validate_days_ahead(days_ahead: u32) -> Result<()> {
    if (1..=MAX_DAYS_AHEAD).contains(&days_ahead) {
        Ok(())
    } else {
        Err(AttendanceError::Validation(format!(
            "days_ahead must be between 1 and {MAX_DAYS_AHEAD}, got {days_ahead}"
        )))
    }
}

/// Moving average of the last two weeks plus a per-weekday adjustment.
///
/// `records` is the fitted history, normally the [`HISTORY_DAYS`] up to
/// `as_of`. Every prediction is clamped to [0, 100] after the drift is added.
pub fn forecast(
    records: &[AttendanceRecord],
    as_of: NaiveDate,
    days_ahead: u32,
) -> Result<Analysis<ForecastSeries>> {
    validate_days_ahead(days_ahead)?;
    if records.len() < MIN_RECORDS {
        return Ok(Analysis::InsufficientData {
            required: MIN_RECORDS,
            available: records.len(),
        });
    }

    let mut daily: BTreeMap<NaiveDate, StatusTally> = BTreeMap::new();
    let mut by_weekday = [StatusTally::default(); 7];
    for record in records {
        daily.entry(record.date).or_default().add(record);
        by_weekday[record.date.weekday().num_days_from_monday() as usize].add(record);
    }
    if daily.len() < MIN_HISTORY_DAYS {
        return Ok(Analysis::InsufficientData {
            required: MIN_HISTORY_DAYS,
            available: daily.len(),
        });
    }

    let recent: Vec<Rates> = daily.values().rev().take(RECENT_DAYS).map(Rates::from).collect();
    let base = Rates {
        attendance: mean(&recent.iter().map(|r| r.attendance).collect::<Vec<_>>()).unwrap_or(0.0),
        punctuality: mean(&recent.iter().map(|r| r.punctuality).collect::<Vec<_>>()).unwrap_or(0.0),
    };

    let weekday_rates: Vec<Option<Rates>> = by_weekday
        .iter()
        .map(|t| (t.total > 0).then(|| Rates::from(t)))
        .collect();
    let seen: Vec<Rates> = weekday_rates.iter().flatten().copied().collect();
    let overall = Rates {
        attendance: mean(&seen.iter().map(|r| r.attendance).collect::<Vec<_>>()).unwrap_or(0.0),
        punctuality: mean(&seen.iter().map(|r| r.punctuality).collect::<Vec<_>>()).unwrap_or(0.0),
    };

    let points = (1..=days_ahead)
        .map(|i| {
            let date = as_of + Duration::days(i64::from(i));
            let adjustment = weekday_rates[date.weekday().num_days_from_monday() as usize]
                .map(|day| Rates {
                    attendance: day.attendance - overall.attendance,
                    punctuality: day.punctuality - overall.punctuality,
                })
                .unwrap_or_default();
            let drift = f64::from(i) * DAILY_DRIFT;
            ForecastPoint {
                date,
                weekday: weekday_name(date.weekday()).to_string(),
                predicted_attendance_rate: round2(clamp_percentage(
                    base.attendance + adjustment.attendance + drift,
                )),
                predicted_punctuality_rate: round2(clamp_percentage(
                    base.punctuality + adjustment.punctuality + drift,
                )),
                confidence: Confidence::Medium,
            }
        })
        .collect();

    Ok(Analysis::Computed(ForecastSeries {
        as_of,
        days_ahead,
        history_days: HISTORY_DAYS,
        model: "moving_average_with_weekday_adjustment".to_string(),
        points,
    }))
}
