//! Pattern analysis over derived attendance records.
//!
//! Pure functions: the caller loads the window and the employee → department
//! map, this module only aggregates.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use strum::{AsRefStr, Display, EnumString};

use super::Analysis;
use crate::model::{AttendanceRecord, AttendanceStatus, UNKNOWN_DEPARTMENT};
use crate::utils::stats::{mean, percentage, round2, sample_stdev};

pub const MIN_RECORDS: usize = 30;
pub const MIN_EMPLOYEE_RECORDS: usize = 10;
pub const MIN_DEPARTMENT_RECORDS: usize = 10;
pub const MIN_TREND_WEEKS: usize = 4;
const TREND_THRESHOLD: f64 = 5.0;
const WEEKEND_EFFECT_THRESHOLD: f64 = 10.0;

/// 08:00 and 08:30 as minutes after midnight.
const EARLY_BIRD_BEFORE: f64 = 480.0;
const LATE_PATTERN_AFTER: f64 = 510.0;
const IRREGULAR_STDEV: f64 = 60.0;

/// Status counts of a group of records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusTally {
    pub total: usize,
    pub punctual: usize,
    pub late: usize,
    pub absent: usize,
    pub problematic: usize,
}

impl StatusTally {
    pub fn add(&mut self, record: &AttendanceRecord) {
        self.total += 1;
        match record.status {
            AttendanceStatus::Early | AttendanceStatus::OnTime => self.punctual += 1,
            AttendanceStatus::Late => self.late += 1,
            AttendanceStatus::Absent => self.absent += 1,
        }
        if record.is_problematic_day {
            self.problematic += 1;
        }
    }

    pub fn of<'a>(records: impl IntoIterator<Item = &'a AttendanceRecord>) -> Self {
        let mut tally = Self::default();
        for record in records {
            tally.add(record);
        }
        tally
    }

    pub fn present(&self) -> usize {
        self.total - self.absent
    }

    pub fn attendance_rate(&self) -> f64 {
        percentage(self.present(), self.total)
    }

    pub fn punctuality_rate(&self) -> f64 {
        percentage(self.punctual, self.total)
    }

    pub fn late_rate(&self) -> f64 {
        percentage(self.late, self.total)
    }

    pub fn absent_rate(&self) -> f64 {
        percentage(self.absent, self.total)
    }

    pub fn problematic_rate(&self) -> f64 {
        percentage(self.problematic, self.total)
    }
}

/// Mean completion over the finite values only.
pub(crate) fn mean_completion<'a>(records: impl IntoIterator<Item = &'a AttendanceRecord>) -> f64 {
    let values: Vec<f64> = records
        .into_iter()
        .map(|r| r.completion_percentage)
        .filter(|v| v.is_finite())
        .collect();
    mean(&values).unwrap_or(0.0)
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Classification {
    ConsistentPerformer,
    AtRisk,
    EarlyBird,
    LatePattern,
    IrregularSchedule,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeProfile {
    pub employee_id: u64,
    pub department: String,
    pub total_days: usize,
    pub attendance_rate: f64,
    pub punctuality_rate: f64,
    pub average_completion: f64,
    pub problematic_rate: f64,
    pub mean_arrival_minutes: Option<f64>,
    pub arrival_stdev_minutes: Option<f64>,
    pub classifications: Vec<Classification>,
}

impl EmployeeProfile {
    pub fn is(&self, class: Classification) -> bool {
        self.classifications.contains(&class)
    }
}

/// Profiles plus one sorted id list per classification.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EmployeePatterns {
    pub profiles: Vec<EmployeeProfile>,
    /// Attendance rate, highest first.
    pub consistent_performers: Vec<u64>,
    /// Attendance rate, lowest first.
    pub at_risk: Vec<u64>,
    /// Mean arrival, earliest first.
    pub early_birds: Vec<u64>,
    /// Mean arrival, latest first.
    pub late_patterns: Vec<u64>,
    /// Arrival spread, widest first.
    pub irregular_schedules: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateBucket {
    pub label: String,
    pub total: usize,
    pub on_time_rate: f64,
    pub late_rate: f64,
    pub absent_rate: f64,
}

impl RateBucket {
    fn new(label: impl Into<String>, tally: &StatusTally) -> Self {
        Self {
            label: label.into(),
            total: tally.total,
            on_time_rate: round2(tally.punctuality_rate()),
            late_rate: round2(tally.late_rate()),
            absent_rate: round2(tally.absent_rate()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WeekendEffect {
    InsufficientData,
    /// Fridays beat Mondays by more than the threshold.
    FridayStronger,
    /// Mondays beat Fridays by more than the threshold.
    MondayStronger,
    NotSignificant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalPatterns {
    /// Monday first; weekdays without records are omitted.
    pub weekdays: Vec<RateBucket>,
    /// `YYYY-MM`, oldest first.
    pub months: Vec<RateBucket>,
    pub best_day: Option<String>,
    pub worst_day: Option<String>,
    pub weekend_effect: WeekendEffect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepartmentMetrics {
    pub department: String,
    pub employee_count: usize,
    pub total_records: usize,
    pub attendance_rate: f64,
    pub punctuality_rate: f64,
    pub average_completion: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DepartmentPatterns {
    /// Ranked by attendance rate, best first.
    pub departments: Vec<DepartmentMetrics>,
    pub best_performing: Option<String>,
    pub needs_attention: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Trend {
    Improving,
    Declining,
    Stable,
}

impl Trend {
    fn between(first: f64, second: f64) -> Self {
        if second > first + TREND_THRESHOLD {
            Trend::Improving
        } else if second < first - TREND_THRESHOLD {
            Trend::Declining
        } else {
            Trend::Stable
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyPoint {
    pub week_start: NaiveDate,
    pub total: usize,
    pub attendance_rate: f64,
    pub punctuality_rate: f64,
    pub average_completion: f64,
    pub problematic_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendReport {
    pub weeks: Vec<WeeklyPoint>,
    /// Follows the attendance trend.
    pub overall: Trend,
    pub attendance: Trend,
    pub punctuality: Trend,
    pub completion: Trend,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternReport {
    pub lookback_days: u32,
    pub total_records: usize,
    pub employees: EmployeePatterns,
    pub temporal: TemporalPatterns,
    pub departments: DepartmentPatterns,
    pub trends: TrendReport,
}

fn department_of(departments: &HashMap<u64, String>, employee_id: u64) -> String {
    departments
        .get(&employee_id)
        .cloned()
        .unwrap_or_else(|| UNKNOWN_DEPARTMENT.to_string())
}

pub fn analyze_patterns(
    records: &[AttendanceRecord],
    departments: &HashMap<u64, String>,
    lookback_days: u32,
) -> Analysis<PatternReport> {
    if records.len() < MIN_RECORDS {
        return Analysis::InsufficientData {
            required: MIN_RECORDS,
            available: records.len(),
        };
    }
    Analysis::Computed(PatternReport {
        lookback_days,
        total_records: records.len(),
        employees: employee_patterns(records, departments),
        temporal: temporal_patterns(records),
        departments: department_patterns(records, departments),
        trends: weekly_trends(records),
    })
}

pub fn employee_patterns(
    records: &[AttendanceRecord],
    departments: &HashMap<u64, String>,
) -> EmployeePatterns {
    let mut by_employee: BTreeMap<u64, Vec<&AttendanceRecord>> = BTreeMap::new();
    for record in records {
        by_employee.entry(record.employee_id).or_default().push(record);
    }

    let profiles: Vec<EmployeeProfile> = by_employee
        .into_iter()
        .filter(|(_, rs)| rs.len() >= MIN_EMPLOYEE_RECORDS)
        .map(|(employee_id, rs)| profile(employee_id, department_of(departments, employee_id), &rs))
        .collect();

    EmployeePatterns {
        consistent_performers: sorted_ids(&profiles, Classification::ConsistentPerformer, |p| p.attendance_rate, true),
        at_risk: sorted_ids(&profiles, Classification::AtRisk, |p| p.attendance_rate, false),
        early_birds: sorted_ids(
            &profiles,
            Classification::EarlyBird,
            |p| p.mean_arrival_minutes.unwrap_or(f64::MAX),
            false,
        ),
        late_patterns: sorted_ids(
            &profiles,
            Classification::LatePattern,
            |p| p.mean_arrival_minutes.unwrap_or(0.0),
            true,
        ),
        irregular_schedules: sorted_ids(
            &profiles,
            Classification::IrregularSchedule,
            |p| p.arrival_stdev_minutes.unwrap_or(0.0),
            true,
        ),
        profiles,
    }
}

fn sorted_ids(
    profiles: &[EmployeeProfile],
    class: Classification,
    key: fn(&EmployeeProfile) -> f64,
    descending: bool,
) -> Vec<u64> {
    let mut members: Vec<&EmployeeProfile> = profiles.iter().filter(|p| p.is(class)).collect();
    members.sort_by(|a, b| {
        let ord = key(a).total_cmp(&key(b));
        if descending { ord.reverse() } else { ord }
    });
    members.into_iter().map(|p| p.employee_id).collect()
}

fn profile(employee_id: u64, department: String, records: &[&AttendanceRecord]) -> EmployeeProfile {
    let tally = StatusTally::of(records.iter().copied());
    let attendance_rate = tally.attendance_rate();
    let average_completion = mean_completion(records.iter().copied());
    let problematic_rate = tally.problematic_rate();

    let arrivals: Vec<f64> = records.iter().filter_map(|r| r.arrival_minutes()).collect();
    let mean_arrival = mean(&arrivals);
    let arrival_stdev = sample_stdev(&arrivals);

    let mut classifications = Vec::new();
    if attendance_rate >= 95.0 && average_completion >= 85.0 && problematic_rate <= 5.0 {
        classifications.push(Classification::ConsistentPerformer);
    }
    if attendance_rate <= 70.0 || problematic_rate >= 30.0 {
        classifications.push(Classification::AtRisk);
    }
    if mean_arrival.is_some_and(|m| m < EARLY_BIRD_BEFORE) {
        classifications.push(Classification::EarlyBird);
    }
    if mean_arrival.is_some_and(|m| m > LATE_PATTERN_AFTER) {
        classifications.push(Classification::LatePattern);
    }
    if arrival_stdev.is_some_and(|s| s > IRREGULAR_STDEV) {
        classifications.push(Classification::IrregularSchedule);
    }

    EmployeeProfile {
        employee_id,
        department,
        total_days: tally.total,
        attendance_rate: round2(attendance_rate),
        punctuality_rate: round2(tally.punctuality_rate()),
        average_completion: round2(average_completion),
        problematic_rate: round2(problematic_rate),
        mean_arrival_minutes: mean_arrival.map(f64::round),
        arrival_stdev_minutes: arrival_stdev.map(round2),
        classifications,
    }
}

const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

pub fn temporal_patterns(records: &[AttendanceRecord]) -> TemporalPatterns {
    let mut weekday_tallies = [StatusTally::default(); 7];
    let mut month_tallies: BTreeMap<String, StatusTally> = BTreeMap::new();
    for record in records {
        weekday_tallies[record.date.weekday().num_days_from_monday() as usize].add(record);
        month_tallies
            .entry(record.date.format("%Y-%m").to_string())
            .or_default()
            .add(record);
    }

    let weekdays: Vec<RateBucket> = WEEKDAYS
        .iter()
        .zip(weekday_tallies.iter())
        .filter(|(_, t)| t.total > 0)
        .map(|(day, t)| RateBucket::new(weekday_name(*day), t))
        .collect();

    // ties keep the earlier weekday
    let best_day = weekdays
        .iter()
        .fold(None::<&RateBucket>, |best, b| match best {
            Some(current) if current.on_time_rate >= b.on_time_rate => Some(current),
            _ => Some(b),
        })
        .map(|b| b.label.clone());
    let worst_day = weekdays
        .iter()
        .fold(None::<&RateBucket>, |worst, b| match worst {
            Some(current) if current.on_time_rate <= b.on_time_rate => Some(current),
            _ => Some(b),
        })
        .map(|b| b.label.clone());

    let weekend_effect = weekend_effect(&weekdays);
    TemporalPatterns {
        weekend_effect,
        months: month_tallies
            .iter()
            .map(|(month, t)| RateBucket::new(month.as_str(), t))
            .collect(),
        weekdays,
        best_day,
        worst_day,
    }
}

fn weekend_effect(weekdays: &[RateBucket]) -> WeekendEffect {
    if weekdays.is_empty() {
        return WeekendEffect::InsufficientData;
    }
    let rate = |name: &str| {
        weekdays
            .iter()
            .find(|b| b.label == name)
            .map_or(0.0, |b| b.on_time_rate)
    };
    let friday = rate("Friday");
    let monday = rate("Monday");
    if friday > monday + WEEKEND_EFFECT_THRESHOLD {
        WeekendEffect::FridayStronger
    } else if monday > friday + WEEKEND_EFFECT_THRESHOLD {
        WeekendEffect::MondayStronger
    } else {
        WeekendEffect::NotSignificant
    }
}

pub fn department_patterns(
    records: &[AttendanceRecord],
    departments: &HashMap<u64, String>,
) -> DepartmentPatterns {
    let mut grouped: BTreeMap<String, Vec<&AttendanceRecord>> = BTreeMap::new();
    for record in records {
        grouped
            .entry(department_of(departments, record.employee_id))
            .or_default()
            .push(record);
    }

    let mut ranked: Vec<DepartmentMetrics> = grouped
        .into_iter()
        .filter(|(_, rs)| rs.len() >= MIN_DEPARTMENT_RECORDS)
        .map(|(department, rs)| department_metrics(department, &rs))
        .collect();
    ranked.sort_by(|a, b| b.attendance_rate.total_cmp(&a.attendance_rate));

    DepartmentPatterns {
        best_performing: ranked.first().map(|d| d.department.clone()),
        needs_attention: ranked.last().map(|d| d.department.clone()),
        departments: ranked,
    }
}

/// Rates of one department over the given records; no minimum applies.
pub fn department_metrics(department: String, records: &[&AttendanceRecord]) -> DepartmentMetrics {
    let tally = StatusTally::of(records.iter().copied());
    let employees: BTreeSet<u64> = records.iter().map(|r| r.employee_id).collect();
    DepartmentMetrics {
        department,
        employee_count: employees.len(),
        total_records: tally.total,
        attendance_rate: round2(tally.attendance_rate()),
        punctuality_rate: round2(tally.punctuality_rate()),
        average_completion: round2(mean_completion(records.iter().copied())),
    }
}

pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

pub fn weekly_trends(records: &[AttendanceRecord]) -> TrendReport {
    let mut grouped: BTreeMap<NaiveDate, Vec<&AttendanceRecord>> = BTreeMap::new();
    for record in records {
        grouped.entry(week_start(record.date)).or_default().push(record);
    }
    let weeks: Vec<WeeklyPoint> = grouped
        .into_iter()
        .map(|(week_start, rs)| {
            let tally = StatusTally::of(rs.iter().copied());
            WeeklyPoint {
                week_start,
                total: tally.total,
                attendance_rate: round2(tally.attendance_rate()),
                punctuality_rate: round2(tally.punctuality_rate()),
                average_completion: round2(mean_completion(rs.iter().copied())),
                problematic_rate: round2(tally.problematic_rate()),
            }
        })
        .collect();

    let mut report = TrendReport {
        weeks,
        overall: Trend::Stable,
        attendance: Trend::Stable,
        punctuality: Trend::Stable,
        completion: Trend::Stable,
    };
    if report.weeks.len() < MIN_TREND_WEEKS {
        return report;
    }

    let (first, second) = report.weeks.split_at(report.weeks.len() / 2);
    let halves = |metric: fn(&WeeklyPoint) -> f64| {
        let a: Vec<f64> = first.iter().map(metric).collect();
        let b: Vec<f64> = second.iter().map(metric).collect();
        Trend::between(mean(&a).unwrap_or(0.0), mean(&b).unwrap_or(0.0))
    };
    report.attendance = halves(|w| w.attendance_rate);
    report.punctuality = halves(|w| w.punctuality_rate);
    report.completion = halves(|w| w.average_completion);
    report.overall = report.attendance;
    report
}
