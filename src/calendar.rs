use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Opening hours of one working day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WorkingPeriod {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl WorkingPeriod {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, at: NaiveTime) -> bool {
        self.start <= at && at <= self.end
    }
}

/// Oracle answering "is this a working period" for an employee's department.
///
/// Holidays, per-department weekly schedules and special closures are all
/// folded into these answers; callers never look at them directly.
pub trait OpeningHoursCalendar: Send + Sync {
    /// `None` means the department is closed that day.
    fn working_period(&self, department: Option<&str>, date: NaiveDate) -> Option<WorkingPeriod>;

    fn is_working_day(&self, department: Option<&str>, date: NaiveDate) -> bool {
        self.working_period(department, date).is_some()
    }

    fn is_within_working_hours(&self, department: Option<&str>, at: NaiveDateTime) -> bool {
        self.working_period(department, at.date())
            .is_some_and(|p| p.contains(at.time()))
    }

    /// Next period that has not yet ended at `from`, searching one year ahead.
    fn next_working_period(
        &self,
        department: Option<&str>,
        from: NaiveDateTime,
    ) -> Option<(NaiveDate, WorkingPeriod)> {
        let mut date = from.date();
        for _ in 0..=366 {
            if let Some(period) = self.working_period(department, date) {
                if date > from.date() || from.time() <= period.end {
                    return Some((date, period));
                }
            }
            date = date.succ_opt()?;
        }
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaySchedule {
    pub open: bool,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl DaySchedule {
    pub fn open(start: NaiveTime, end: NaiveTime) -> Self {
        Self {
            open: true,
            start,
            end,
        }
    }

    pub fn closed() -> Self {
        Self {
            open: false,
            start: NaiveTime::MIN,
            end: NaiveTime::MIN,
        }
    }
}

/// Schedule for Monday..Sunday.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeeklySchedule {
    days: [DaySchedule; 7],
}

impl WeeklySchedule {
    pub fn new(days: [DaySchedule; 7]) -> Self {
        Self { days }
    }

    /// Same hours on weekdays, closed at weekends.
    pub fn weekdays(start: NaiveTime, end: NaiveTime) -> Self {
        let open = DaySchedule::open(start, end);
        let closed = DaySchedule::closed();
        Self::new([open, open, open, open, open, closed, closed])
    }

    pub fn every_day(start: NaiveTime, end: NaiveTime) -> Self {
        Self::new([DaySchedule::open(start, end); 7])
    }

    pub fn day(&self, weekday: Weekday) -> DaySchedule {
        self.days[weekday.num_days_from_monday() as usize]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecialRule {
    /// Every department is closed.
    Closed,
    /// Weekdays close early at the given time.
    EarlyClose(NaiveTime),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecialPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub description: String,
    pub rule: SpecialRule,
}

impl SpecialPeriod {
    fn covers(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Holiday {
    pub date: NaiveDate,
    pub name: String,
}

const DEFAULT_SCHEDULE: &str = "default";

/// Calendar backed by holiday, special-period and department schedule tables.
#[derive(Debug, Clone)]
pub struct ScheduleCalendar {
    holidays: BTreeMap<NaiveDate, String>,
    schedules: HashMap<String, WeeklySchedule>,
    special_periods: Vec<SpecialPeriod>,
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

impl Default for ScheduleCalendar {
    fn default() -> Self {
        let mut schedules = HashMap::new();
        schedules.insert(
            DEFAULT_SCHEDULE.to_string(),
            WeeklySchedule::weekdays(hm(9, 0), hm(17, 0)),
        );
        schedules.insert(
            "security".to_string(),
            WeeklySchedule::every_day(hm(0, 0), hm(23, 59)),
        );
        let weekday = DaySchedule::open(hm(7, 0), hm(18, 0));
        let weekend = DaySchedule::open(hm(8, 0), hm(16, 0));
        schedules.insert(
            "maintenance".to_string(),
            WeeklySchedule::new([weekday, weekday, weekday, weekday, weekday, weekend, weekend]),
        );
        schedules.insert(
            "administration".to_string(),
            WeeklySchedule::weekdays(hm(8, 30), hm(17, 30)),
        );

        Self {
            holidays: BTreeMap::new(),
            schedules,
            special_periods: Vec::new(),
        }
    }
}

impl ScheduleCalendar {
    /// Empty calendar where every department follows `default`.
    pub fn new(default: WeeklySchedule) -> Self {
        let mut schedules = HashMap::new();
        schedules.insert(DEFAULT_SCHEDULE.to_string(), default);
        Self {
            holidays: BTreeMap::new(),
            schedules,
            special_periods: Vec::new(),
        }
    }

    pub fn with_holiday(mut self, date: NaiveDate, name: impl Into<String>) -> Self {
        self.holidays.insert(date, name.into());
        self
    }

    pub fn with_department(mut self, name: &str, schedule: WeeklySchedule) -> Self {
        self.schedules.insert(department_key(name), schedule);
        self
    }

    pub fn with_special_period(mut self, period: SpecialPeriod) -> Self {
        self.special_periods.push(period);
        self
    }

    pub fn holiday(&self, date: NaiveDate) -> Option<&str> {
        self.holidays.get(&date).map(String::as_str)
    }

    pub fn upcoming_holidays(&self, from: NaiveDate, days_ahead: i64) -> Vec<Holiday> {
        let until = from + Duration::days(days_ahead);
        self.holidays
            .range(from..=until)
            .map(|(date, name)| Holiday {
                date: *date,
                name: name.clone(),
            })
            .collect()
    }

    /// Exact key first, then a partial match either way, then `default`.
    pub fn schedule_for(&self, department: Option<&str>) -> &WeeklySchedule {
        let fallback = &self.schedules[DEFAULT_SCHEDULE];
        let Some(name) = department.filter(|d| !d.trim().is_empty()) else {
            return fallback;
        };
        let key = department_key(name);
        if let Some(schedule) = self.schedules.get(&key) {
            return schedule;
        }
        let mut partial: Vec<(&String, &WeeklySchedule)> = self
            .schedules
            .iter()
            .filter(|(k, _)| k.as_str() != DEFAULT_SCHEDULE)
            .filter(|(k, _)| key.contains(k.as_str()) || k.contains(key.as_str()))
            .collect();
        // deterministic pick when several keys match
        partial.sort_by(|a, b| a.0.cmp(b.0));
        partial.first().map(|(_, s)| *s).unwrap_or(fallback)
    }

    fn special_period(&self, date: NaiveDate) -> Option<&SpecialPeriod> {
        self.special_periods.iter().find(|p| p.covers(date))
    }
}

fn department_key(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

impl OpeningHoursCalendar for ScheduleCalendar {
    fn working_period(&self, department: Option<&str>, date: NaiveDate) -> Option<WorkingPeriod> {
        if self.holidays.contains_key(&date) {
            return None;
        }
        let special = self.special_period(date);
        if matches!(special, Some(SpecialPeriod { rule: SpecialRule::Closed, .. })) {
            return None;
        }

        let day = self.schedule_for(department).day(date.weekday());
        if !day.open {
            return None;
        }

        let mut period = WorkingPeriod::new(day.start, day.end);
        if let Some(SpecialPeriod {
            rule: SpecialRule::EarlyClose(close),
            ..
        }) = special
        {
            let is_weekday = date.weekday().num_days_from_monday() < 5;
            if is_weekday && *close < period.end {
                period.end = (*close).max(period.start);
            }
        }
        Some(period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn default_schedule_is_closed_at_weekends() {
        let calendar = ScheduleCalendar::default();
        // 2025-03-08 is a Saturday
        assert!(!calendar.is_working_day(None, date(2025, 3, 8)));
        assert!(calendar.is_working_day(None, date(2025, 3, 10)));
        assert_eq!(
            calendar.working_period(Some("Administration"), date(2025, 3, 10)),
            Some(WorkingPeriod::new(hm(8, 30), hm(17, 30)))
        );
    }

    #[test]
    fn holidays_and_closures_close_every_department() {
        let calendar = ScheduleCalendar::default()
            .with_holiday(date(2025, 12, 25), "Christmas Day")
            .with_special_period(SpecialPeriod {
                start: date(2025, 12, 29),
                end: date(2025, 12, 31),
                description: "Year end".to_string(),
                rule: SpecialRule::Closed,
            });
        assert!(!calendar.is_working_day(Some("security"), date(2025, 12, 25)));
        assert!(!calendar.is_working_day(Some("security"), date(2025, 12, 30)));
        assert!(calendar.is_working_day(Some("security"), date(2025, 12, 27)));
    }

    #[test]
    fn early_close_shortens_weekdays_only() {
        let calendar = ScheduleCalendar::default().with_special_period(SpecialPeriod {
            start: date(2025, 7, 1),
            end: date(2025, 8, 31),
            description: "Summer hours".to_string(),
            rule: SpecialRule::EarlyClose(hm(16, 0)),
        });
        let tuesday = calendar.working_period(None, date(2025, 7, 1)).unwrap();
        assert_eq!(tuesday.end, hm(16, 0));
        let saturday = calendar
            .working_period(Some("maintenance"), date(2025, 7, 5))
            .unwrap();
        assert_eq!(saturday.end, hm(16, 0));
    }

    #[test]
    fn partial_department_names_match() {
        let calendar = ScheduleCalendar::default();
        let schedule = calendar.schedule_for(Some("Building Maintenance"));
        assert_eq!(schedule.day(Weekday::Sat), DaySchedule::open(hm(8, 0), hm(16, 0)));
        let unknown = calendar.schedule_for(Some("Archives"));
        assert_eq!(unknown.day(Weekday::Mon), DaySchedule::open(hm(9, 0), hm(17, 0)));
    }

    #[test]
    fn next_working_period_skips_weekend_and_finished_days() {
        let calendar = ScheduleCalendar::default();
        let friday_evening = date(2025, 3, 7).and_hms_opt(18, 0, 0).unwrap();
        let (next, period) = calendar.next_working_period(None, friday_evening).unwrap();
        assert_eq!(next, date(2025, 3, 10));
        assert_eq!(period.start, hm(9, 0));
        assert!(calendar.is_within_working_hours(None, date(2025, 3, 10).and_hms_opt(9, 0, 0).unwrap()));
    }

    #[test]
    fn upcoming_holidays_are_listed_in_order() {
        let calendar = ScheduleCalendar::default()
            .with_holiday(date(2026, 1, 1), "New Year's Day")
            .with_holiday(date(2025, 12, 26), "Boxing Day")
            .with_holiday(date(2026, 5, 1), "Labour Day");
        let upcoming = calendar.upcoming_holidays(date(2025, 12, 20), 30);
        let names: Vec<&str> = upcoming.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["Boxing Day", "New Year's Day"]);
        assert_eq!(calendar.holiday(date(2026, 5, 1)), Some("Labour Day"));
    }
}
