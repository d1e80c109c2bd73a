use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cache::{CacheKey, CacheTag, CacheTier};
use crate::calendar::OpeningHoursCalendar;
use crate::error::{AttendanceError, Result};
use crate::model::{AttendanceRecord, AttendanceStatus, ClockEvent, Employee, EventKind};
use crate::store::{AttendanceStore, EmployeeDirectory, EventLog};
use crate::utils::stats::round2;

#[derive(Debug, Clone)]
pub struct DerivationSettings {
    /// Window either side of the baseline arrival.
    pub grace: Duration,
    pub lunch_allowance: Duration,
    /// Lunch start used when the employee has none assigned.
    pub default_lunch: NaiveTime,
}

impl Default for DerivationSettings {
    fn default() -> Self {
        Self {
            grace: Duration::minutes(30),
            lunch_allowance: Duration::minutes(60),
            default_lunch: NaiveTime::from_hms_opt(12, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

/// Live view of one employee on one day, as served to dashboards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub employee_id: u64,
    pub date: NaiveDate,
    pub is_clocked_in: bool,
    pub first_clock_in: Option<NaiveDateTime>,
    pub last_clock_out: Option<NaiveDateTime>,
    /// `None` on a non-working day.
    pub record: Option<AttendanceRecord>,
}

fn seconds(t: NaiveTime) -> i64 {
    i64::from(t.num_seconds_from_midnight())
}

/// Arrival classification against a baseline with a symmetric grace window.
pub fn classify_arrival(arrival: NaiveTime, baseline: NaiveTime, grace: Duration) -> AttendanceStatus {
    let arrival = seconds(arrival);
    let baseline = seconds(baseline);
    let grace = grace.num_seconds();
    if arrival <= baseline - grace {
        AttendanceStatus::Early
    } else if arrival <= baseline + grace {
        AttendanceStatus::OnTime
    } else {
        AttendanceStatus::Late
    }
}

/// Builds the record for `date` from that day's events.
///
/// Returns `Ok(None)` on a non-working day. The first ClockIn is the arrival;
/// the departure is the last ClockOut after it, so a ClockOut with no prior
/// ClockIn never becomes a departure.
pub fn derive_record(
    employee: &Employee,
    date: NaiveDate,
    events: &[ClockEvent],
    calendar: &dyn OpeningHoursCalendar,
    settings: &DerivationSettings,
) -> Result<Option<AttendanceRecord>> {
    let department = employee.department_name();
    if !calendar.is_working_day(department, date) {
        return Ok(None);
    }
    let period = calendar.working_period(department, date);
    let baseline = employee
        .assigned_arrival_time
        .or(period.map(|p| p.start))
        .ok_or_else(|| {
            AttendanceError::Configuration(format!(
                "no baseline arrival for employee {} on {}",
                employee.id, date
            ))
        })?;

    let mut day: Vec<&ClockEvent> = events
        .iter()
        .filter(|e| e.employee_id == employee.id && e.date() == date)
        .collect();
    day.sort_by_key(|e| e.timestamp);

    let Some(arrival) = day.iter().find(|e| e.kind.is_arrival()) else {
        if day.iter().any(|e| e.kind.is_departure()) {
            warn!(employee_id = employee.id, %date, "Clock-out without clock-in; not paired");
        }
        return Ok(Some(AttendanceRecord {
            employee_id: employee.id,
            date,
            arrival_time: None,
            departure_time: None,
            status: AttendanceStatus::Absent,
            completion_percentage: 0.0,
            is_problematic_day: true,
        }));
    };
    let departure = day
        .iter()
        .rev()
        .find(|e| e.kind.is_departure() && e.timestamp > arrival.timestamp)
        .map(|e| e.timestamp.time());

    let stand_up = day.iter().any(|e| e.kind == EventKind::StandUp);

    let lunch_start = employee.assigned_lunch_time.unwrap_or(settings.default_lunch);
    let lunch_return = match day.iter().find(|e| e.kind == EventKind::LunchOut) {
        None => true,
        Some(out) => day
            .iter()
            .find(|e| e.kind == EventKind::LunchIn && e.timestamp >= out.timestamp)
            .is_some_and(|back| {
                seconds(back.timestamp.time())
                    <= seconds(lunch_start) + settings.lunch_allowance.num_seconds()
            }),
    };

    let expected_departure = employee.assigned_departure_time.or(period.map(|p| p.end));
    let on_time_departure = match (departure, expected_departure) {
        (Some(left), Some(expected)) => left >= expected,
        (Some(_), None) => true,
        (None, _) => false,
    };

    let checks = [stand_up, lunch_return, on_time_departure];
    let passed = checks.iter().filter(|c| **c).count();
    let failed = checks.len() - passed;

    Ok(Some(AttendanceRecord {
        employee_id: employee.id,
        date,
        arrival_time: Some(arrival.timestamp.time()),
        departure_time: departure,
        status: classify_arrival(arrival.timestamp.time(), baseline, settings.grace),
        completion_percentage: round2(passed as f64 / checks.len() as f64 * 100.0),
        is_problematic_day: failed >= 2,
    }))
}

/// Time between each ClockIn and the ClockOut that follows it.
pub fn worked_time(events: &[ClockEvent]) -> Option<Duration> {
    let mut total = Duration::zero();
    let mut open: Option<NaiveDateTime> = None;
    for event in events {
        match event.kind {
            EventKind::ClockIn => open = Some(event.timestamp),
            EventKind::ClockOut => {
                if let Some(start) = open.take() {
                    total += event.timestamp - start;
                }
            }
            _ => {}
        }
    }
    (total > Duration::zero()).then_some(total)
}

/// Turns the event log into authoritative daily records.
pub struct StatusDeriver {
    events: Arc<dyn EventLog>,
    records: Arc<dyn AttendanceStore>,
    directory: Arc<dyn EmployeeDirectory>,
    calendar: Arc<dyn OpeningHoursCalendar>,
    cache: Arc<CacheTier>,
    settings: DerivationSettings,
}

impl StatusDeriver {
    pub fn new(
        events: Arc<dyn EventLog>,
        records: Arc<dyn AttendanceStore>,
        directory: Arc<dyn EmployeeDirectory>,
        calendar: Arc<dyn OpeningHoursCalendar>,
        cache: Arc<CacheTier>,
        settings: DerivationSettings,
    ) -> Self {
        Self {
            events,
            records,
            directory,
            calendar,
            cache,
            settings,
        }
    }

    async fn employee(&self, employee_id: u64) -> Result<Employee> {
        self.directory
            .employee(employee_id)
            .await?
            .ok_or(AttendanceError::EmployeeNotFound(employee_id))
    }

    /// Recompute and upsert the record for (employee, date).
    pub async fn derive_status(
        &self,
        employee_id: u64,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>> {
        let employee = self.employee(employee_id).await?;
        let events = self.events.events_for_day(employee_id, date).await?;
        self.derive_from(&employee, date, &events).await
    }

    async fn derive_from(
        &self,
        employee: &Employee,
        date: NaiveDate,
        events: &[ClockEvent],
    ) -> Result<Option<AttendanceRecord>> {
        let Some(record) = derive_record(employee, date, events, self.calendar.as_ref(), &self.settings)?
        else {
            debug!(employee_id = employee.id, %date, "Non-working day; no status applies");
            return Ok(None);
        };
        let previous = self.records.get(employee.id, date).await?;
        self.records.upsert(&record).await?;
        if previous.as_ref() != Some(&record) {
            // reports over past windows read this record
            self.cache.invalidate_tag(&CacheTag::Analytics).await;
        }
        info!(
            employee_id = employee.id,
            %date,
            status = %record.status,
            completion = record.completion_percentage,
            "Attendance record derived"
        );
        Ok(Some(record))
    }

    /// Recompute the record and assemble the live snapshot around it.
    pub async fn snapshot(&self, employee_id: u64, date: NaiveDate) -> Result<StatusSnapshot> {
        let employee = self.employee(employee_id).await?;
        let events = self.events.events_for_day(employee_id, date).await?;
        let record = self.derive_from(&employee, date, &events).await?;

        let ins = events.iter().filter(|e| e.kind == EventKind::ClockIn).count();
        let outs = events.iter().filter(|e| e.kind == EventKind::ClockOut).count();
        let is_clocked_in = ins > outs;
        Ok(StatusSnapshot {
            employee_id,
            date,
            is_clocked_in,
            first_clock_in: events
                .iter()
                .find(|e| e.kind == EventKind::ClockIn)
                .map(|e| e.timestamp),
            last_clock_out: events
                .iter()
                .rev()
                .find(|e| e.kind == EventKind::ClockOut)
                .map(|e| e.timestamp),
            record,
        })
    }

    /// Read-through variant: cached snapshot, derived on a miss.
    pub async fn status_for(&self, employee_id: u64, date: NaiveDate) -> Result<StatusSnapshot> {
        let key = CacheKey::EmployeeStatus { employee_id, date };
        self.cache
            .get_or_compute(&key, None, || self.snapshot(employee_id, date))
            .await
    }

    pub async fn work_duration(&self, employee_id: u64, date: NaiveDate) -> Result<Option<Duration>> {
        let events = self.events.events_for_day(employee_id, date).await?;
        Ok(worked_time(&events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::ScheduleCalendar;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 3).unwrap()
    }

    fn event(kind: EventKind, h: u32, m: u32) -> ClockEvent {
        ClockEvent::new(1, kind, monday().and_time(t(h, m)))
    }

    fn employee() -> Employee {
        Employee::new(1, "Ada Clerk").with_schedule(t(8, 0), t(16, 30))
    }

    #[test]
    fn classification_boundaries() {
        let grace = Duration::minutes(30);
        assert_eq!(classify_arrival(t(7, 30), t(8, 0), grace), AttendanceStatus::Early);
        assert_eq!(classify_arrival(t(7, 31), t(8, 0), grace), AttendanceStatus::OnTime);
        assert_eq!(classify_arrival(t(8, 0), t(8, 0), grace), AttendanceStatus::OnTime);
        assert_eq!(classify_arrival(t(8, 30), t(8, 0), grace), AttendanceStatus::OnTime);
        assert_eq!(classify_arrival(t(8, 31), t(8, 0), grace), AttendanceStatus::Late);
    }

    #[test]
    fn early_threshold_does_not_wrap_past_midnight() {
        let grace = Duration::minutes(30);
        assert_eq!(classify_arrival(t(0, 5), t(0, 10), grace), AttendanceStatus::OnTime);
        assert_eq!(classify_arrival(t(23, 50), t(0, 10), grace), AttendanceStatus::Late);
    }

    #[test]
    fn full_day_passes_every_check() {
        let events = vec![
            event(EventKind::ClockIn, 7, 55),
            event(EventKind::StandUp, 8, 15),
            event(EventKind::LunchOut, 12, 0),
            event(EventKind::LunchIn, 12, 45),
            event(EventKind::ClockOut, 16, 40),
        ];
        let record = derive_record(
            &employee(),
            monday(),
            &events,
            &ScheduleCalendar::default(),
            &DerivationSettings::default(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(record.status, AttendanceStatus::OnTime);
        assert_eq!(record.completion_percentage, 100.0);
        assert!(!record.is_problematic_day);
        assert_eq!(record.departure_time, Some(t(16, 40)));
    }

    #[test]
    fn late_lunch_and_early_departure_make_a_problematic_day() {
        let events = vec![
            event(EventKind::ClockIn, 8, 0),
            event(EventKind::StandUp, 8, 15),
            event(EventKind::LunchOut, 12, 0),
            event(EventKind::LunchIn, 13, 30),
            event(EventKind::ClockOut, 15, 0),
        ];
        let record = derive_record(
            &employee(),
            monday(),
            &events,
            &ScheduleCalendar::default(),
            &DerivationSettings::default(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(record.completion_percentage, 33.33);
        assert!(record.is_problematic_day);
    }

    #[test]
    fn first_arrival_wins_and_lone_departure_is_not_paired() {
        let events = vec![
            event(EventKind::ClockOut, 7, 0),
            event(EventKind::ClockIn, 8, 45),
            event(EventKind::ClockIn, 9, 10),
        ];
        let record = derive_record(
            &employee(),
            monday(),
            &events,
            &ScheduleCalendar::default(),
            &DerivationSettings::default(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(record.arrival_time, Some(t(8, 45)));
        assert_eq!(record.status, AttendanceStatus::Late);
        assert_eq!(record.departure_time, None);

        let lone = vec![event(EventKind::ClockOut, 17, 0)];
        let record = derive_record(
            &employee(),
            monday(),
            &lone,
            &ScheduleCalendar::default(),
            &DerivationSettings::default(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(record.status, AttendanceStatus::Absent);
        assert_eq!(record.departure_time, None);
    }

    #[test]
    fn department_opening_time_is_the_fallback_baseline() {
        let clerk = Employee::new(2, "Office Clerk").with_department("Administration");
        let events = vec![ClockEvent::new(2, EventKind::ClockIn, monday().and_time(t(9, 5)))];
        let record = derive_record(
            &clerk,
            monday(),
            &events,
            &ScheduleCalendar::default(),
            &DerivationSettings::default(),
        )
        .unwrap()
        .unwrap();
        // administration opens 08:30, so 09:05 is past the grace window
        assert_eq!(record.status, AttendanceStatus::Late);
    }

    #[test]
    fn weekend_has_no_applicable_status() {
        let saturday = NaiveDate::from_ymd_opt(2025, 3, 8).unwrap();
        let record = derive_record(
            &employee(),
            saturday,
            &[],
            &ScheduleCalendar::default(),
            &DerivationSettings::default(),
        )
        .unwrap();
        assert!(record.is_none());
    }

    #[test]
    fn worked_time_pairs_in_and_out() {
        let events = vec![
            event(EventKind::ClockOut, 7, 0),
            event(EventKind::ClockIn, 8, 0),
            event(EventKind::ClockOut, 12, 0),
            event(EventKind::ClockIn, 13, 0),
            event(EventKind::ClockOut, 17, 0),
        ];
        assert_eq!(worked_time(&events), Some(Duration::hours(8)));
        assert_eq!(worked_time(&events[..1]), None);
    }
}
