use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use strum::{AsRefStr, Display};
use tracing::{error, info, warn};

use super::status::StatusDeriver;
use crate::cache::{CacheTag, CacheTier};
use crate::clock::Clock;
use crate::error::{AttendanceError, Result};
use crate::model::{ClockEvent, EventKind};
use crate::store::{EmployeeDirectory, EventLog};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ClockState {
    ClockedOut,
    ClockedIn,
}

impl ClockState {
    fn after(kind: Option<EventKind>) -> Self {
        match kind {
            Some(EventKind::ClockIn) => ClockState::ClockedIn,
            _ => ClockState::ClockedOut,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToggleReason {
    Flipped,
    /// Debounce rejection; the caller may retry after the cooldown.
    TooSoon { remaining_ms: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleOutcome {
    pub accepted: bool,
    /// State after the call; unchanged when rejected.
    pub state: ClockState,
    pub reason: ToggleReason,
    pub at: NaiveDateTime,
}

/// The public clock-in/out action.
///
/// Debounce check and append run under a per-employee async mutex, so two
/// concurrent toggles for one employee can never both be accepted inside the
/// debounce window.
pub struct ToggleCoordinator {
    events: Arc<dyn EventLog>,
    directory: Arc<dyn EmployeeDirectory>,
    deriver: Arc<StatusDeriver>,
    cache: Arc<CacheTier>,
    clock: Arc<dyn Clock>,
    debounce: Duration,
    locks: Mutex<HashMap<u64, Arc<tokio::sync::Mutex<()>>>>,
}

impl ToggleCoordinator {
    pub fn new(
        events: Arc<dyn EventLog>,
        directory: Arc<dyn EmployeeDirectory>,
        deriver: Arc<StatusDeriver>,
        cache: Arc<CacheTier>,
        clock: Arc<dyn Clock>,
        debounce: Duration,
    ) -> Self {
        Self {
            events,
            directory,
            deriver,
            cache,
            clock,
            debounce,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, employee_id: u64) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(employee_id).or_default().clone()
    }

    pub async fn toggle(
        &self,
        employee_id: u64,
        actor: &str,
        location: Option<&str>,
    ) -> Result<ToggleOutcome> {
        let actor = actor.trim();
        if actor.is_empty() {
            return Err(AttendanceError::Validation("actor must not be empty".into()));
        }
        match self.directory.employee(employee_id).await? {
            Some(employee) if employee.is_active => {}
            Some(_) => {
                return Err(AttendanceError::Validation(format!(
                    "employee {employee_id} is inactive"
                )));
            }
            None => return Err(AttendanceError::EmployeeNotFound(employee_id)),
        }

        let lock = self.lock_for(employee_id);
        let _guard = lock.lock().await;

        let now = self.clock.now();
        let latest = self.events.latest_clock_event(employee_id).await?;
        let current = ClockState::after(latest.as_ref().map(|e| e.kind));

        if let Some(last) = &latest {
            // a clock stepped backwards counts as no time passed
            let elapsed = (now - last.timestamp).max(Duration::zero());
            if elapsed < self.debounce {
                let remaining_ms = (self.debounce - elapsed).num_milliseconds().max(0) as u64;
                warn!(employee_id, remaining_ms, "Toggle rejected by debounce window");
                return Ok(ToggleOutcome {
                    accepted: false,
                    state: current,
                    reason: ToggleReason::TooSoon { remaining_ms },
                    at: now,
                });
            }
        }

        let kind = latest
            .and_then(|e| e.kind.opposite())
            .unwrap_or(EventKind::ClockIn);
        let mut event = ClockEvent::new(employee_id, kind, now).by(actor);
        if let Some(location) = location.map(str::trim).filter(|l| !l.is_empty()) {
            event = event.at_location(location);
        }
        self.events.append(&event).await?;
        info!(employee_id, kind = %kind, actor, "Clock event recorded");

        self.cache.invalidate_tag(&CacheTag::Employee(employee_id)).await;
        self.cache.invalidate_tag(&CacheTag::Date(now.date())).await;

        // the event is already recorded; a failed derivation is retried on the next read
        if kind.is_departure() {
            if let Err(e) = self.deriver.derive_status(employee_id, now.date()).await {
                error!(employee_id, error = %e, "Failed to derive status after clock-out");
            }
        }

        Ok(ToggleOutcome {
            accepted: true,
            state: ClockState::after(Some(kind)),
            reason: ToggleReason::Flipped,
            at: now,
        })
    }

    /// Current state from the most recent clock event, any day.
    pub async fn clock_state(&self, employee_id: u64) -> Result<ClockState> {
        let latest = self.events.latest_clock_event(employee_id).await?;
        Ok(ClockState::after(latest.map(|e| e.kind)))
    }

    /// Whether the day's clock events leave the employee clocked in.
    pub async fn is_clocked_in_on(&self, employee_id: u64, date: NaiveDate) -> Result<bool> {
        let events = self.events.events_for_day(employee_id, date).await?;
        let ins = events.iter().filter(|e| e.kind == EventKind::ClockIn).count();
        let outs = events.iter().filter(|e| e.kind == EventKind::ClockOut).count();
        Ok(ins > outs)
    }
}
