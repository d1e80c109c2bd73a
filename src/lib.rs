//! Attendance core: event log, status derivation, clock toggling, analytics
//! and a three-level cache, wired together by [`AttendanceCore`].

use chrono::Duration;
use std::sync::Arc;

pub mod cache;
pub mod calendar;
pub mod clock;
pub mod config;
pub mod error;
pub mod model;
pub mod service;
pub mod store;
pub mod utils;

pub use error::{AttendanceError, Result};

use cache::CacheTier;
use calendar::OpeningHoursCalendar;
use clock::Clock;
use service::{
    AnalyticsService, DerivationSettings, PrecomputeScheduler, StatusDeriver, ToggleCoordinator,
};
use store::{AttendanceStore, DurableCache, EmployeeDirectory, EventLog};

#[derive(Debug, Clone)]
pub struct CoreSettings {
    pub debounce: Duration,
    pub derivation: DerivationSettings,
    pub cache_max_capacity: u64,
}

impl Default for CoreSettings {
    fn default() -> Self {
        Self {
            debounce: Duration::seconds(5),
            derivation: DerivationSettings::default(),
            cache_max_capacity: 100_000,
        }
    }
}

/// Backends the core reads and writes through.
#[derive(Clone)]
pub struct Stores {
    pub directory: Arc<dyn EmployeeDirectory>,
    pub events: Arc<dyn EventLog>,
    pub records: Arc<dyn AttendanceStore>,
    pub durable_cache: Arc<dyn DurableCache>,
}

impl Stores {
    /// Every seam served by one backend, e.g. a single MySQL pool.
    pub fn shared<S>(backend: S) -> Self
    where
        S: EmployeeDirectory + EventLog + AttendanceStore + DurableCache + 'static,
    {
        let backend = Arc::new(backend);
        Self {
            directory: backend.clone(),
            events: backend.clone(),
            records: backend.clone(),
            durable_cache: backend,
        }
    }
}

/// All services over one set of stores, sharing one cache tier and clock.
#[derive(Clone)]
pub struct AttendanceCore {
    pub cache: Arc<CacheTier>,
    pub deriver: Arc<StatusDeriver>,
    pub toggles: Arc<ToggleCoordinator>,
    pub analytics: Arc<AnalyticsService>,
    pub scheduler: Arc<PrecomputeScheduler>,
    pub clock: Arc<dyn Clock>,
}

impl AttendanceCore {
    pub fn new(
        stores: Stores,
        calendar: Arc<dyn OpeningHoursCalendar>,
        clock: Arc<dyn Clock>,
        settings: CoreSettings,
    ) -> Self {
        let cache = Arc::new(CacheTier::new(
            stores.durable_cache.clone(),
            clock.clone(),
            settings.cache_max_capacity,
        ));
        let deriver = Arc::new(StatusDeriver::new(
            stores.events.clone(),
            stores.records.clone(),
            stores.directory.clone(),
            calendar,
            cache.clone(),
            settings.derivation,
        ));
        let toggles = Arc::new(ToggleCoordinator::new(
            stores.events.clone(),
            stores.directory.clone(),
            deriver.clone(),
            cache.clone(),
            clock.clone(),
            settings.debounce,
        ));
        let analytics = Arc::new(AnalyticsService::new(
            stores.records.clone(),
            stores.directory.clone(),
            cache.clone(),
            clock.clone(),
        ));
        let scheduler = Arc::new(PrecomputeScheduler::new(
            stores.directory,
            stores.events,
            stores.records,
            deriver.clone(),
            cache.clone(),
            clock.clone(),
        ));
        Self {
            cache,
            deriver,
            toggles,
            analytics,
            scheduler,
            clock,
        }
    }
}
