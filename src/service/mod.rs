//! Core attendance services.
//!
//! Each service is constructed with its stores, calendar, cache and clock;
//! none of them holds global state.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::error::Result;
use crate::model::normalize_department;
use crate::store::EmployeeDirectory;

pub mod analytics;
pub mod anomalies;
pub mod forecast;
pub mod patterns;
pub mod precompute;
pub mod status;
pub mod toggle;

pub use analytics::AnalyticsService;
pub use precompute::PrecomputeScheduler;
pub use status::{DerivationSettings, StatusDeriver, StatusSnapshot};
pub use toggle::{ClockState, ToggleCoordinator, ToggleOutcome, ToggleReason};

/// Result of an analysis that needs a minimum sample size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Analysis<T> {
    Computed(T),
    InsufficientData { required: usize, available: usize },
}

impl<T> Analysis<T> {
    pub fn computed(self) -> Option<T> {
        match self {
            Analysis::Computed(value) => Some(value),
            Analysis::InsufficientData { .. } => None,
        }
    }

    pub fn is_computed(&self) -> bool {
        matches!(self, Analysis::Computed(_))
    }
}

/// Department of every employee behind `employee_ids`, inactive ones included.
///
/// Ids the directory does not know are left out and group as unknown.
pub(crate) async fn department_map(
    directory: &dyn EmployeeDirectory,
    employee_ids: impl IntoIterator<Item = u64>,
) -> Result<HashMap<u64, String>> {
    let mut departments: HashMap<u64, String> = directory
        .active_employees()
        .await?
        .into_iter()
        .map(|e| (e.id, normalize_department(e.department.as_deref())))
        .collect();
    let missing: BTreeSet<u64> = employee_ids
        .into_iter()
        .filter(|id| !departments.contains_key(id))
        .collect();
    for id in missing {
        if let Some(employee) = directory.employee(id).await? {
            departments.insert(id, normalize_department(employee.department.as_deref()));
        }
    }
    Ok(departments)
}
