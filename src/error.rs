use thiserror::Error;

pub type Result<T> = std::result::Result<T, AttendanceError>;

/// Failures that abort a single core operation.
///
/// Debounce rejections, low-data analyses and data-quality findings are not
/// errors: they come back as `ToggleOutcome`, `Analysis::InsufficientData`
/// and `AnomalyReport::data_quality_issues` respectively.
#[derive(Error, Debug)]
pub enum AttendanceError {
    /// Missing schedule or reference data needed by this operation
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Malformed input, rejected before anything is written
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("employee {0} not found")]
    EmployeeNotFound(u64),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<sqlx::Error> for AttendanceError {
    fn from(e: sqlx::Error) -> Self {
        AttendanceError::Storage(e.to_string())
    }
}

impl AttendanceError {
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AttendanceError::Validation(_) | AttendanceError::EmployeeNotFound(_)
        )
    }
}
