pub mod analytics;
pub mod attendance;
pub mod cache;

use actix_web::error::{
    ErrorBadRequest, ErrorInternalServerError, ErrorNotFound, ErrorUnprocessableEntity,
};
use hrm_attendance::AttendanceError;

/// Map a core failure onto an HTTP error, logging anything server-side.
pub fn core_error(e: AttendanceError) -> actix_web::Error {
    match e {
        AttendanceError::Validation(message) => ErrorBadRequest(message),
        AttendanceError::EmployeeNotFound(id) => ErrorNotFound(format!("Employee {id} not found")),
        AttendanceError::Configuration(message) => {
            tracing::warn!(error = %message, "Missing reference data for request");
            ErrorUnprocessableEntity(message)
        }
        other => {
            tracing::error!(error = %other, "Request failed");
            ErrorInternalServerError("Internal Server Error")
        }
    }
}
