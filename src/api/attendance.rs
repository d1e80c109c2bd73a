use actix_web::{HttpResponse, error::ErrorBadRequest, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

use super::core_error;
use hrm_attendance::AttendanceCore;
use hrm_attendance::service::ToggleReason;

#[derive(Deserialize, ToSchema)]
pub struct ToggleRequest {
    #[schema(example = "front-desk-terminal")]
    /// Who performed the action
    pub actor: String,
    #[schema(example = "Main entrance")]
    pub location: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct ToggleResponse {
    #[schema(example = true)]
    pub accepted: bool,
    #[schema(example = "clocked_in")]
    pub state: String,
    #[schema(example = "2025-03-03T08:05:00", value_type = String)]
    pub at: chrono::NaiveDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = 3200)]
    pub retry_after_ms: Option<u64>,
}

/// Clock an employee in or out, whichever is opposite to their last action
#[utoipa::path(
    post,
    path = "/api/attendance/{employee_id}/toggle",
    params(
        ("employee_id" = u64, Path, description = "Employee to clock in or out")
    ),
    request_body(
        content = ToggleRequest,
        description = "Toggle payload",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Toggle accepted", body = ToggleResponse),
        (status = 429, description = "Too soon after the previous toggle", body = ToggleResponse, example = json!({
            "accepted": false,
            "state": "clocked_in",
            "at": "2025-03-03T08:05:01",
            "retry_after_ms": 4000
        })),
        (status = 400, description = "Invalid input or inactive employee"),
        (status = 404, description = "Employee not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Attendance"
)]
pub async fn toggle(
    core: web::Data<AttendanceCore>,
    path: web::Path<u64>,
    body: web::Json<ToggleRequest>,
) -> actix_web::Result<HttpResponse> {
    let employee_id = path.into_inner();
    let outcome = core
        .toggles
        .toggle(employee_id, &body.actor, body.location.as_deref())
        .await
        .map_err(core_error)?;

    let mut response = ToggleResponse {
        accepted: outcome.accepted,
        state: outcome.state.to_string(),
        at: outcome.at,
        retry_after_ms: None,
    };
    match outcome.reason {
        ToggleReason::Flipped => Ok(HttpResponse::Ok().json(response)),
        ToggleReason::TooSoon { remaining_ms } => {
            response.retry_after_ms = Some(remaining_ms);
            let retry_after_secs = remaining_ms.div_ceil(1000).max(1);
            Ok(HttpResponse::TooManyRequests()
                .insert_header(("Retry-After", retry_after_secs.to_string()))
                .json(response))
        }
    }
}

/// Status of one employee on one day, served from the cache when fresh
#[utoipa::path(
    get,
    path = "/api/attendance/{employee_id}/{date}",
    params(
        ("employee_id" = u64, Path, description = "Employee ID"),
        ("date" = String, Path, description = "Day as YYYY-MM-DD")
    ),
    responses(
        (status = 200, description = "Status snapshot", body = Object, example = json!({
            "employee_id": 7,
            "date": "2025-03-03",
            "is_clocked_in": false,
            "first_clock_in": "2025-03-03T08:05:00",
            "last_clock_out": "2025-03-03T16:30:00",
            "record": {
                "status": "on_time",
                "arrival_time": "08:05:00",
                "departure_time": "16:30:00",
                "completion_percentage": 33.33,
                "is_problematic_day": true
            }
        })),
        (status = 204, description = "Not a working day for this employee"),
        (status = 400, description = "Malformed date"),
        (status = 404, description = "Employee not found"),
        (status = 422, description = "No baseline schedule for this employee")
    ),
    tag = "Attendance"
)]
pub async fn status(
    core: web::Data<AttendanceCore>,
    path: web::Path<(u64, String)>,
) -> actix_web::Result<HttpResponse> {
    let (employee_id, raw_date) = path.into_inner();
    let date = NaiveDate::parse_from_str(&raw_date, "%Y-%m-%d")
        .map_err(|_| ErrorBadRequest("date must be YYYY-MM-DD"))?;

    let snapshot = core
        .deriver
        .status_for(employee_id, date)
        .await
        .map_err(core_error)?;

    if snapshot.record.is_none() {
        debug!(employee_id, %date, "No status on a non-working day");
        return Ok(HttpResponse::NoContent().finish());
    }
    Ok(HttpResponse::Ok().json(snapshot))
}
