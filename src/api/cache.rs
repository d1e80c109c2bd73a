use actix_web::{HttpResponse, error::ErrorBadRequest, web};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use hrm_attendance::AttendanceCore;

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct InvalidateQuery {
    #[schema(example = "dept_summary:")]
    /// Substring of the cache keys to drop
    pub pattern: String,
}

#[derive(Serialize, ToSchema)]
pub struct InvalidateResponse {
    #[schema(example = "dept_summary:")]
    pub pattern: String,
    #[schema(example = 12)]
    pub invalidated: u64,
}

/// Drop every cache entry whose key contains the pattern
#[utoipa::path(
    delete,
    path = "/api/cache",
    params(InvalidateQuery),
    responses(
        (status = 200, description = "Entries invalidated", body = InvalidateResponse),
        (status = 400, description = "Empty pattern")
    ),
    tag = "Cache"
)]
pub async fn invalidate(
    core: web::Data<AttendanceCore>,
    query: web::Query<InvalidateQuery>,
) -> actix_web::Result<HttpResponse> {
    let pattern = query.into_inner().pattern;
    if pattern.trim().is_empty() {
        return Err(ErrorBadRequest("pattern must not be empty"));
    }
    let invalidated = core.cache.invalidate_pattern(&pattern).await;
    info!(pattern = %pattern, invalidated, "Cache invalidated on request");
    Ok(HttpResponse::Ok().json(InvalidateResponse {
        pattern,
        invalidated,
    }))
}

/// Cache tier statistics and precomputation readiness
#[utoipa::path(
    get,
    path = "/api/cache/stats",
    responses(
        (status = 200, description = "Cache statistics", body = Object, example = json!({
            "today_ready": true,
            "yesterday_ready": false,
            "current_week_ready": true,
            "cache": {
                "fast_entries": 120,
                "durable_entries": 96,
                "expired_entries": 4,
                "valid_entries": 92,
                "cache_hit_rate": 95.83,
                "cache_health": "GOOD"
            }
        }))
    ),
    tag = "Cache"
)]
pub async fn stats(core: web::Data<AttendanceCore>) -> actix_web::Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(core.scheduler.status().await))
}
