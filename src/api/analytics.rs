use actix_web::{HttpResponse, web};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use super::core_error;
use hrm_attendance::AttendanceCore;
use hrm_attendance::config::Config;

const DEFAULT_FORECAST_DAYS: u32 = 7;

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct LookbackQuery {
    #[schema(example = 60)]
    /// Days of history to analyse (1-365); defaults to the configured window
    pub lookback_days: Option<u32>,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct ForecastQuery {
    #[schema(example = 7)]
    /// Days to forecast (1-90)
    pub days_ahead: Option<u32>,
}

/// Employee, weekday, department and weekly trend patterns
#[utoipa::path(
    get,
    path = "/api/analytics/patterns",
    params(LookbackQuery),
    responses(
        (status = 200, description = "Pattern report, or the sample size still missing", body = Object, example = json!({
            "outcome": "insufficient_data",
            "required": 30,
            "available": 12
        })),
        (status = 400, description = "Lookback out of range")
    ),
    tag = "Analytics"
)]
pub async fn patterns(
    core: web::Data<AttendanceCore>,
    config: web::Data<Config>,
    query: web::Query<LookbackQuery>,
) -> actix_web::Result<HttpResponse> {
    let lookback = query.lookback_days.unwrap_or(config.pattern_lookback_days);
    let analysis = core
        .analytics
        .analyze_patterns(lookback)
        .await
        .map_err(core_error)?;
    Ok(HttpResponse::Ok().json(analysis))
}

/// Completion outliers, absence shifts and data quality findings
#[utoipa::path(
    get,
    path = "/api/analytics/anomalies",
    params(LookbackQuery),
    responses(
        (status = 200, description = "Anomaly report, or the sample size still missing", body = Object),
        (status = 400, description = "Lookback out of range")
    ),
    tag = "Analytics"
)]
pub async fn anomalies(
    core: web::Data<AttendanceCore>,
    config: web::Data<Config>,
    query: web::Query<LookbackQuery>,
) -> actix_web::Result<HttpResponse> {
    let lookback = query.lookback_days.unwrap_or(config.pattern_lookback_days);
    let analysis = core
        .analytics
        .detect_anomalies(lookback)
        .await
        .map_err(core_error)?;
    Ok(HttpResponse::Ok().json(analysis))
}

/// Attendance and punctuality forecast
#[utoipa::path(
    get,
    path = "/api/analytics/forecast",
    params(ForecastQuery),
    responses(
        (status = 200, description = "Forecast series, or the sample size still missing", body = Object, example = json!({
            "outcome": "computed",
            "as_of": "2025-03-03",
            "days_ahead": 1,
            "history_days": 60,
            "model": "moving_average_with_weekday_adjustment",
            "points": [{
                "date": "2025-03-04",
                "weekday": "Tuesday",
                "predicted_attendance_rate": 91.4,
                "predicted_punctuality_rate": 78.2,
                "confidence": "medium"
            }]
        })),
        (status = 400, description = "days_ahead out of range")
    ),
    tag = "Analytics"
)]
pub async fn forecast(
    core: web::Data<AttendanceCore>,
    query: web::Query<ForecastQuery>,
) -> actix_web::Result<HttpResponse> {
    let days_ahead = query.days_ahead.unwrap_or(DEFAULT_FORECAST_DAYS);
    let analysis = core
        .analytics
        .forecast(days_ahead)
        .await
        .map_err(core_error)?;
    Ok(HttpResponse::Ok().json(analysis))
}
