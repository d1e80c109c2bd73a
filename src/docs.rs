use crate::api::analytics::{ForecastQuery, LookbackQuery};
use crate::api::attendance::{ToggleRequest, ToggleResponse};
use crate::api::cache::{InvalidateQuery, InvalidateResponse};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "HRM Attendance API",
        version = "0.1.0",
        description = r#"
## Attendance Core

Clock-in/out tracking with derived daily attendance records, analytics and a
tiered report cache.

### Key Features
- **Clock toggling**
  - One endpoint flips an employee between clocked in and clocked out
  - Repeated taps inside the debounce window are rejected with `429`
- **Daily status**
  - Early / on time / late / absent, with a completion score per day
- **Analytics**
  - Employee and department patterns, anomaly detection, short-term forecast
- **Cache**
  - Pattern invalidation and tier statistics

### Response Format
- JSON bodies
- Analyses with too little history return `required` and `available` counts

---
Built with **Rust**, **Actix Web**, **SQLx**, **Moka** and **Utoipa**.
"#,
    ),
    paths(
        crate::api::attendance::toggle,
        crate::api::attendance::status,

        crate::api::analytics::patterns,
        crate::api::analytics::anomalies,
        crate::api::analytics::forecast,

        crate::api::cache::invalidate,
        crate::api::cache::stats
    ),
    components(
        schemas(
            ToggleRequest,
            ToggleResponse,
            LookbackQuery,
            ForecastQuery,
            InvalidateQuery,
            InvalidateResponse
        )
    ),
    tags(
        (name = "Attendance", description = "Clock toggling and daily status"),
        (name = "Analytics", description = "Patterns, anomalies and forecasts"),
        (name = "Cache", description = "Report cache maintenance"),
    )
)]
pub struct ApiDoc;
