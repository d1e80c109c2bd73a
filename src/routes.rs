use crate::api::{analytics, attendance, cache};
use actix_web::web;

pub fn configure(cfg: &mut web::ServiceConfig, api_prefix: &str) {
    cfg.service(
        web::scope(api_prefix)
            .service(
                web::scope("/attendance")
                    // /attendance/{employee_id}/toggle
                    .service(
                        web::resource("/{employee_id}/toggle")
                            .route(web::post().to(attendance::toggle)),
                    )
                    // /attendance/{employee_id}/{date}
                    .service(
                        web::resource("/{employee_id}/{date}")
                            .route(web::get().to(attendance::status)),
                    ),
            )
            .service(
                web::scope("/analytics")
                    .service(web::resource("/patterns").route(web::get().to(analytics::patterns)))
                    .service(web::resource("/anomalies").route(web::get().to(analytics::anomalies)))
                    .service(web::resource("/forecast").route(web::get().to(analytics::forecast))),
            )
            .service(
                web::scope("/cache")
                    // /cache?pattern=
                    .service(web::resource("").route(web::delete().to(cache::invalidate)))
                    .service(web::resource("/stats").route(web::get().to(cache::stats))),
            ),
    );
}
