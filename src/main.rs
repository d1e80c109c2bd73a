use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use std::sync::Arc;
use std::time::Duration;

mod api;
mod db;
mod docs;
mod routes;

use db::init_db;
use hrm_attendance::clock::SystemClock;
use hrm_attendance::config::Config;
use hrm_attendance::store::mysql::MySqlStore;
use hrm_attendance::{AttendanceCore, Stores};

use crate::docs::ApiDoc;
use tracing::{info, warn};
use tracing_appender::rolling;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index() -> impl Responder {
    "Attendance service is running"
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "attendance.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    let pool = init_db(&config.database_url).await?;
    let calendar = Arc::new(config.calendar());
    let core = AttendanceCore::new(
        Stores::shared(MySqlStore::new(pool)),
        calendar,
        Arc::new(SystemClock),
        config.core_settings(),
    );

    if config.precompute_interval_secs > 0 {
        let scheduler = core.scheduler.clone();
        let every = Duration::from_secs(config.precompute_interval_secs);
        actix_web::rt::spawn(async move {
            let mut ticker = actix_web::rt::time::interval(every);
            loop {
                ticker.tick().await;
                let reports = scheduler.run_once().await;
                let failed: usize = reports.iter().map(|r| r.failed().len()).sum();
                if failed > 0 {
                    warn!(failed, "Precompute run finished with failed categories");
                }
            }
        });
    } else {
        info!("Background precomputation disabled");
    }

    let server_addr = config.server_addr.clone();
    let api_prefix = config.api_prefix.clone();
    let core_data = Data::new(core);
    let config_data = Data::new(config);

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // wildcard so JS/CSS assets resolve
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(core_data.clone())
            .app_data(config_data.clone())
            .service(index)
            .configure(|cfg| routes::configure(cfg, &api_prefix))
    })
    .bind(server_addr)?
    .run()
    .await?;

    Ok(())
}
