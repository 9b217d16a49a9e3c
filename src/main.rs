use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusBuilder;

use stamp_ocr::app_state::AppState;
use stamp_ocr::config::AppConfig;
use stamp_ocr::db::{self, PgStore};
use stamp_ocr::{routes, telemetry};

#[tokio::main]
async fn main() {
    telemetry::init_tracing();

    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing stamp-ocr API server");

    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    telemetry::describe_metrics();

    tracing::info!("Connecting to PostgreSQL database");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Running database migrations");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    let store = Arc::new(PgStore::new(db_pool));
    let state = AppState::new(store.clone(), store);

    let app = routes::router(state, Arc::new(prometheus_handle));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await
        .expect("Server error");
}
