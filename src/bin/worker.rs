use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

use stamp_ocr::config::AppConfig;
use stamp_ocr::db::{self, PgStore};
use stamp_ocr::services::extraction::StampExtractor;
use stamp_ocr::services::ocr::{TesseractRecognizer, TextRecognizer};
use stamp_ocr::services::storage::LocalImageStore;
use stamp_ocr::services::vision::{StampClassifier, VisionClient};
use stamp_ocr::services::worker::{OcrWorker, WorkerConfig};
use stamp_ocr::telemetry;

#[tokio::main]
async fn main() {
    telemetry::init_tracing();

    tracing::info!("Starting stamp extraction worker");

    let config = AppConfig::from_env().expect("Failed to load configuration");

    if let Some(addr) = &config.worker_metrics_addr {
        let addr: SocketAddr = addr.parse().expect("Invalid WORKER_METRICS_ADDR");
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .expect("Failed to install Prometheus exporter");
        telemetry::describe_metrics();
        tracing::info!(%addr, "Prometheus exporter listening");
    }

    tracing::info!("Connecting to PostgreSQL");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");
    let store = Arc::new(PgStore::new(db_pool));

    let recognizer: Option<Arc<dyn TextRecognizer>> = if config.ocr_enabled {
        Some(Arc::new(TesseractRecognizer::new(
            &config.tesseract_bin,
            &config.tesseract_lang,
            Duration::from_secs(config.tesseract_timeout_secs),
        )))
    } else {
        None
    };

    let classifier: Option<Arc<dyn StampClassifier>> = VisionClient::from_config(&config.vision())
        .expect("Failed to initialize vision client")
        .map(|client| Arc::new(client) as Arc<dyn StampClassifier>);
    if classifier.is_none() {
        tracing::warn!("No usable vision API key; running heuristic extraction only");
    }

    let worker = OcrWorker::new(
        store.clone(),
        store,
        Arc::new(LocalImageStore::new(&config.upload_root)),
        StampExtractor::new(recognizer, classifier),
        WorkerConfig {
            poll_interval: Duration::from_millis(config.ocr_poll_ms),
            stale_after: config.stale_after(),
            ..WorkerConfig::default()
        },
    );

    let handle = worker.start();

    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("Shutdown signal received, waiting for in-flight job");
    handle.shutdown().await;
}
