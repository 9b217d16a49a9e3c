use tracing_subscriber::EnvFilter;

/// Initialize structured JSON logging, `RUST_LOG` overriding the `info` default.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();
}

/// Register descriptions for the metrics both binaries emit.
pub fn describe_metrics() {
    metrics::describe_counter!("ocr_jobs_enqueued_total", "Extraction jobs created");
    metrics::describe_counter!(
        "ocr_jobs_completed_total",
        "Extraction jobs completed successfully"
    );
    metrics::describe_counter!("ocr_jobs_failed_total", "Extraction jobs marked failed");
    metrics::describe_histogram!(
        "ocr_job_processing_seconds",
        "Time to process one extraction job"
    );
    metrics::describe_gauge!("ocr_queue_depth", "Pending extraction jobs");
}
