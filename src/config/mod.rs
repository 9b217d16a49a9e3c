use std::time::Duration;

use serde::Deserialize;

use crate::services::vision::VisionConfig;
use crate::services::worker::DEFAULT_POLL_INTERVAL_MS;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000"). Unused by the worker.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// PostgreSQL connection string
    pub database_url: String,

    /// Directory that web-style image paths resolve against
    #[serde(default = "default_upload_root")]
    pub upload_root: String,

    /// Vision model API key. Empty or placeholder values disable classification.
    #[serde(default)]
    pub openai_api_key: Option<String>,

    #[serde(default = "default_openai_model")]
    pub openai_model: String,

    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,

    #[serde(default = "default_vision_timeout_secs")]
    pub vision_timeout_secs: u64,

    /// Worker poll interval while the queue is empty
    #[serde(default = "default_ocr_poll_ms")]
    pub ocr_poll_ms: u64,

    /// Run the local tesseract pass before classification
    #[serde(default = "default_true")]
    pub ocr_enabled: bool,

    #[serde(default = "default_tesseract_bin")]
    pub tesseract_bin: String,

    #[serde(default = "default_tesseract_lang")]
    pub tesseract_lang: String,

    #[serde(default = "default_tesseract_timeout_secs")]
    pub tesseract_timeout_secs: u64,

    /// Processing jobs older than this are failed when a worker starts. 0 disables.
    #[serde(default = "default_stale_job_secs")]
    pub stale_job_secs: u64,

    /// Prometheus listener for the worker process (e.g., "0.0.0.0:9100")
    #[serde(default)]
    pub worker_metrics_addr: Option<String>,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_upload_root() -> String {
    "public".to_string()
}

fn default_openai_model() -> String {
    "gpt-4.1-mini".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_vision_timeout_secs() -> u64 {
    60
}

fn default_ocr_poll_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_true() -> bool {
    true
}

fn default_tesseract_bin() -> String {
    "tesseract".to_string()
}

fn default_tesseract_lang() -> String {
    "eng".to_string()
}

fn default_tesseract_timeout_secs() -> u64 {
    30
}

fn default_stale_job_secs() -> u64 {
    900
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn vision(&self) -> VisionConfig {
        VisionConfig {
            api_key: self.openai_api_key.clone(),
            model: self.openai_model.clone(),
            base_url: self.openai_base_url.clone(),
            timeout: Duration::from_secs(self.vision_timeout_secs),
        }
    }

    pub fn stale_after(&self) -> Option<Duration> {
        (self.stale_job_secs > 0).then(|| Duration::from_secs(self.stale_job_secs))
    }
}
