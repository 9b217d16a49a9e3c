use std::io::Write;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tokio::process::Command;

/// Recognizes raw text printed on a stamp image.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    async fn recognize(&self, image_bytes: &[u8]) -> Result<String, OcrError>;
}

/// Runs the `tesseract` CLI against a temp copy of the image.
pub struct TesseractRecognizer {
    binary: String,
    language: String,
    timeout: Duration,
}

impl TesseractRecognizer {
    pub fn new(binary: &str, language: &str, timeout: Duration) -> Self {
        Self {
            binary: binary.to_string(),
            language: language.to_string(),
            timeout,
        }
    }
}

#[async_trait]
impl TextRecognizer for TesseractRecognizer {
    async fn recognize(&self, image_bytes: &[u8]) -> Result<String, OcrError> {
        if image_bytes.is_empty() {
            return Err(OcrError::EmptyImage);
        }

        let mut image_file = NamedTempFile::new()?;
        image_file.write_all(image_bytes)?;
        image_file.flush()?;

        let mut cmd = Command::new(&self.binary);
        cmd.arg(image_file.path())
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| OcrError::Timeout(self.timeout.as_secs()))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::CommandFailed(format!(
                "exit {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        tracing::debug!(chars = text.len(), "Tesseract recognition complete");
        Ok(text)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error("Cannot recognize text in an empty image")]
    EmptyImage,

    #[error("I/O error running OCR: {0}")]
    Io(#[from] std::io::Error),

    #[error("OCR timed out after {0}s")]
    Timeout(u64),

    #[error("OCR command failed ({0})")]
    CommandFailed(String),
}
