use std::collections::HashSet;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use strum::VariantArray;

use crate::models::extraction::{
    normalize_face_value, normalize_scott_number, ExtractionCandidate, FieldGuess, StampColor,
    Theme, MAX_COLORS,
};

const MAX_OUTPUT_TOKENS: u32 = 220;
const MAX_NAME_CHARS: usize = 120;
const MAX_ERROR_BODY_CHARS: usize = 300;

/// Classifies a stamp image into candidate catalog fields.
#[async_trait]
pub trait StampClassifier: Send + Sync {
    /// Returns `Ok(None)` when the service answered but gave no usable object.
    async fn classify(
        &self,
        image_bytes: &[u8],
        ocr_text: &str,
    ) -> Result<Option<ExtractionCandidate>, VisionError>;
}

/// Settings for the vision model integration.
#[derive(Debug, Clone)]
pub struct VisionConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

/// An empty key or a template placeholder disables the integration.
///
/// The markers are the placeholder wording used in env templates
/// (`your_real_key_here`, `replace-this-...`). Matching is by substring, so a
/// real key containing "replace" is also treated as a placeholder.
pub fn has_usable_api_key(key: Option<&str>) -> bool {
    let Some(key) = key.map(str::trim).filter(|k| !k.is_empty()) else {
        return false;
    };
    let lowered = key.to_lowercase();
    !(lowered.contains("your_real_key_here") || lowered.contains("replace"))
}

/// Client for an OpenAI-compatible Responses endpoint with image input.
pub struct VisionClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl VisionClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: &str,
        timeout: Duration,
    ) -> Result<Self, VisionError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.trim().to_string(),
            model: model.to_string(),
        })
    }

    /// Build a client only when the configured credential is usable.
    pub fn from_config(config: &VisionConfig) -> Result<Option<Self>, VisionError> {
        match config.api_key.as_deref() {
            Some(key) if has_usable_api_key(Some(key)) => Ok(Some(Self::new(
                &config.base_url,
                key,
                &config.model,
                config.timeout,
            )?)),
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl StampClassifier for VisionClient {
    async fn classify(
        &self,
        image_bytes: &[u8],
        ocr_text: &str,
    ) -> Result<Option<ExtractionCandidate>, VisionError> {
        let url = format!("{}/responses", self.base_url);
        let data_url = format!(
            "data:{};base64,{}",
            sniff_mime_type(image_bytes),
            base64::engine::general_purpose::STANDARD.encode(image_bytes)
        );

        let request_body = serde_json::json!({
            "model": self.model,
            "temperature": 0,
            "max_output_tokens": MAX_OUTPUT_TOKENS,
            "input": [{
                "role": "user",
                "content": [
                    { "type": "input_text", "text": build_prompt(ocr_text) },
                    { "type": "input_image", "image_url": data_url }
                ]
            }]
        });

        tracing::debug!(model = %self.model, image_bytes = image_bytes.len(), "Calling vision model");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(VisionError::Api {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        let candidate = parse_classification(&response_text(&body));
        if candidate.is_none() {
            tracing::warn!("Vision response held no JSON object, ignoring it");
        }
        Ok(candidate)
    }
}

fn sniff_mime_type(image_bytes: &[u8]) -> &'static str {
    image::guess_format(image_bytes)
        .map(|format| format.to_mime_type())
        .unwrap_or("image/jpeg")
}

fn join_tokens<T: AsRef<str>>(values: &[T]) -> String {
    values
        .iter()
        .map(|v| v.as_ref())
        .collect::<Vec<_>>()
        .join(", ")
}

fn build_prompt(ocr_text: &str) -> String {
    let ocr_text = if ocr_text.trim().is_empty() {
        "(empty)"
    } else {
        ocr_text
    };

    [
        "Classify this postage stamp image into one theme from this taxonomy only:".to_string(),
        join_tokens(Theme::VARIANTS),
        "Also label dominant colors from this fixed list only:".to_string(),
        join_tokens(StampColor::VARIANTS),
        "Return 1 to 5 colors, ordered by prominence.".to_string(),
        "If no confident fit, use null for theme.".to_string(),
        "Use OCR text as supporting context:".to_string(),
        ocr_text.to_string(),
        concat!(
            "Return JSON only with keys: {\"name\": string|null, \"theme\": string|null, ",
            "\"theme_confidence\": number, \"colors\": string[], \"colors_confidence\": number, ",
            "\"scott_number\": string|null, \"scott_number_confidence\": number, ",
            "\"face_value\": string|null, \"face_value_confidence\": number}."
        )
        .to_string(),
        "name should be a concise stamp title (not a filename).".to_string(),
        "All confidence fields must be 0 to 1.".to_string(),
    ]
    .join("\n")
}

#[derive(Debug, Default, Deserialize)]
struct ResponsesEnvelope {
    #[serde(default)]
    output_text: Option<Value>,
    #[serde(default)]
    output: Option<Vec<OutputItem>>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(default)]
    content: Option<Vec<ContentBlock>>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<Value>,
}

/// Pull the model's text out of a Responses API body.
fn response_text(body: &str) -> String {
    let envelope: ResponsesEnvelope = serde_json::from_str(body).unwrap_or_default();

    if let Some(Value::String(text)) = envelope.output_text {
        return text;
    }

    envelope
        .output
        .unwrap_or_default()
        .into_iter()
        .flat_map(|item| item.content.unwrap_or_default())
        .filter_map(|block| match block.text {
            Some(Value::String(text)) => Some(text),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Every field is optional and loosely typed; validation happens per field.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawClassification {
    name: Value,
    theme: Value,
    theme_confidence: Value,
    colors: Value,
    colors_confidence: Value,
    scott_number: Value,
    scott_number_confidence: Value,
    face_value: Value,
    face_value_confidence: Value,
}

/// Decode the outermost `{...}` span of `text` into a validated candidate.
///
/// Values outside the taxonomy, palette or catalog pattern become absent.
pub fn parse_classification(text: &str) -> Option<ExtractionCandidate> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }

    let raw: RawClassification = serde_json::from_str(&text[start..=end]).ok()?;

    let scott_number = raw.scott_number.as_str().and_then(normalize_scott_number);
    let face_value = raw.face_value.as_str().and_then(normalize_face_value);
    let theme = raw.theme.as_str().and_then(|t| Theme::from_str(t.trim()).ok());
    let colors = parse_colors(&raw.colors);

    Some(ExtractionCandidate {
        scott_number: guess(scott_number, &raw.scott_number_confidence),
        face_value: guess(face_value, &raw.face_value_confidence),
        theme: guess(theme, &raw.theme_confidence),
        colors_confidence: parse_confidence(&raw.colors_confidence),
        colors,
        name: raw
            .name
            .as_str()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(|n| n.chars().take(MAX_NAME_CHARS).collect()),
    })
}

fn guess<T>(value: Option<T>, confidence: &Value) -> FieldGuess<T> {
    match value {
        Some(v) => FieldGuess::found(v, parse_confidence(confidence)),
        None => FieldGuess::missing(),
    }
}

/// Clamp to `[0, 1]`; anything that is not a number counts as zero.
fn parse_confidence(value: &Value) -> f64 {
    value
        .as_f64()
        .filter(|c| c.is_finite())
        .map(|c| c.clamp(0.0, 1.0))
        .unwrap_or(0.0)
}

fn parse_colors(value: &Value) -> Vec<StampColor> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    items
        .iter()
        .filter_map(Value::as_str)
        .filter_map(|item| StampColor::from_str(&item.trim().to_uppercase()).ok())
        .filter(|color| seen.insert(*color))
        .take(MAX_COLORS)
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Vision API error {status}: {body}")]
    Api { status: u16, body: String },
}
