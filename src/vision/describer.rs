//! Core `Describer` trait and the Ollama implementation.
//!
//! `OllamaDescriber` calls Ollama's native `/api/chat` endpoint with the
//! frame attached as a base64 image.  All connection details come from
//! [`VisionConfig`]; nothing is hardcoded.

use std::path::PathBuf;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use thiserror::Error;

use crate::capture::CapturedFrame;
use crate::config::{timestamped, VisionConfig};

// ---------------------------------------------------------------------------
// DescribeError
// ---------------------------------------------------------------------------

/// Errors that can occur while describing a frame.
#[derive(Debug, Error)]
pub enum DescribeError {
    /// The captured image could not be read.
    #[error("cannot read frame {path}: {source}")]
    Frame {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// HTTP transport or connection error (is `ollama serve` running?).
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("description request timed out")]
    Timeout,

    /// The server answered with a non-success status (e.g. unknown model).
    #[error("server returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body was not the expected JSON shape.
    #[error("failed to parse response: {0}")]
    Parse(String),

    /// The model answered with no usable text.
    #[error("model returned an empty description")]
    EmptyResponse,
}

impl From<reqwest::Error> for DescribeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            DescribeError::Timeout
        } else {
            DescribeError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Describer trait
// ---------------------------------------------------------------------------

/// Async trait for frame → text description.
///
/// Implementors must be `Send + Sync` so they can be shared as
/// `Arc<dyn Describer>`.  There is no latency bound; callers treat every
/// error as "no description".
#[async_trait]
pub trait Describer: Send + Sync {
    async fn describe(&self, frame: &CapturedFrame, prompt: &str) -> Result<String, DescribeError>;
}

// ---------------------------------------------------------------------------
// parse_chat_response
// ---------------------------------------------------------------------------

/// Extract the answer from a non-streaming `/api/chat` response body.
///
/// ```
/// use sightspeak::vision::parse_chat_response;
///
/// let body = serde_json::json!({
///     "model": "customGemma3",
///     "message": { "role": "assistant", "content": " Ada kursi di depan. " },
///     "done": true
/// });
/// assert_eq!(parse_chat_response(&body).unwrap(), "Ada kursi di depan.");
/// ```
pub fn parse_chat_response(json: &serde_json::Value) -> Result<String, DescribeError> {
    let content = json["message"]["content"].as_str().ok_or_else(|| {
        DescribeError::Parse(format!("no message.content in response: {json}"))
    })?;

    let content = content.trim();
    if content.is_empty() {
        return Err(DescribeError::EmptyResponse);
    }
    Ok(content.to_string())
}

// ---------------------------------------------------------------------------
// OllamaDescriber
// ---------------------------------------------------------------------------

/// Calls Ollama's `/api/chat` with one user message carrying the prompt and
/// the frame.  Each description is also written to
/// `<outputs>/output_<timestamp>.txt` for later review.
pub struct OllamaDescriber {
    client: reqwest::Client,
    config: VisionConfig,
    output_dir: PathBuf,
}

impl OllamaDescriber {
    /// Build an `OllamaDescriber` from application config.
    ///
    /// The HTTP client is pre-configured with the per-request timeout from
    /// `config.timeout_secs`.
    pub fn from_config(config: &VisionConfig, output_dir: impl Into<PathBuf>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
            output_dir: output_dir.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/chat", self.config.base_url.trim_end_matches('/'))
    }

    /// Best effort: a failed write is logged, the description still counts.
    async fn save_description(&self, text: &str) {
        if let Err(e) = tokio::fs::create_dir_all(&self.output_dir).await {
            log::warn!("vision: cannot create {}: {e}", self.output_dir.display());
            return;
        }
        let path = timestamped(&self.output_dir, "output", "txt");
        match tokio::fs::write(&path, text).await {
            Ok(()) => log::info!("vision: description saved to {}", path.display()),
            Err(e) => log::warn!("vision: cannot write {}: {e}", path.display()),
        }
    }
}

#[async_trait]
impl Describer for OllamaDescriber {
    async fn describe(&self, frame: &CapturedFrame, prompt: &str) -> Result<String, DescribeError> {
        let bytes = tokio::fs::read(&frame.path)
            .await
            .map_err(|source| DescribeError::Frame {
                path: frame.path.clone(),
                source,
            })?;

        let body = serde_json::json!({
            "model": self.config.model,
            "messages": [
                {
                    "role": "user",
                    "content": prompt,
                    "images": [BASE64.encode(&bytes)]
                }
            ],
            "stream": false
        });

        log::info!(
            "vision: sending {} to {}",
            frame.path.display(),
            self.config.model
        );
        let response = self.client.post(self.endpoint()).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DescribeError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| DescribeError::Parse(e.to_string()))?;

        let text = parse_chat_response(&json)?;
        self.save_description(&text).await;
        Ok(text)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
