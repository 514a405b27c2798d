//! Generation Backends
//!
//! A single `generate` capability with two implementations: a remote
//! OpenAI-compatible chat service and a local model pipeline. The
//! implementation is picked once at start-up from configuration.

use crate::config::{BackendKind, Config};
use crate::error::{ReplyError, ReplyResult};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub mod chat;
pub mod pipeline;

pub use chat::ChatBackend;
pub use pipeline::PipelineBackend;

/// Everything a backend needs for one reply
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub max_output_tokens: u32,
    pub temperature: f32,
    /// Expect `{"meme_file": ...}` and return only that field
    pub structured: bool,
}

/// Trait for generation backends
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Produce the raw reply text (or the selected file name when structured)
    async fn generate(&self, request: &GenerationRequest) -> ReplyResult<String>;

    /// Get the backend name
    fn name(&self) -> &str;
}

/// Factory to create the configured backend
pub fn create_backend(config: &Config) -> ReplyResult<Arc<dyn GenerationBackend>> {
    let timeout = Duration::from_secs(config.request_timeout_secs);
    let backend: Arc<dyn GenerationBackend> = match config.backend {
        BackendKind::Chat => {
            let api_key = config.resolved_api_key().ok_or_else(|| {
                ReplyError::Config(
                    "chat backend needs chat_api_key in config or OPENAI_API_KEY".to_string(),
                )
            })?;
            info!("  - Using chat backend ({} @ {})", config.chat_model, config.chat_base_url);
            Arc::new(ChatBackend::new(
                &config.chat_base_url,
                &api_key,
                &config.chat_model,
                timeout,
            )?)
        }
        BackendKind::Pipeline => {
            info!("  - Using local pipeline ({} @ {})", config.pipeline_model, config.pipeline_url);
            Arc::new(PipelineBackend::new(
                &config.pipeline_url,
                &config.pipeline_model,
                &config.pipeline_merge_template,
                timeout,
            )?)
        }
    };
    info!("✅ Generation backend '{}' initialized", backend.name());
    Ok(backend)
}

pub(crate) fn http_client(timeout: Duration) -> ReplyResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ReplyError::Config(format!("cannot build HTTP client: {e}")))
}

#[derive(Deserialize)]
struct Selection {
    meme_file: String,
}

/// Pull `meme_file` out of a structured reply.
///
/// Accepts an object or an array whose first element is the object; models
/// sometimes wrap the JSON in prose or code fences, so only the outermost
/// bracketed span is parsed.
pub fn extract_selection(raw: &str) -> ReplyResult<String> {
    let trimmed = raw.trim();
    let start = trimmed.find(['{', '[']);
    let end = trimmed.rfind(['}', ']']);
    let json = match (start, end) {
        (Some(s), Some(e)) if s < e => &trimmed[s..=e],
        _ => {
            return Err(ReplyError::Generation(format!(
                "expected JSON selection, got: {}",
                preview(trimmed)
            )))
        }
    };

    let value: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| ReplyError::Generation(format!("malformed JSON selection: {e}")))?;
    let first = match value {
        serde_json::Value::Array(items) => items.into_iter().next().unwrap_or_default(),
        other => other,
    };
    let selection: Selection = serde_json::from_value(first)
        .map_err(|e| ReplyError::Generation(format!("selection has no meme_file: {e}")))?;
    Ok(selection.meme_file.trim().to_string())
}

/// First 100 chars, for logs and error messages
pub fn preview(text: &str) -> String {
    let mut out: String = text.chars().take(100).collect();
    if text.chars().count() > 100 {
        out.push_str("...");
    }
    out
}
