//! Local model pipeline
//!
//! Talks to a locally served model over the Ollama `/api/chat` endpoint.
//! Some chat templates have no system role; when the model rejects one, the
//! system and user text are merged into a single user turn and the request is
//! sent once more.

use super::{extract_selection, http_client, preview, GenerationBackend, GenerationRequest};
use crate::error::{ReplyError, ReplyResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Serialize)]
struct PipelineRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    options: Options,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct Options {
    temperature: f32,
    num_predict: u32,
}

/// Ollama chat response
#[derive(Debug, Deserialize)]
struct PipelineResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct PipelineErrorBody {
    error: String,
}

/// Why a single pipeline call failed
enum CallError {
    /// The model's template has no system role
    SystemRoleRejected(String),
    Failed(ReplyError),
}

impl From<reqwest::Error> for CallError {
    fn from(err: reqwest::Error) -> Self {
        CallError::Failed(err.into())
    }
}

pub struct PipelineBackend {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    merge_template: String,
}

impl PipelineBackend {
    pub fn new(url: &str, model: &str, merge_template: &str, timeout: Duration) -> ReplyResult<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            endpoint: format!("{}/api/chat", url.trim_end_matches('/')),
            model: model.to_string(),
            merge_template: merge_template.to_string(),
        })
    }

    /// Single user turn carrying both prompts.
    ///
    /// Placeholders are filled in one pass over the template, so braces
    /// inside either prompt are never expanded.
    fn merge(&self, request: &GenerationRequest) -> String {
        let mut out = String::with_capacity(
            self.merge_template.len() + request.system_prompt.len() + request.user_prompt.len(),
        );
        let mut rest = self.merge_template.as_str();
        while let Some(idx) = rest.find('{') {
            out.push_str(&rest[..idx]);
            let tail = &rest[idx..];
            if let Some(after) = tail.strip_prefix("{system}") {
                out.push_str(&request.system_prompt);
                rest = after;
            } else if let Some(after) = tail.strip_prefix("{user}") {
                out.push_str(&request.user_prompt);
                rest = after;
            } else {
                out.push('{');
                rest = &tail[1..];
            }
        }
        out.push_str(rest);
        out
    }

    async fn call(&self, request: &GenerationRequest, messages: Vec<Message>) -> Result<String, CallError> {
        let body = PipelineRequest {
            model: &self.model,
            messages,
            stream: false,
            format: request.structured.then_some("json"),
            options: Options {
                temperature: request.temperature,
                num_predict: request.max_output_tokens,
            },
        };

        let response = self.client.post(&self.endpoint).json(&body).send().await?;
        let status = response.status();
        let body_text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<PipelineErrorBody>(&body_text)
                .map(|b| b.error)
                .unwrap_or(body_text);
            if rejects_system_role(&message) {
                return Err(CallError::SystemRoleRejected(message));
            }
            warn!("❌ Pipeline error ({}): {}", status, preview(&message));
            return Err(CallError::Failed(ReplyError::Generation(format!(
                "pipeline failed with status {status}: {message}"
            ))));
        }

        let parsed: PipelineResponse = serde_json::from_str(&body_text).map_err(|e| {
            CallError::Failed(ReplyError::Generation(format!("unexpected response body: {e}")))
        })?;
        Ok(parsed.message.content)
    }
}

fn rejects_system_role(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("system")
        && (lower.contains("role") || lower.contains("not supported") || lower.contains("unsupported"))
}

#[async_trait]
impl GenerationBackend for PipelineBackend {
    async fn generate(&self, request: &GenerationRequest) -> ReplyResult<String> {
        info!(
            "Running local model {} (max tokens: {}, temperature: {})",
            self.model, request.max_output_tokens, request.temperature
        );
        debug!("User prompt: {}", preview(&request.user_prompt));

        let messages = vec![
            Message {
                role: "system",
                content: request.system_prompt.clone(),
            },
            Message {
                role: "user",
                content: request.user_prompt.clone(),
            },
        ];

        let content = match self.call(request, messages).await {
            Ok(content) => content,
            Err(CallError::SystemRoleRejected(reason)) => {
                info!("Model has no system role ({}), retrying with merged prompt", reason);
                let merged = vec![Message {
                    role: "user",
                    content: self.merge(request),
                }];
                match self.call(request, merged).await {
                    Ok(content) => content,
                    Err(CallError::SystemRoleRejected(reason)) => {
                        return Err(ReplyError::Generation(reason))
                    }
                    Err(CallError::Failed(e)) => return Err(e),
                }
            }
            Err(CallError::Failed(e)) => return Err(e),
        };
        debug!("Generated: {}", preview(&content));

        if request.structured {
            extract_selection(&content)
        } else {
            Ok(content.trim().to_string())
        }
    }

    fn name(&self) -> &str {
        "pipeline"
    }
}
