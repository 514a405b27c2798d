//! OpenAI-compatible chat completion backend

use super::{extract_selection, http_client, preview, GenerationBackend, GenerationRequest};
use crate::error::{ReplyError, ReplyResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Remote chat service speaking the `/chat/completions` dialect
pub struct ChatBackend {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl ChatBackend {
    pub fn new(base_url: &str, api_key: &str, model: &str, timeout: Duration) -> ReplyResult<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl GenerationBackend for ChatBackend {
    async fn generate(&self, request: &GenerationRequest) -> ReplyResult<String> {
        info!(
            "Requesting reply from {} (max tokens: {}, temperature: {})",
            self.model, request.max_output_tokens, request.temperature
        );
        debug!("User prompt: {}", preview(&request.user_prompt));

        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system",
                    content: &request.system_prompt,
                },
                Message {
                    role: "user",
                    content: &request.user_prompt,
                },
            ],
            max_tokens: request.max_output_tokens,
            temperature: request.temperature,
            response_format: request.structured.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let body_text = response.text().await?;
        if !status.is_success() {
            warn!("❌ Chat API error ({}): {}", status, preview(&body_text));
            return Err(ReplyError::Generation(format!(
                "API request failed with status {status}: {body_text}"
            )));
        }

        let parsed: ChatResponse = serde_json::from_str(&body_text)
            .map_err(|e| ReplyError::Generation(format!("unexpected response body: {e}")))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ReplyError::Generation("response had no content".to_string()))?;
        debug!("Generated: {}", preview(&content));

        if request.structured {
            extract_selection(&content)
        } else {
            Ok(content.trim().to_string())
        }
    }

    fn name(&self) -> &str {
        "chat"
    }
}
