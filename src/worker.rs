//! Session worker
//!
//! The blocking middle of a reply session: read the clipboard, ask the
//! backend, resolve the answer and stage it for pasting. Runs on its own
//! task, reporting progress back to the controller.

use crate::backend::{preview, GenerationBackend, GenerationRequest};
use crate::clipboard::{self, Clipboard, ClipboardContent, TextExtractor};
use crate::error::{ReplyError, ReplyResult};
use crate::history::AntiRepeatWindow;
use crate::method::ReplyMethod;
use crate::prompts::PromptCatalog;
use crate::remote::RemoteMediaSource;
use crate::resolver::{ArtifactResolver, GeneratedResponse, ResolvedArtifact};
use crate::session::SessionState;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// System prompt for the first call of a two-step method
pub const DRAFT_SYSTEM_PROMPT: &str = "You comment on chat messages in as few words as \
    possible. React to the message with a short gut reaction, at most a few words.";

/// Token budget for the draft call
pub const DRAFT_MAX_OUTPUT_TOKENS: u32 = 10;

/// Knobs that shape one generation
#[derive(Debug, Clone, Copy)]
pub struct GenerationSettings {
    pub temperature: f32,
    /// Re-run prompt → backend → resolver once when the pick is missing
    pub regenerate_on_missing_artifact: bool,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            regenerate_on_missing_artifact: false,
        }
    }
}

/// Prompt → backend → resolver, without any clipboard or input side effects
pub struct ReplyPipeline {
    prompts: PromptCatalog,
    backend: Arc<dyn GenerationBackend>,
    resolver: ArtifactResolver,
    window: Arc<AntiRepeatWindow>,
    settings: GenerationSettings,
    remote: Option<Arc<RemoteMediaSource>>,
}

impl ReplyPipeline {
    pub fn new(
        prompts: PromptCatalog,
        backend: Arc<dyn GenerationBackend>,
        resolver: ArtifactResolver,
        window: Arc<AntiRepeatWindow>,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            prompts,
            backend,
            resolver,
            window,
            settings,
            remote: None,
        }
    }

    /// Enable `remote_lookup` methods
    pub fn with_remote(mut self, remote: Arc<RemoteMediaSource>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Prompt + backend for one attempt
    pub async fn generate(
        &self,
        method: &ReplyMethod,
        user_prompt: &str,
    ) -> ReplyResult<GeneratedResponse> {
        let system_prompt = self.prompts.resolve(method, &self.window)?;
        debug!("System prompt: {}", preview(&system_prompt));

        let (user_prompt, temperature) = if method.two_step {
            (self.draft(user_prompt).await?, 0.0)
        } else {
            (user_prompt.to_string(), self.settings.temperature)
        };

        let request = GenerationRequest {
            system_prompt,
            user_prompt,
            max_output_tokens: method.max_output_tokens,
            temperature,
            structured: method.structured,
        };
        let text = self.backend.generate(&request).await?;
        info!("💬 {} replied: {}", self.backend.name(), preview(&text));
        Ok(GeneratedResponse {
            text,
            method: method.clone(),
        })
    }

    /// First half of a two-step method: a terse reaction to the message,
    /// returned together with the message as the second call's user prompt
    async fn draft(&self, message: &str) -> ReplyResult<String> {
        let request = GenerationRequest {
            system_prompt: DRAFT_SYSTEM_PROMPT.to_string(),
            user_prompt: message.to_string(),
            max_output_tokens: DRAFT_MAX_OUTPUT_TOKENS,
            temperature: self.settings.temperature,
            structured: false,
        };
        let draft = self.backend.generate(&request).await?;
        info!("✏️ Draft: {}", preview(&draft));
        Ok(format!("They said: {message}\nYou said: {}", draft.trim()))
    }

    async fn fetch_remote(&self, response: &GeneratedResponse) -> ReplyResult<ResolvedArtifact> {
        let remote = self.remote.as_ref().ok_or_else(|| {
            ReplyError::Config(format!(
                "'{}' needs remote media lookup; set remote_media_url",
                response.method.id
            ))
        })?;
        let path = remote.fetch(&response.text).await?;
        Ok(ResolvedArtifact::Image(path))
    }

    /// Record a delivered media pick in the anti-repeat window
    pub fn commit(&self, method: &ReplyMethod, artifact: &ResolvedArtifact) {
        if method.media_reply && !method.remote_lookup {
            self.resolver.commit(artifact);
        }
    }

    /// Generate and resolve, with the optional single regeneration
    pub async fn produce(
        &self,
        method: &ReplyMethod,
        user_prompt: &str,
        progress: &(dyn Fn(SessionState) + Send + Sync),
    ) -> ReplyResult<ResolvedArtifact> {
        let mut retries_left = u8::from(self.settings.regenerate_on_missing_artifact);
        loop {
            progress(SessionState::Generating);
            let response = self.generate(method, user_prompt).await?;

            progress(SessionState::Resolving);
            let resolved = if method.remote_lookup {
                self.fetch_remote(&response).await
            } else {
                self.resolver.resolve(&response)
            };
            match resolved {
                Err(ReplyError::ArtifactNotFound(pick)) if retries_left > 0 => {
                    retries_left -= 1;
                    warn!("No media matches '{}', regenerating once", pick);
                }
                other => return other,
            }
        }
    }
}

pub struct SessionWorker {
    clipboard: Arc<dyn Clipboard>,
    extractor: Arc<dyn TextExtractor>,
    pipeline: ReplyPipeline,
}

impl SessionWorker {
    pub fn new(
        clipboard: Arc<dyn Clipboard>,
        extractor: Arc<dyn TextExtractor>,
        pipeline: ReplyPipeline,
    ) -> Self {
        Self {
            clipboard,
            extractor,
            pipeline,
        }
    }

    /// Full cycle up to (and including) staging the deliverable
    pub async fn run(
        &self,
        method: &ReplyMethod,
        progress: &(dyn Fn(SessionState) + Send + Sync),
    ) -> ReplyResult<ResolvedArtifact> {
        let user_prompt = self.read_input().await?;
        let artifact = self.pipeline.produce(method, &user_prompt, progress).await?;
        self.stage(&artifact).await?;
        self.pipeline.commit(method, &artifact);
        Ok(artifact)
    }

    /// Snapshot the clipboard and turn it into the user prompt
    pub async fn read_input(&self) -> ReplyResult<String> {
        let clip = self.clipboard.clone();
        let content = tokio::task::spawn_blocking(move || clipboard::capture(clip.as_ref()))
            .await
            .map_err(|e| ReplyError::Clipboard(e.to_string()))??;

        let text = match content {
            ClipboardContent::Text(text) => text,
            ClipboardContent::Image(image) => {
                let extractor = self.extractor.clone();
                tokio::task::spawn_blocking(move || extractor.extract(&image))
                    .await
                    .map_err(|e| ReplyError::UnsupportedInput(e.to_string()))??
            }
            ClipboardContent::Empty => {
                warn!("Clipboard is empty");
                return Err(ReplyError::EmptyInput);
            }
        };

        if text.trim().is_empty() {
            return Err(ReplyError::EmptyInput);
        }
        info!("📋 Clipboard content: {}", preview(&text));
        Ok(text)
    }

    /// Write the deliverable to the clipboard
    pub async fn stage(&self, artifact: &ResolvedArtifact) -> ReplyResult<()> {
        let clip = self.clipboard.clone();
        let artifact = artifact.clone();
        tokio::task::spawn_blocking(move || clipboard::stage(clip.as_ref(), &artifact))
            .await
            .map_err(|e| ReplyError::Clipboard(e.to_string()))?
    }
}
