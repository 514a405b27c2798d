//! Reply Methods
//!
//! The closed set of reply styles the user can pick from. Built once from
//! configuration and never mutated afterwards.

use crate::error::{ReplyError, ReplyResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default token budget for a reply
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 500;

fn default_max_output_tokens() -> u32 {
    DEFAULT_MAX_OUTPUT_TOKENS
}

/// One selectable reply style
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyMethod {
    /// Stable identifier (used by hotkey bindings and the CLI)
    pub id: String,
    /// Label shown by the UI collaborator
    pub display_label: String,
    /// Prompt template name, resolved to `<prompts_dir>/<template_id>.txt`
    pub template_id: String,
    /// Reply with a media file instead of text
    #[serde(default)]
    pub media_reply: bool,
    /// Candidate directory for media replies, relative to the assets dir
    #[serde(default)]
    pub media_dir: Option<PathBuf>,
    /// Ask the backend for `{"meme_file": ...}` JSON instead of free text
    #[serde(default)]
    pub structured: bool,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    /// Look the answer up with the remote media search instead of a local dir
    #[serde(default)]
    pub remote_lookup: bool,
    /// Draft a terse reaction first, then ask again with the draft attached
    #[serde(default)]
    pub two_step: bool,
}

impl ReplyMethod {
    /// A plain text reply method
    pub fn text(id: &str, label: &str) -> Self {
        Self {
            id: id.to_string(),
            display_label: label.to_string(),
            template_id: id.to_string(),
            media_reply: false,
            media_dir: None,
            structured: false,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            remote_lookup: false,
            two_step: false,
        }
    }

    /// A media reply method picking from `media_dir`
    pub fn media(id: &str, label: &str, media_dir: impl Into<PathBuf>) -> Self {
        Self {
            id: id.to_string(),
            display_label: label.to_string(),
            template_id: id.to_string(),
            media_reply: true,
            media_dir: Some(media_dir.into()),
            structured: false,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            remote_lookup: false,
            two_step: false,
        }
    }

    /// A media reply method whose answer is a search key for the remote
    /// media source
    pub fn remote(id: &str, label: &str) -> Self {
        Self {
            id: id.to_string(),
            display_label: label.to_string(),
            template_id: id.to_string(),
            media_reply: true,
            media_dir: None,
            structured: false,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            remote_lookup: true,
            two_step: false,
        }
    }

    /// Builder: request structured JSON selection
    pub fn structured(mut self) -> Self {
        self.structured = true;
        self
    }

    /// Builder: draft first, answer second
    pub fn two_step(mut self) -> Self {
        self.two_step = true;
        self
    }

    /// Short human-readable kind, for listings
    pub fn kind(&self) -> &'static str {
        match (self.media_reply, self.remote_lookup, self.structured) {
            (false, _, _) => "text",
            (true, true, _) => "media/remote",
            (true, false, false) => "media",
            (true, false, true) => "media/json",
        }
    }
}

/// Ordered reply-method catalog
#[derive(Debug, Clone, Default)]
pub struct MethodCatalog {
    methods: Vec<ReplyMethod>,
}

impl MethodCatalog {
    pub fn new(methods: Vec<ReplyMethod>) -> ReplyResult<Self> {
        for (i, method) in methods.iter().enumerate() {
            if methods[..i].iter().any(|m| m.id == method.id) {
                return Err(ReplyError::Config(format!(
                    "duplicate reply method id '{}'",
                    method.id
                )));
            }
            if method.media_reply && !method.remote_lookup && method.media_dir.is_none() {
                return Err(ReplyError::Config(format!(
                    "media reply method '{}' has no media_dir",
                    method.id
                )));
            }
        }
        Ok(Self { methods })
    }

    /// Look up a method by id
    pub fn get(&self, id: &str) -> ReplyResult<&ReplyMethod> {
        self.methods
            .iter()
            .find(|m| m.id == id)
            .ok_or_else(|| ReplyError::InvalidMethod(id.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReplyMethod> {
        self.methods.iter()
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

/// The four stock methods: three text tones and one meme picker
pub fn default_methods() -> Vec<ReplyMethod> {
    vec![
        ReplyMethod::text("normal", "Normal"),
        ReplyMethod::text("refute", "Refute"),
        ReplyMethod::text("toxic", "Sarcastic"),
        ReplyMethod::media("mygo", "MyGO", "mygo").structured(),
    ]
}
