//! Prompt Catalog
//!
//! Turns a reply method into the system prompt sent to the backend. Media
//! methods get the live candidate list spliced in, minus recent picks.

use crate::error::{ReplyError, ReplyResult};
use crate::history::AntiRepeatWindow;
use crate::media::MediaLibrary;
use crate::method::ReplyMethod;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Placeholder replaced by the candidate list in media templates
pub const CANDIDATES_PLACEHOLDER: &str = "{pics}";

/// Starter templates for the stock methods, written by `init-config`
pub const DEFAULT_TEMPLATES: [(&str, &str); 4] = [
    (
        "normal",
        "Someone sent the message below in a chat. Write a short, natural reply \
         in the same language. Output only the reply.",
    ),
    (
        "refute",
        "Someone sent the message below in a chat. Politely but firmly refute it \
         in two or three sentences, in the same language. Output only the reply.",
    ),
    (
        "toxic",
        "Someone sent the message below in a chat. Answer with one dry, sarcastic \
         line in the same language. No slurs, no threats. Output only the reply.",
    ),
    (
        "mygo",
        "Pick the reaction image that best answers the message below.\n\
         Choose exactly one file name from this list: {pics}\n\
         Answer with JSON only: {{\"meme_file\": \"<file name>\"}}",
    ),
];

pub struct PromptCatalog {
    prompts_dir: PathBuf,
    library: MediaLibrary,
}

impl PromptCatalog {
    pub fn new(prompts_dir: impl Into<PathBuf>, library: MediaLibrary) -> Self {
        Self {
            prompts_dir: prompts_dir.into(),
            library,
        }
    }

    /// Raw template text for a method
    pub fn template(&self, method: &ReplyMethod) -> ReplyResult<String> {
        if method.template_id.is_empty()
            || method.template_id.contains(['/', '\\'])
            || method.template_id.contains("..")
        {
            return Err(ReplyError::InvalidMethod(method.id.clone()));
        }

        let path = self.prompts_dir.join(format!("{}.txt", method.template_id));
        debug!("Loading prompt template: {}", path.display());
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(content.trim().to_string()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ReplyError::TemplateNotFound(path.display().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Build the system prompt for one generation
    pub fn resolve(&self, method: &ReplyMethod, window: &AntiRepeatWindow) -> ReplyResult<String> {
        let template = self.template(method)?;
        if !method.media_reply || method.remote_lookup {
            return Ok(template);
        }

        let excluded = window.excluded();
        let all: Vec<String> = self.library.list(method)?.into_iter().map(|e| e.name).collect();
        let mut candidates: Vec<String> = all
            .iter()
            .filter(|name| !excluded.contains(*name))
            .cloned()
            .collect();
        if candidates.is_empty() && !all.is_empty() {
            warn!(
                "Every '{}' candidate was used recently, offering the full list again",
                method.id
            );
            candidates = all;
        }
        debug!(
            "{} media candidates for '{}' ({} excluded)",
            candidates.len(),
            method.id,
            excluded.len()
        );

        Ok(interpolate(&template, &candidates.join(", ")))
    }
}

/// Write the stock templates into `prompts_dir`, leaving existing files alone.
/// Returns the files that were created.
pub fn seed_default_templates(prompts_dir: &Path) -> ReplyResult<Vec<PathBuf>> {
    std::fs::create_dir_all(prompts_dir)?;
    let mut written = Vec::new();
    for (id, text) in DEFAULT_TEMPLATES {
        let path = prompts_dir.join(format!("{id}.txt"));
        if path.exists() {
            debug!("Keeping existing template {}", path.display());
            continue;
        }
        std::fs::write(&path, format!("{text}\n"))?;
        info!("📝 Wrote prompt template {}", path.display());
        written.push(path);
    }
    Ok(written)
}

/// Substitute `{pics}` and unescape `{{` / `}}`, so templates can carry
/// literal JSON examples.
fn interpolate(template: &str, candidates: &str) -> String {
    let mut out = String::with_capacity(template.len() + candidates.len());
    let mut rest = template;
    while let Some(idx) = rest.find(['{', '}']) {
        out.push_str(&rest[..idx]);
        let tail = &rest[idx..];
        if tail.starts_with(CANDIDATES_PLACEHOLDER) {
            out.push_str(candidates);
            rest = &tail[CANDIDATES_PLACEHOLDER.len()..];
        } else if tail.starts_with("{{") || tail.starts_with("}}") {
            out.push_str(&tail[..1]);
            rest = &tail[2..];
        } else {
            out.push_str(&tail[..1]);
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}
