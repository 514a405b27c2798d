//! Artifact Resolver
//!
//! Turns a backend answer into something deliverable: the reply text itself,
//! or the media file the backend picked.

use crate::error::{ReplyError, ReplyResult};
use crate::history::AntiRepeatWindow;
use crate::media::{MediaEntry, MediaLibrary};
use crate::method::ReplyMethod;
use lazy_static::lazy_static;
use regex::Regex;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

lazy_static! {
    static ref TRAILING_EXTENSION: Regex = Regex::new(r"\.[A-Za-z0-9]{1,5}$").unwrap();
}

/// Raw backend output plus the method that asked for it
#[derive(Debug, Clone)]
pub struct GeneratedResponse {
    pub text: String,
    pub method: ReplyMethod,
}

/// The final deliverable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedArtifact {
    Text(String),
    Image(PathBuf),
}

pub struct ArtifactResolver {
    library: MediaLibrary,
    window: Arc<AntiRepeatWindow>,
}

impl ArtifactResolver {
    pub fn new(library: MediaLibrary, window: Arc<AntiRepeatWindow>) -> Self {
        Self { library, window }
    }

    pub fn resolve(&self, response: &GeneratedResponse) -> ReplyResult<ResolvedArtifact> {
        if !response.method.media_reply {
            return Ok(ResolvedArtifact::Text(response.text.trim().to_string()));
        }

        let requested = clean_pick(&response.text);
        let entries = self.library.list(&response.method)?;
        let entry = find_match(&entries, &requested)
            .ok_or_else(|| ReplyError::ArtifactNotFound(response.text.trim().to_string()))?;

        // Existence is checked now, not trusted from the listing.
        if !entry.path.is_file() {
            return Err(ReplyError::ArtifactNotFound(entry.name.clone()));
        }

        info!("🖼️ Resolved '{}' to {}", requested, entry.path.display());
        Ok(ResolvedArtifact::Image(entry.path.clone()))
    }

    /// Remember a delivered pick so the next few prompts leave it out.
    /// Only called once the artifact is actually on the clipboard.
    pub fn commit(&self, artifact: &ResolvedArtifact) {
        if let ResolvedArtifact::Image(path) = artifact {
            if let Some(name) = path.file_name() {
                self.window.record(&name.to_string_lossy());
            }
        }
    }
}

/// Strip quotes, any directory prefix, and surrounding whitespace
fn clean_pick(raw: &str) -> String {
    let trimmed = raw
        .trim()
        .trim_matches(|c| matches!(c, '"' | '\'' | '`'))
        .trim();
    trimmed
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(trimmed)
        .to_string()
}

/// Exact file name, exact stem, case-insensitive stem, then case-insensitive
/// prefix. Ties go to the first entry in listing order.
fn find_match<'a>(entries: &'a [MediaEntry], requested: &str) -> Option<&'a MediaEntry> {
    if requested.is_empty() {
        return None;
    }
    let stem = TRAILING_EXTENSION.replace(requested, "").to_string();
    if stem.is_empty() {
        return None;
    }
    let stem_lower = stem.to_lowercase();

    let tiers: [&dyn Fn(&MediaEntry) -> bool; 4] = [
        &|e: &MediaEntry| e.name == requested,
        &|e: &MediaEntry| e.stem() == stem,
        &|e: &MediaEntry| e.stem().to_lowercase() == stem_lower,
        &|e: &MediaEntry| e.stem().to_lowercase().starts_with(&stem_lower),
    ];

    for (tier, matches) in tiers.iter().enumerate() {
        if let Some(entry) = entries.iter().find(|&e| matches(e)) {
            debug!("Matched '{}' at tier {}", entry.name, tier);
            return Some(entry);
        }
    }
    None
}
