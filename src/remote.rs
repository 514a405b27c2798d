//! Remote media source
//!
//! Media methods flagged `remote_lookup` treat the backend's answer as a
//! search key for an online meme index instead of a local file name. The
//! first hit is downloaded once into the cache directory and reused on
//! later lookups.

use crate::backend::http_client;
use crate::error::{ReplyError, ReplyResult};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Placeholder in the lookup URL that receives the encoded search key
pub const KEY_PLACEHOLDER: &str = "{key}";

/// One search result
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteHit {
    pub url: String,
    /// Caption of the image; doubles as the cached file name
    pub alt: String,
}

#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    urls: Vec<RemoteHit>,
}

pub struct RemoteMediaSource {
    client: reqwest::Client,
    lookup_url: String,
    cache_dir: PathBuf,
}

impl RemoteMediaSource {
    pub fn new(lookup_url: &str, cache_dir: impl Into<PathBuf>, timeout: Duration) -> ReplyResult<Self> {
        if !lookup_url.contains(KEY_PLACEHOLDER) {
            return Err(ReplyError::Config(format!(
                "remote_media_url must contain {KEY_PLACEHOLDER}: {lookup_url}"
            )));
        }
        Ok(Self {
            client: http_client(timeout)?,
            lookup_url: lookup_url.to_string(),
            cache_dir: cache_dir.into(),
        })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn lookup_url(&self, key: &str) -> String {
        self.lookup_url
            .replace(KEY_PLACEHOLDER, &urlencoding::encode(key))
    }

    /// First search hit for `key`
    pub async fn lookup(&self, key: &str) -> ReplyResult<RemoteHit> {
        let key = key.trim();
        if key.is_empty() {
            return Err(ReplyError::ArtifactNotFound(String::new()));
        }

        let url = self.lookup_url(key);
        debug!("Remote media lookup: {}", url);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!("❌ Media lookup failed ({}) for '{}'", status, key);
            return Err(ReplyError::Generation(format!(
                "media lookup failed with status {status}"
            )));
        }

        let body: LookupResponse = response.json().await?;
        body.urls
            .into_iter()
            .next()
            .ok_or_else(|| ReplyError::ArtifactNotFound(key.to_string()))
    }

    /// Where a hit is cached
    pub fn cache_path(&self, hit: &RemoteHit) -> ReplyResult<PathBuf> {
        let name = file_stem_for(&hit.alt);
        if name.is_empty() {
            return Err(ReplyError::ArtifactNotFound(hit.alt.clone()));
        }
        Ok(self.cache_dir.join(format!("{name}.jpg")))
    }

    /// Look `key` up and return the local copy, downloading it if needed
    pub async fn fetch(&self, key: &str) -> ReplyResult<PathBuf> {
        let hit = self.lookup(key).await?;
        let path = self.cache_path(&hit)?;
        if path.is_file() {
            info!("🗂️ Using cached {}", path.display());
            return Ok(path);
        }
        self.download(&hit.url, &path).await?;
        Ok(path)
    }

    async fn download(&self, url: &str, path: &Path) -> ReplyResult<()> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ReplyError::Generation(format!(
                "media download failed with status {status}"
            )));
        }
        let bytes = response.bytes().await?;

        tokio::fs::create_dir_all(&self.cache_dir).await?;
        // A partial file must never look like a cache hit
        let partial = path.with_extension("part");
        tokio::fs::write(&partial, &bytes).await?;
        tokio::fs::rename(&partial, path).await?;
        info!("⬇️ Downloaded {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }
}

/// Caption → safe file stem
fn file_stem_for(alt: &str) -> String {
    alt.trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect::<String>()
        .trim_matches('.')
        .trim()
        .to_string()
}
