use crate::method::{default_methods, ReplyMethod};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Which generation backend to build at start-up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// OpenAI-compatible chat completion service
    Chat,
    /// Local model behind an Ollama-compatible server
    Pipeline,
}

/// A global key chord bound to one reply method
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotkeyBinding {
    /// e.g. "ctrl+shift+x"
    pub combo: String,
    pub method: String,
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // Backend
    pub backend: BackendKind,
    pub chat_base_url: String,
    pub chat_api_key: String,
    pub chat_model: String,
    pub pipeline_url: String,
    pub pipeline_model: String,
    /// Used when the local model has no system role; `{system}` and `{user}`
    /// are replaced.
    pub pipeline_merge_template: String,
    pub temperature: f32,
    pub request_timeout_secs: u64,

    // Assets
    pub assets_dir: PathBuf,
    /// Search endpoint for `remote_lookup` methods, with `{key}` where the
    /// encoded search key goes. Empty disables remote lookup.
    pub remote_media_url: String,

    // Input
    pub hotkeys: Vec<HotkeyBinding>,
    pub copy_settle_ms: u64,
    pub paste_settle_ms: u64,

    // Replies
    pub methods: Vec<ReplyMethod>,
    pub regenerate_on_missing_artifact: bool,

    // Meta
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendKind::Chat,
            chat_base_url: "https://api.openai.com/v1".to_string(),
            chat_api_key: "".to_string(),
            chat_model: "gpt-4o-mini".to_string(),
            pipeline_url: "http://localhost:11434".to_string(),
            pipeline_model: "llama3".to_string(),
            pipeline_merge_template: "{system}\n\n{user}".to_string(),
            temperature: 0.7,
            request_timeout_secs: 60,
            assets_dir: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("quickreply/assets"),
            remote_media_url: "".to_string(),
            hotkeys: vec![HotkeyBinding {
                combo: "ctrl+shift+x".to_string(),
                method: "normal".to_string(),
            }],
            copy_settle_ms: 500,
            paste_settle_ms: 500,
            methods: default_methods(),
            regenerate_on_missing_artifact: false,
            log_level: "INFO".to_string(),
        }
    }
}

impl Config {
    /// Load config from the default location, or create defaults
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    /// Load config from a file; a corrupt file is set aside and defaults used
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        match serde_json::from_str(&content) {
            Ok(config) => Ok(config),
            Err(e) => {
                tracing::warn!("⚠️ Config file corrupted or invalid, using defaults: {}", e);
                let backup_path = path.with_extension("json.corrupt");
                let _ = std::fs::rename(path, &backup_path);
                Ok(Self::default())
            }
        }
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// API key from config, falling back to `OPENAI_API_KEY`
    pub fn resolved_api_key(&self) -> Option<String> {
        if !self.chat_api_key.trim().is_empty() {
            return Some(self.chat_api_key.trim().to_string());
        }
        std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
    }

    pub fn prompts_dir(&self) -> PathBuf {
        self.assets_dir.join("prompts")
    }

    /// Cache for images fetched by remote lookup
    pub fn downloads_dir(&self) -> PathBuf {
        self.assets_dir.join("downloaded")
    }

    pub fn remote_lookup_enabled(&self) -> bool {
        !self.remote_media_url.trim().is_empty()
    }
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("quickreply")
        .join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.backend, BackendKind::Chat);
        assert_eq!(config.request_timeout_secs, 60);
        assert_eq!(config.copy_settle_ms, 500);
        assert!(!config.regenerate_on_missing_artifact);
        assert_eq!(config.methods.len(), 4);
        assert_eq!(config.hotkeys[0].method, "normal");
        assert!(!config.remote_lookup_enabled());
        assert_eq!(config.downloads_dir(), config.assets_dir.join("downloaded"));
    }

    #[test]
    fn test_config_roundtrip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.json");

        let mut config = Config::default();
        config.backend = BackendKind::Pipeline;
        config.regenerate_on_missing_artifact = true;
        config.save_to(&path).expect("Failed to save");

        let restored = Config::load_from(&path).expect("Failed to load");
        assert_eq!(restored.backend, BackendKind::Pipeline);
        assert!(restored.regenerate_on_missing_artifact);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: Config = serde_json::from_str(r#"{"backend":"pipeline"}"#).unwrap();
        assert_eq!(config.backend, BackendKind::Pipeline);
        assert_eq!(config.pipeline_url, "http://localhost:11434");
        assert_eq!(config.methods.len(), 4);
    }

    #[test]
    fn test_corrupt_config_is_backed_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not valid json").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.chat_model, "gpt-4o-mini");
        assert!(!path.exists());
        assert!(dir.path().join("config.json.corrupt").exists());
    }

    #[test]
    fn test_api_key_prefers_config() {
        let mut config = Config::default();
        config.chat_api_key = "  sk-test  ".to_string();
        assert_eq!(config.resolved_api_key().as_deref(), Some("sk-test"));
    }
}
