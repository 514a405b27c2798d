//! QuickReply Error Types
//!
//! Every failure a reply session can hit, plus the plumbing errors around it.

use thiserror::Error;

/// Central error type for QuickReply
#[derive(Error, Debug)]
pub enum ReplyError {
    #[error("Nothing to reply to: select some text first")]
    EmptyInput,

    #[error("Unsupported input: {0}")]
    UnsupportedInput(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("No media file matches '{0}'")]
    ArtifactNotFound(String),

    #[error("Prompt template not found: {0}")]
    TemplateNotFound(String),

    #[error("Invalid reply method: {0}")]
    InvalidMethod(String),

    #[error("A reply is already in progress")]
    ConcurrentSession,

    #[error("Clipboard error: {0}")]
    Clipboard(String),

    #[error("Input simulation error: {0}")]
    Input(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Lock poisoned: {0}")]
    Lock(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ReplyError {
    /// Wrap any transport or model failure as a generation error
    pub fn generation(err: impl std::fmt::Display) -> Self {
        ReplyError::Generation(err.to_string())
    }
}

/// Result type alias for QuickReply operations
pub type ReplyResult<T> = Result<T, ReplyError>;

/// Helper to convert Mutex poison errors
impl<T> From<std::sync::PoisonError<T>> for ReplyError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        ReplyError::Lock(err.to_string())
    }
}

impl From<reqwest::Error> for ReplyError {
    fn from(err: reqwest::Error) -> Self {
        ReplyError::Generation(err.to_string())
    }
}
