//! Media asset directories
//!
//! Read-only listing of the candidate files behind each media reply method.

use crate::error::{ReplyError, ReplyResult};
use crate::method::ReplyMethod;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// One candidate file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaEntry {
    /// File name including extension; this is the identifier the backend sees
    pub name: String,
    pub path: PathBuf,
}

impl MediaEntry {
    /// File name without its extension
    pub fn stem(&self) -> &str {
        Path::new(&self.name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.name)
    }
}

/// Root under which every method's `media_dir` lives
#[derive(Debug, Clone)]
pub struct MediaLibrary {
    root: PathBuf,
}

impl MediaLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Absolute candidate directory for a media method
    pub fn dir_for(&self, method: &ReplyMethod) -> ReplyResult<PathBuf> {
        match (&method.media_reply, &method.media_dir) {
            (true, Some(dir)) => Ok(self.root.join(dir)),
            _ => Err(ReplyError::InvalidMethod(format!(
                "'{}' is not a media reply method",
                method.id
            ))),
        }
    }

    /// Files directly inside the method's directory, sorted by name.
    ///
    /// The sorted order is the listing order used for tie-breaks.
    pub fn list(&self, method: &ReplyMethod) -> ReplyResult<Vec<MediaEntry>> {
        let dir = self.dir_for(method)?;
        if !dir.is_dir() {
            return Err(ReplyError::Config(format!(
                "media directory not found: {}",
                dir.display()
            )));
        }

        let mut entries = Vec::new();
        for entry in WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| ReplyError::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                entries.push(MediaEntry {
                    name: name.to_string(),
                    path: entry.path().to_path_buf(),
                });
            }
        }
        Ok(entries)
    }
}
