use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("script has no sections")]
    EmptyScript,

    #[error("narration audio unreadable: {path}: {reason}")]
    AudioUnreadable { path: PathBuf, reason: String },
}

pub type Result<T> = std::result::Result<T, CoreError>;
