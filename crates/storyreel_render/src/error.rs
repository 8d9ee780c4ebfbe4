use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("background not found for section '{section}': {path}")]
    MissingBackground { section: String, path: PathBuf },

    #[error("timeline covers {timeline} sections but the script has {script}")]
    SectionCountMismatch { script: usize, timeline: usize },

    #[error("font could not be loaded: {0}")]
    FontLoad(String),

    #[error("filter stage consumes undefined label '{0}'")]
    UndefinedLabel(String),

    #[error("filter stage output label '{0}' already defined")]
    DuplicateLabel(String),

    #[error("final output label '{0}' was never produced")]
    MissingOutput(String),

    #[error("ffmpeg not found")]
    FfmpegNotFound,

    #[error("ffmpeg failed ({status}); command: {command}")]
    FfmpegFailed { status: String, command: String },

    #[error(transparent)]
    Core(#[from] storyreel_core::CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, RenderError>;
