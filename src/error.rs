use std::path::PathBuf;
use thiserror::Error;

/// Per-item failures raised while producing artifacts.
///
/// None of these abort a batch: the job runner logs them, records them in
/// the summary and moves on to the next pair or image. `ParseAmbiguity` is
/// only ever reported.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("unresolved name '{name}': {reason}")]
    ParseAmbiguity { name: String, reason: String },

    #[error("failed to read image {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to resize image to {width}x{height}: {reason}")]
    Resize {
        width: u32,
        height: u32,
        reason: String,
    },

    #[error("failed to write artifact {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode artifact {}: {source}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Failures of the external color-conversion tool.
#[derive(Error, Debug)]
pub enum ToolError {
    /// The tool could not be launched at all. Fatal for the rest of the
    /// conversion queue, never for the primary artifacts.
    #[error("conversion tool unavailable: {0}")]
    Unavailable(String),

    /// A single call against an open document failed.
    #[error("{operation} failed: {message}")]
    Operation {
        operation: &'static str,
        message: String,
    },

    #[error("unknown document handle {0}")]
    UnknownHandle(u64),

    #[error("tool I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ToolError {
    pub fn operation(operation: &'static str, message: impl Into<String>) -> Self {
        ToolError::Operation {
            operation,
            message: message.into(),
        }
    }
}

/// Rejected configuration, reported before any worker starts.
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("resolution must be positive, got {0}")]
    Resolution(f64),

    #[error("target size must be positive, got {width}x{height} cm")]
    TargetSize { width: f64, height: f64 },

    #[error("top margin must not be negative, got {0} cm")]
    TopMargin(f64),

    #[error("guide line width must be positive")]
    GuideWidth,

    #[error("invalid color '{0}', expected #RRGGBB")]
    Color(String),

    #[error("hole count must be 6 or 8, got {0}")]
    HoleCount(u32),

    #[error("hole diameter and margin must be positive")]
    HoleGeometry,

    #[error("quality must be between 1 and 100, got {0}")]
    Quality(u8),

    #[error("no file extensions configured")]
    NoExtensions,

    #[error("invalid size '{0}', expected WIDTHxHEIGHT in centimeters (e.g. 30x180)")]
    Size(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
