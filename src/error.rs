//! Error types for the export pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while exporting a surface
#[derive(Error, Debug)]
pub enum Error {
    /// The rasterization backend is missing or could not be started
    #[error("Capture backend unavailable: {0}")]
    CaptureUnavailable(String),

    /// Style settle or sampling did not finish in the bounded wait
    #[error("Capture timed out after {0}ms")]
    CaptureTimeout(u64),

    /// The capture produced a zero-dimension bitmap
    #[error("Captured surface is empty")]
    EmptySurface,

    /// Writing the finished artifact failed
    #[error("Failed to persist artifact: {0}")]
    PersistenceFailure(String),

    /// Failed to render, composite or encode content
    #[error("Rendering failed: {0}")]
    RenderError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// I/O error outside of artifact persistence
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Short message suitable for showing to the person who asked for the export.
    pub fn user_message(&self) -> String {
        match self {
            Error::CaptureUnavailable(_) => {
                "PDF generation is unavailable: no capture backend could be started.".to_string()
            }
            Error::CaptureTimeout(ms) => format!(
                "PDF generation timed out after {:.1}s. Please try again.",
                *ms as f64 / 1000.0
            ),
            Error::EmptySurface => "There is nothing to export: the document is empty.".to_string(),
            Error::PersistenceFailure(_) => "The PDF could not be saved. Please try again.".to_string(),
            Error::ConfigError(msg) => format!("Export settings are invalid: {}", msg),
            Error::RenderError(_) | Error::Io(_) | Error::Other(_) => {
                "PDF generation failed. Please try again.".to_string()
            }
        }
    }
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        Error::RenderError(format!("PDF encoding failed: {}", err))
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::RenderError(format!("Image processing failed: {}", err))
    }
}
