//! Error types shared by the extraction adapter and the layout engine.

use thiserror::Error;

/// Errors surfaced by note extraction and staff layout.
#[derive(Debug, Error)]
pub enum Error {
    /// Audio input was malformed or empty.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The pitch-detection model failed. Partial output is discarded.
    #[error("Model error: {context}")]
    Model {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    /// A note or layout setting was outside its valid domain.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Extraction was cancelled before the model signalled completion.
    #[error("Extraction cancelled")]
    Cancelled,
}

impl Error {
    pub(crate) fn model(
        context: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    ) -> Self {
        Error::Model {
            context: context.into(),
            source: source.into(),
        }
    }

    pub(crate) fn invalid_note(index: usize, reason: impl std::fmt::Display) -> Self {
        Error::Validation(format!("note {index}: {reason}"))
    }
}

/// Result type for extraction and layout operations
pub type Result<T> = std::result::Result<T, Error>;
