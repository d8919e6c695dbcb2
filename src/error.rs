//! Error types for the density model.

use thiserror::Error;

/// A specialized `Result` type for density model operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building, feeding or persisting a density model.
///
/// The per-cell hot path (estimators, context nodes, context trees) never
/// returns these; it trusts its caller.
#[derive(Error, Debug)]
pub enum Error {
    /// A construction parameter is out of range.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An observation has an unusable shape or buffer.
    #[error("Invalid observation: {0}")]
    InvalidObservation(String),

    /// Reading or writing a checkpoint or frame file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Encoding a model failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Decoding a model failed.
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// A decoded checkpoint is internally inconsistent.
    #[error("Incompatible checkpoint: {0}")]
    IncompatibleCheckpoint(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Deserialization(e.to_string())
    }
}

impl From<bincode::error::EncodeError> for Error {
    fn from(e: bincode::error::EncodeError) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<bincode::error::DecodeError> for Error {
    fn from(e: bincode::error::DecodeError) -> Self {
        Error::Deserialization(e.to_string())
    }
}
