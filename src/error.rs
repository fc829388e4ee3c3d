//! Error handling for the operator dataflow layer
//!
//! Every fallible call in the crate returns [`Result`]. Engine failures keep
//! the engine's message verbatim so callers see exactly what the native
//! library reported.

use thiserror::Error;

use crate::engine::{EngineError, EngineErrorKind};
use crate::types::{Direction, SemanticTag};

/// Main error type for DPF client operations
#[derive(Error, Debug)]
pub enum DpfError {
    /// A value's semantic tag is not accepted by the pin it was offered to
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// Several producer pins match one consumer pin
    #[error("ambiguous connection: {message}")]
    AmbiguousConnection {
        message: String,
        candidates: Vec<String>,
    },

    /// The producer has no output compatible with the consumer pin
    #[error("no compatible output: {0}")]
    NoCompatibleOutput(String),

    /// `internal_name` is not registered
    #[error("unknown operator: {0}")]
    UnknownOperator(String),

    /// Lookup of a pin by name or index failed
    #[error("operator '{operator}' has no {direction} pin '{pin}'")]
    UnknownPin {
        operator: String,
        direction: Direction,
        pin: String,
    },

    /// The engine raised during a call
    #[error("{0}")]
    Engine(String),

    /// No gateway entry for this (direction, tag)
    #[error("{tag} is not yet supported as an operator {direction}")]
    UnsupportedMarshalling { tag: SemanticTag, direction: Direction },

    /// The engine connection is gone; every handle is invalid
    #[error("connection to the engine lost: {0}")]
    ConnectionLost(String),

    /// Errors related to configuration loading/saving
    #[error("configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<EngineError> for DpfError {
    fn from(err: EngineError) -> Self {
        match err.kind {
            EngineErrorKind::TypeMismatch => DpfError::TypeMismatch(err.message),
            EngineErrorKind::UnknownOperator => DpfError::UnknownOperator(err.message),
            EngineErrorKind::ConnectionLost => DpfError::ConnectionLost(err.message),
            EngineErrorKind::Evaluation
            | EngineErrorKind::InvalidHandle
            | EngineErrorKind::Unsupported => DpfError::Engine(err.message),
        }
    }
}

/// Result type alias for DPF client operations
pub type Result<T> = std::result::Result<T, DpfError>;
