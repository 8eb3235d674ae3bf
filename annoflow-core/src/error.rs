//! Error types for the annoflow engine.
//!
//! Uses `thiserror` for public API error types with structured variants
//! covering wiring/configuration, runtime lookups, store identity,
//! provenance recording, and opaque operation failures.

use crate::id::ItemId;

/// Top-level error type for the annoflow core library.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Lookup error: {0}")]
    Lookup(#[from] LookupError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Provenance error: {0}")]
    Provenance(#[from] ProvenanceError),

    #[error("Operation error: {0}")]
    Operation(#[from] OperationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Wiring mistakes detectable from the shape of a pipeline or document.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Arity mismatch in {context}: expected {expected} groups, got {actual}")]
    ArityMismatch {
        context: String,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid definition: {message}")]
    InvalidDefinition { message: String },

    #[error("Label '{label}' is reserved for the raw segment")]
    ReservedLabel { label: String },

    #[error("Unknown operation: {name}")]
    UnknownOperation { name: String },

    #[error("Operation '{name}' is already registered")]
    DuplicateOperation { name: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

/// Runtime lookups that found nothing.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("Key '{key}' has not been produced before step {step}")]
    MissingKey { key: String, step: String },

    #[error("Item not found: {id}")]
    ItemNotFound { id: ItemId },
}

/// Identity conflicts inside a store or annotation container.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("A different item is already registered with id {id}")]
    DuplicateId { id: ItemId },
}

/// Errors from the provenance builder.
#[derive(Debug, thiserror::Error)]
pub enum ProvenanceError {
    #[error("Provenance of item {id} has already been recorded")]
    Duplicate { id: ItemId },

    #[error("Provenance graph is inconsistent: {message}")]
    Inconsistent { message: String },
}

/// Opaque failure raised from inside a wrapped operation.
#[derive(Debug, thiserror::Error)]
#[error("'{operation}' failed: {source}")]
pub struct OperationError {
    pub operation: String,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

impl OperationError {
    pub fn new(
        operation: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            operation: operation.into(),
            source: source.into(),
        }
    }
}

impl FlowError {
    pub fn invalid_definition(msg: impl Into<String>) -> Self {
        Self::Config(ConfigError::InvalidDefinition {
            message: msg.into(),
        })
    }

    pub fn arity(context: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::Config(ConfigError::ArityMismatch {
            context: context.into(),
            expected,
            actual,
        })
    }

    pub fn not_found(id: ItemId) -> Self {
        Self::Lookup(LookupError::ItemNotFound { id })
    }
}

/// A type alias for results using the top-level `FlowError`.
pub type Result<T> = std::result::Result<T, FlowError>;
