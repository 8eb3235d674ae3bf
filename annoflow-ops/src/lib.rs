//! # Annoflow Ops
//!
//! Built-in operations for annoflow pipelines, the registry that builds them
//! by name, and YAML pipeline definitions.

pub mod definition;
pub mod matcher;
pub mod registry;
pub mod tagger;
pub mod tokenizer;

pub use definition::{PipelineDefinition, parse_definition};
pub use registry::{OperationFactory, OperationRegistry};

use annoflow_core::error::{ConfigError, FlowError, Result};
use serde::de::DeserializeOwned;

/// Register all built-in operations.
pub fn register_builtin_operations(registry: &mut OperationRegistry) {
    let builtins: [(&str, OperationFactory); 3] = [
        (tokenizer::SentenceTokenizer::NAME, tokenizer::SentenceTokenizer::from_config),
        (matcher::RegexMatcher::NAME, matcher::RegexMatcher::from_config),
        (tagger::KeywordTagger::NAME, tagger::KeywordTagger::from_config),
    ];
    for (name, factory) in builtins {
        if let Err(e) = registry.register(name, factory) {
            tracing::warn!(operation = name, error = %e, "Skipping built-in operation");
        }
    }
}

/// Decode an operation config. A missing (null) config means defaults.
pub(crate) fn parse_config<T: DeserializeOwned>(
    operation: &str,
    config: &serde_json::Value,
) -> Result<T> {
    let value = if config.is_null() {
        serde_json::Value::Object(serde_json::Map::new())
    } else {
        config.clone()
    };
    serde_json::from_value(value).map_err(|e| {
        FlowError::from(ConfigError::ParseError {
            message: format!("{operation}: {e}"),
        })
    })
}
