//! Operation registry: builds operations by name from their configuration.
//!
//! Factories are registered at startup, usually through
//! [`OperationRegistry::with_builtins`]. Pipeline definitions then refer to
//! operations by their registered name.

use annoflow_core::error::{ConfigError, Result};
use annoflow_core::{IdGenerator, Operation};
use std::collections::HashMap;
use tracing::debug;

/// Builds one operation instance from its configuration.
pub type OperationFactory = fn(&serde_json::Value, &IdGenerator) -> Result<Box<dyn Operation>>;

/// Name to factory mapping.
pub struct OperationRegistry {
    factories: HashMap<String, OperationFactory>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry preloaded with the built-in operations.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::register_builtin_operations(&mut registry);
        registry
    }

    /// Register a factory. Returns error if the name is already taken.
    pub fn register(&mut self, name: impl Into<String>, factory: OperationFactory) -> Result<()> {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(ConfigError::DuplicateOperation { name }.into());
        }
        debug!(operation = %name, "Registering operation");
        self.factories.insert(name, factory);
        Ok(())
    }

    /// Instantiate the operation registered under `name`.
    pub fn create(
        &self,
        name: &str,
        config: &serde_json::Value,
        ids: &IdGenerator,
    ) -> Result<Box<dyn Operation>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| ConfigError::UnknownOperation {
                name: name.to_string(),
            })?;
        factory(config, ids)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn list_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl Default for OperationRegistry {
    fn default() -> Self {
        Self::new()
    }
}
