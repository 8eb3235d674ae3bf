//! The operation capability set.
//!
//! An operation has a static [`OperationDescription`], a `process` entry
//! point over positional item groups, and an optional provenance hook.
//! Concrete operations are plain types implementing [`Operation`]; pipelines
//! hold them as `Box<dyn Operation>`.

use crate::error::Result;
use crate::id::{IdGenerator, ItemId};
use crate::item::{ItemGroup, ItemRef};
use crate::prov::ProvBuilder;
use serde::{Deserialize, Serialize};

/// Structural configuration of an operation: nested primitive values only.
pub type OpConfig = serde_json::Map<String, serde_json::Value>;

/// Static snapshot of an operation instance, used for provenance labels
/// and serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationDescription {
    pub id: ItemId,
    pub name: String,
    #[serde(default)]
    pub config: OpConfig,
}

impl OperationDescription {
    pub fn new(id: ItemId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            config: OpConfig::new(),
        }
    }

    /// Description with an id freshly drawn from `ids`.
    pub fn generated(ids: &IdGenerator, name: impl Into<String>) -> Self {
        Self::new(ids.generate(), name)
    }

    pub fn with_config(mut self, config: OpConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_entry(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }
}

/// What an operation hands back.
#[derive(Debug, Clone, Default)]
pub enum OpOutput {
    /// Inputs were modified in place, no new items.
    #[default]
    InPlace,
    /// A single bare group.
    Single(ItemGroup),
    /// One group per declared output key.
    Groups(Vec<ItemGroup>),
}

impl OpOutput {
    /// Pick the natural shape for `groups`: none, one unwrapped, or many.
    pub fn from_groups(mut groups: Vec<ItemGroup>) -> Self {
        match groups.len() {
            0 => OpOutput::InPlace,
            1 => OpOutput::Single(groups.remove(0)),
            _ => OpOutput::Groups(groups),
        }
    }

    /// Normalize to a list of groups: `InPlace` is empty, `Single` is one.
    pub fn into_groups(self) -> Vec<ItemGroup> {
        match self {
            OpOutput::InPlace => Vec::new(),
            OpOutput::Single(group) => vec![group],
            OpOutput::Groups(groups) => groups,
        }
    }

    pub fn group_count(&self) -> usize {
        match self {
            OpOutput::InPlace => 0,
            OpOutput::Single(_) => 1,
            OpOutput::Groups(groups) => groups.len(),
        }
    }

    /// Every item of every group, in group order.
    pub fn items(&self) -> Vec<ItemRef> {
        match self {
            OpOutput::InPlace => Vec::new(),
            OpOutput::Single(group) => group.clone(),
            OpOutput::Groups(groups) => groups.iter().flatten().cloned().collect(),
        }
    }
}

/// Trait that all pipeline operations implement.
pub trait Operation: Send + Sync {
    /// Static description of this instance.
    fn description(&self) -> OperationDescription;

    /// Transform positional input groups into output groups.
    fn process(&self, inputs: &[ItemGroup]) -> Result<OpOutput>;

    /// Attach a provenance builder. Operations that keep the default do not
    /// report their production events.
    fn set_prov_builder(&mut self, _builder: ProvBuilder) {}
}
