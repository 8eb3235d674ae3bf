//! Data items: the units that flow between pipeline steps.
//!
//! An item is shared as [`ItemRef`] (`Arc<DataItem>`). Identity is reference
//! identity: a store hands back the very `Arc` that was registered. The id,
//! label, content and metadata are fixed at construction; only the attached
//! attribute list can grow afterwards, which is what in-place operations use.

use crate::id::{IdGenerator, ItemId};
use crate::lock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, RwLock};

/// Shared handle to a data item.
pub type ItemRef = Arc<DataItem>;

/// An ordered group of items bound to one pipeline key.
pub type ItemGroup = Vec<ItemRef>;

/// Free-form item metadata.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Byte range in a text, end exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Time range in an audio signal, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioSpan {
    pub start: f64,
    pub end: f64,
}

impl AudioSpan {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// What an item carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Content {
    /// Text segment or entity, with its spans in the document text.
    Text { text: String, spans: Vec<Span> },
    /// Audio segment.
    Audio { span: AudioSpan },
    /// Attribute-like value.
    Value { value: serde_json::Value },
}

impl Content {
    pub fn text(text: impl Into<String>, spans: Vec<Span>) -> Self {
        Content::Text {
            text: text.into(),
            spans,
        }
    }

    pub fn value(value: impl Into<serde_json::Value>) -> Self {
        Content::Value {
            value: value.into(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text { text, .. } => Some(text),
            _ => None,
        }
    }

    pub fn as_value(&self) -> Option<&serde_json::Value> {
        match self {
            Content::Value { value } => Some(value),
            _ => None,
        }
    }
}

/// One unit of content flowing through the system.
pub struct DataItem {
    id: ItemId,
    label: String,
    content: Content,
    metadata: Metadata,
    attrs: RwLock<Vec<ItemRef>>,
}

impl DataItem {
    /// Create an item with a freshly generated id.
    pub fn new(ids: &IdGenerator, label: impl Into<String>, content: Content) -> Self {
        Self::with_id(ids.generate(), label, content)
    }

    /// Create an item with a caller-supplied id.
    pub fn with_id(id: ItemId, label: impl Into<String>, content: Content) -> Self {
        Self {
            id,
            label: label.into(),
            content,
            metadata: Metadata::new(),
            attrs: RwLock::new(Vec::new()),
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Wrap into a shared handle.
    pub fn into_ref(self) -> ItemRef {
        Arc::new(self)
    }

    pub fn id(&self) -> &ItemId {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn text(&self) -> Option<&str> {
        self.content.as_text()
    }

    /// Attach an attribute item.
    pub fn add_attr(&self, attr: ItemRef) {
        lock::write(&self.attrs).push(attr);
    }

    /// Snapshot of the attached attributes, in attachment order.
    pub fn attrs(&self) -> Vec<ItemRef> {
        lock::read(&self.attrs).clone()
    }

    /// Attributes with the given label.
    pub fn attrs_by_label(&self, label: &str) -> Vec<ItemRef> {
        lock::read(&self.attrs)
            .iter()
            .filter(|a| a.label() == label)
            .cloned()
            .collect()
    }

    /// Duplicate this item under a new id. Attributes are not carried over.
    pub fn copy_with_new_id(&self, ids: &IdGenerator) -> DataItem {
        DataItem::new(ids, self.label.clone(), self.content.clone())
            .with_metadata(self.metadata.clone())
    }
}

impl fmt::Debug for DataItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataItem")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("content", &self.content)
            .field("metadata", &self.metadata)
            .field("attrs", &lock::read(&self.attrs).len())
            .finish()
    }
}
