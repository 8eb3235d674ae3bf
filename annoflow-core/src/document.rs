//! Documents and their annotation containers.
//!
//! A document owns an ordered set of annotations and exposes them by label.
//! Each document kind has a raw segment covering its whole signal; it is
//! derived from the document id so that it is stable across re-creation,
//! and it is handed out under a reserved label.

use crate::error::{ConfigError, Result, StoreError};
use crate::id::{IdGenerator, ItemId, generate_deterministic};
use crate::item::{AudioSpan, Content, DataItem, ItemRef, Metadata, Span};
use crate::store::{DictStore, SharedStore};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Label of the raw segment of a [`TextDocument`].
pub const RAW_TEXT_LABEL: &str = "RAW_TEXT";

/// Label of the raw segment of an [`AudioDocument`].
pub const RAW_AUDIO_LABEL: &str = "RAW_AUDIO";

/// What a doc pipeline needs from a document.
pub trait Document {
    fn id(&self) -> &ItemId;

    /// Annotations with `label`, in insertion order.
    fn annotations_by_label(&self, label: &str) -> Vec<ItemRef>;

    fn add_annotation(&mut self, item: ItemRef) -> Result<()>;
}

/// Ordered annotation set indexed by id and by label.
pub struct AnnotationContainer {
    raw_label: &'static str,
    raw_segment: ItemRef,
    store: SharedStore,
    has_shared_store: bool,
    items: Vec<ItemRef>,
    by_id: HashMap<ItemId, usize>,
    by_label: HashMap<String, Vec<usize>>,
}

impl AnnotationContainer {
    /// Container with a private store.
    pub fn new(raw_label: &'static str, raw_segment: ItemRef) -> Self {
        Self {
            raw_label,
            raw_segment,
            store: DictStore::shared(),
            has_shared_store: false,
            items: Vec::new(),
            by_id: HashMap::new(),
            by_label: HashMap::new(),
        }
    }

    /// Switch to an externally shared store.
    pub fn with_store(mut self, store: SharedStore) -> Self {
        self.store = store;
        self.has_shared_store = true;
        self
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn has_shared_store(&self) -> bool {
        self.has_shared_store
    }

    pub fn raw_segment(&self) -> &ItemRef {
        &self.raw_segment
    }

    /// Add a user annotation and register it in the store.
    pub fn add(&mut self, item: ItemRef) -> Result<()> {
        if item.label() == self.raw_label {
            return Err(ConfigError::ReservedLabel {
                label: self.raw_label.to_string(),
            }
            .into());
        }
        if self.by_id.contains_key(item.id()) || item.id() == self.raw_segment.id() {
            return Err(StoreError::DuplicateId {
                id: item.id().clone(),
            }
            .into());
        }
        self.store.register(Arc::clone(&item))?;

        let index = self.items.len();
        self.by_id.insert(item.id().clone(), index);
        self.by_label
            .entry(item.label().to_string())
            .or_default()
            .push(index);
        self.items.push(item);
        Ok(())
    }

    /// Annotations with `label`. The raw label yields the raw segment.
    pub fn get_by_label(&self, label: &str) -> Vec<ItemRef> {
        if label == self.raw_label {
            if let Err(e) = self.store.register(Arc::clone(&self.raw_segment)) {
                warn!(id = %self.raw_segment.id(), error = %e, "Raw segment conflicts with stored item");
            }
            return vec![Arc::clone(&self.raw_segment)];
        }
        self.by_label
            .get(label)
            .map(|indices| indices.iter().map(|&i| Arc::clone(&self.items[i])).collect())
            .unwrap_or_default()
    }

    pub fn get_by_id(&self, id: &ItemId) -> Option<ItemRef> {
        if id == self.raw_segment.id() {
            return Some(Arc::clone(&self.raw_segment));
        }
        self.by_id.get(id).map(|&i| Arc::clone(&self.items[i]))
    }

    /// User annotations in insertion order, raw segment excluded.
    pub fn items(&self) -> &[ItemRef] {
        &self.items
    }

    pub fn labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = self.by_label.keys().map(String::as_str).collect();
        labels.sort_unstable();
        labels
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Text document.
pub struct TextDocument {
    id: ItemId,
    text: String,
    metadata: Metadata,
    anns: AnnotationContainer,
}

impl TextDocument {
    pub fn new(ids: &IdGenerator, text: impl Into<String>) -> Self {
        Self::with_id(ids.generate(), text)
    }

    pub fn with_id(id: ItemId, text: impl Into<String>) -> Self {
        let text = text.into();
        let raw = DataItem::with_id(
            raw_segment_id(&id, RAW_TEXT_LABEL),
            RAW_TEXT_LABEL,
            Content::text(text.clone(), vec![Span::new(0, text.len())]),
        )
        .into_ref();
        Self {
            id,
            text,
            metadata: Metadata::new(),
            anns: AnnotationContainer::new(RAW_TEXT_LABEL, raw),
        }
    }

    /// Register annotations in `store` instead of a private one.
    pub fn with_store(mut self, store: SharedStore) -> Self {
        self.anns = self.anns.with_store(store);
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn anns(&self) -> &AnnotationContainer {
        &self.anns
    }

    pub fn raw_segment(&self) -> &ItemRef {
        self.anns.raw_segment()
    }

    pub fn has_shared_store(&self) -> bool {
        self.anns.has_shared_store()
    }
}

impl Document for TextDocument {
    fn id(&self) -> &ItemId {
        &self.id
    }

    fn annotations_by_label(&self, label: &str) -> Vec<ItemRef> {
        self.anns.get_by_label(label)
    }

    fn add_annotation(&mut self, item: ItemRef) -> Result<()> {
        self.anns.add(item)
    }
}

/// Audio document. The signal itself lives outside the engine; the
/// document only knows its duration.
pub struct AudioDocument {
    id: ItemId,
    span: AudioSpan,
    metadata: Metadata,
    anns: AnnotationContainer,
}

impl AudioDocument {
    pub fn new(ids: &IdGenerator, duration: f64) -> Self {
        Self::with_id(ids.generate(), duration)
    }

    pub fn with_id(id: ItemId, duration: f64) -> Self {
        let span = AudioSpan::new(0.0, duration);
        let raw = DataItem::with_id(
            raw_segment_id(&id, RAW_AUDIO_LABEL),
            RAW_AUDIO_LABEL,
            Content::Audio { span },
        )
        .into_ref();
        Self {
            id,
            span,
            metadata: Metadata::new(),
            anns: AnnotationContainer::new(RAW_AUDIO_LABEL, raw),
        }
    }

    pub fn with_store(mut self, store: SharedStore) -> Self {
        self.anns = self.anns.with_store(store);
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn duration(&self) -> f64 {
        self.span.duration()
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn anns(&self) -> &AnnotationContainer {
        &self.anns
    }

    pub fn raw_segment(&self) -> &ItemRef {
        self.anns.raw_segment()
    }

    pub fn has_shared_store(&self) -> bool {
        self.anns.has_shared_store()
    }
}

impl Document for AudioDocument {
    fn id(&self) -> &ItemId {
        &self.id
    }

    fn annotations_by_label(&self, label: &str) -> Vec<ItemRef> {
        self.anns.get_by_label(label)
    }

    fn add_annotation(&mut self, item: ItemRef) -> Result<()> {
        self.anns.add(item)
    }
}

fn raw_segment_id(doc_id: &ItemId, label: &str) -> ItemId {
    generate_deterministic(&format!("{doc_id}:{label}"))
}
