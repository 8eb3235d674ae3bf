//! Identity registry resolving item ids to the items themselves.

use crate::error::{FlowError, Result, StoreError};
use crate::id::ItemId;
use crate::item::ItemRef;
use crate::lock;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::trace;

/// Registry mapping id to item.
///
/// Registering the same reference twice is a no-op. Registering a different
/// item under an id that is already taken fails with
/// [`StoreError::DuplicateId`].
pub trait Store: Send + Sync {
    fn register(&self, item: ItemRef) -> Result<()>;

    fn get(&self, id: &ItemId) -> Result<ItemRef>;

    fn contains(&self, id: &ItemId) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A store handle that can be shared across documents and builders.
pub type SharedStore = Arc<dyn Store>;

/// In-memory store backed by a hash map.
#[derive(Default)]
pub struct DictStore {
    items: RwLock<HashMap<ItemId, ItemRef>>,
}

impl DictStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience constructor for a fresh shared handle.
    pub fn shared() -> SharedStore {
        Arc::new(Self::new())
    }
}

impl Store for DictStore {
    fn register(&self, item: ItemRef) -> Result<()> {
        let mut items = lock::write(&self.items);
        if let Some(existing) = items.get(item.id()) {
            if Arc::ptr_eq(existing, &item) {
                return Ok(());
            }
            return Err(StoreError::DuplicateId {
                id: item.id().clone(),
            }
            .into());
        }
        trace!(id = %item.id(), label = item.label(), "Registering item");
        items.insert(item.id().clone(), item);
        Ok(())
    }

    fn get(&self, id: &ItemId) -> Result<ItemRef> {
        lock::read(&self.items)
            .get(id)
            .cloned()
            .ok_or_else(|| FlowError::not_found(id.clone()))
    }

    fn contains(&self, id: &ItemId) -> bool {
        lock::read(&self.items).contains_key(id)
    }

    fn len(&self) -> usize {
        lock::read(&self.items).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LookupError;
    use crate::id::IdGenerator;
    use crate::item::{Content, DataItem};

    fn item(ids: &IdGenerator, label: &str) -> ItemRef {
        DataItem::new(ids, label, Content::text(label, vec![])).into_ref()
    }

    #[test]
    fn test_register_then_get_returns_same_reference() {
        let store = DictStore::new();
        let ids = IdGenerator::random();
        let a = item(&ids, "sentence");
        store.register(a.clone()).unwrap();

        let fetched = store.get(a.id()).unwrap();
        assert!(Arc::ptr_eq(&a, &fetched));
        assert!(store.contains(a.id()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let store = DictStore::new();
        let err = store.get(&ItemId::from("nope")).unwrap_err();
        assert!(matches!(
            err,
            FlowError::Lookup(LookupError::ItemNotFound { .. })
        ));
    }

    #[test]
    fn test_reregister_same_reference_is_noop() {
        let store = DictStore::new();
        let a = item(&IdGenerator::random(), "word");
        store.register(a.clone()).unwrap();
        store.register(a.clone()).unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_register_conflicting_item_fails() {
        let store = DictStore::new();
        let id = ItemId::from("fixed");
        let a = DataItem::with_id(id.clone(), "a", Content::value(1)).into_ref();
        let b = DataItem::with_id(id.clone(), "b", Content::value(2)).into_ref();
        store.register(a.clone()).unwrap();

        let err = store.register(b).unwrap_err();
        assert!(matches!(err, FlowError::Store(StoreError::DuplicateId { .. })));
        assert!(Arc::ptr_eq(&store.get(&id).unwrap(), &a));
    }

    #[test]
    fn test_shared_store_is_visible_through_clones() {
        let store = DictStore::shared();
        let other = Arc::clone(&store);
        let a = item(&IdGenerator::random(), "x");
        store.register(a.clone()).unwrap();
        assert!(other.contains(a.id()));
    }
}
