//! Recording of production events.

use crate::error::{ProvenanceError, Result};
use crate::id::ItemId;
use crate::item::ItemRef;
use crate::lock;
use crate::operation::OperationDescription;
use crate::prov::graph::{ProvGraph, ProvNode, SharedGraph};
use crate::prov::trace::{ProvTrace, trace};
use crate::store::{DictStore, SharedStore};
use std::collections::HashSet;
use std::sync::{Arc, RwLockReadGuard};
use tracing::debug;

/// Records which operation produced which item from which sources.
///
/// A builder is a handle: clones record into the same graph. That is how a
/// pipeline hands one builder to all of its steps.
#[derive(Clone)]
pub struct ProvBuilder {
    graph: SharedGraph,
    store: SharedStore,
}

impl ProvBuilder {
    /// Builder with its own private store.
    pub fn new() -> Self {
        Self::with_store(DictStore::shared())
    }

    /// Builder resolving ids through `store`, which may be shared.
    pub fn with_store(store: SharedStore) -> Self {
        Self {
            graph: ProvGraph::new().into_shared(),
            store,
        }
    }

    /// Fresh builder over a new graph and the same store, for a nested
    /// pipeline whose graph will be composed into this one.
    pub fn sub_builder(&self) -> ProvBuilder {
        Self::with_store(Arc::clone(&self.store))
    }

    /// Read-only view of the graph.
    pub fn graph(&self) -> RwLockReadGuard<'_, ProvGraph> {
        lock::read(&self.graph)
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub(crate) fn shared_graph(&self) -> &SharedGraph {
        &self.graph
    }

    /// Record that `operation` produced `item` from `sources`.
    ///
    /// Sources without a node get a leaf stub. Fails if `item` already has
    /// a node.
    pub fn record(
        &self,
        item: &ItemRef,
        operation: &OperationDescription,
        sources: &[ItemRef],
    ) -> Result<()> {
        let mut graph = lock::write(&self.graph);
        if graph.has_node(item.id()) {
            return Err(ProvenanceError::Duplicate {
                id: item.id().clone(),
            }
            .into());
        }
        if sources.iter().any(|s| s.id() == item.id()) {
            return Err(ProvenanceError::Inconsistent {
                message: format!("item {} listed as its own source", item.id()),
            }
            .into());
        }

        self.store.register(Arc::clone(item))?;
        for source in sources {
            self.store.register(Arc::clone(source))?;
            graph.ensure_leaf(source.id());
        }
        graph.add_node(ProvNode {
            item_id: item.id().clone(),
            operation: Some(operation.clone()),
            source_ids: sources.iter().map(|s| s.id().clone()).collect(),
        })
    }

    /// Mark `item` as original data.
    pub fn record_leaf(&self, item: &ItemRef) -> Result<()> {
        let mut graph = lock::write(&self.graph);
        if graph.has_node(item.id()) {
            return Err(ProvenanceError::Duplicate {
                id: item.id().clone(),
            }
            .into());
        }
        self.store.register(Arc::clone(item))?;
        graph.ensure_leaf(item.id());
        Ok(())
    }

    /// Present everything `sub` recorded as one production event by
    /// `operation`.
    ///
    /// Each output item gets a node whose sources are the leaves of the
    /// sub-graph reachable from it. The sub-graph itself is referenced, not
    /// copied. Outputs the sub-graph does not explain (passthrough) become
    /// leaf stubs. An item listed more than once is composed once.
    pub fn compose_sub_graph(
        &self,
        outputs: &[ItemRef],
        operation: &OperationDescription,
        sub: &ProvBuilder,
    ) -> Result<()> {
        if Arc::ptr_eq(&self.graph, &sub.graph) {
            return Err(ProvenanceError::Inconsistent {
                message: "cannot compose a provenance graph into itself".to_string(),
            }
            .into());
        }

        let mut graph = lock::write(&self.graph);
        graph.add_sub_graph(operation.id.clone(), Arc::clone(&sub.graph));
        let inner = lock::read(&sub.graph);

        let mut composed = HashSet::new();
        for item in outputs {
            if !composed.insert(item.id()) {
                continue;
            }
            self.store.register(Arc::clone(item))?;
            let sources = inner.leaf_sources_of(item.id());
            if sources.is_empty() {
                graph.ensure_leaf(item.id());
                continue;
            }
            for source in &sources {
                graph.ensure_leaf(source);
            }
            graph.add_node(ProvNode {
                item_id: item.id().clone(),
                operation: Some(operation.clone()),
                source_ids: sources,
            })?;
        }
        debug!(
            operation = %operation.name,
            outputs = outputs.len(),
            inner_nodes = inner.len(),
            "Composed sub-graph"
        );
        Ok(())
    }

    /// Walk backward from `items`. `max_sub_graph_depth` of `Some(0)` keeps
    /// every composed sub-graph collapsed; `None` expands all of them.
    pub fn trace(&self, items: &[ItemId], max_sub_graph_depth: Option<usize>) -> ProvTrace {
        trace(&self.graph, items, max_sub_graph_depth)
    }

    /// Trace starting from every node of the top-level graph.
    pub fn trace_all(&self, max_sub_graph_depth: Option<usize>) -> ProvTrace {
        let ids: Vec<ItemId> = self
            .graph()
            .nodes()
            .iter()
            .map(|n| n.item_id.clone())
            .collect();
        self.trace(&ids, max_sub_graph_depth)
    }

    pub fn check_sanity(&self) -> Result<()> {
        self.graph().check_sanity()
    }
}

impl Default for ProvBuilder {
    fn default() -> Self {
        Self::new()
    }
}
