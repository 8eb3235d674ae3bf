//! Append-only provenance graph.

use crate::error::{ProvenanceError, Result};
use crate::id::ItemId;
use crate::lock;
use crate::operation::OperationDescription;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use tracing::warn;

/// Graph handle shared between a builder and every parent graph that
/// composes it.
pub type SharedGraph = Arc<RwLock<ProvGraph>>;

/// How one item came to be.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvNode {
    pub item_id: ItemId,
    /// `None` for leaf stubs, items referenced as sources but never produced
    /// inside this graph.
    pub operation: Option<OperationDescription>,
    pub source_ids: Vec<ItemId>,
}

impl ProvNode {
    pub fn leaf(item_id: ItemId) -> Self {
        Self {
            item_id,
            operation: None,
            source_ids: Vec::new(),
        }
    }

    /// Original item: nothing in this graph explains it further.
    pub fn is_leaf(&self) -> bool {
        self.source_ids.is_empty()
    }
}

/// Item id to node mapping, plus references to composed sub-graphs.
///
/// Nodes are never rewritten once added. The derived-id index lives beside
/// the nodes so that recording a new item does not touch its sources.
#[derive(Debug, Default)]
pub struct ProvGraph {
    nodes: Vec<ProvNode>,
    index: HashMap<ItemId, usize>,
    derived: HashMap<ItemId, Vec<ItemId>>,
    sub_graphs: Vec<(ItemId, SharedGraph)>,
}

impl ProvGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_shared(self) -> SharedGraph {
        Arc::new(RwLock::new(self))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn has_node(&self, id: &ItemId) -> bool {
        self.index.contains_key(id)
    }

    pub fn node(&self, id: &ItemId) -> Option<&ProvNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> &[ProvNode] {
        &self.nodes
    }

    /// Items recorded with `id` among their sources.
    pub fn derived_ids(&self, id: &ItemId) -> &[ItemId] {
        self.derived.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Add a node. Fails if the item already has one, stub or not.
    pub fn add_node(&mut self, node: ProvNode) -> Result<()> {
        if self.has_node(&node.item_id) {
            return Err(ProvenanceError::Duplicate { id: node.item_id }.into());
        }
        for source in &node.source_ids {
            self.derived
                .entry(source.clone())
                .or_default()
                .push(node.item_id.clone());
        }
        self.index.insert(node.item_id.clone(), self.nodes.len());
        self.nodes.push(node);
        Ok(())
    }

    /// Add a leaf stub for `id` unless a node already exists.
    pub fn ensure_leaf(&mut self, id: &ItemId) {
        if !self.has_node(id) {
            self.index.insert(id.clone(), self.nodes.len());
            self.nodes.push(ProvNode::leaf(id.clone()));
        }
    }

    /// Reference `graph` as the inner graph of operation `op_id`.
    pub fn add_sub_graph(&mut self, op_id: ItemId, graph: SharedGraph) {
        if let Some(entry) = self.sub_graphs.iter_mut().find(|(id, _)| *id == op_id) {
            if !Arc::ptr_eq(&entry.1, &graph) {
                warn!(operation = %op_id, "Replacing sub-graph for operation");
                entry.1 = graph;
            }
            return;
        }
        self.sub_graphs.push((op_id, graph));
    }

    pub fn sub_graph(&self, op_id: &ItemId) -> Option<SharedGraph> {
        self.sub_graphs
            .iter()
            .find(|(id, _)| id == op_id)
            .map(|(_, g)| Arc::clone(g))
    }

    pub fn sub_graphs(&self) -> &[(ItemId, SharedGraph)] {
        &self.sub_graphs
    }

    /// Leaf items reachable backward from `id`, in discovery order.
    ///
    /// Empty when `id` is unknown or is itself a leaf.
    pub fn leaf_sources_of(&self, id: &ItemId) -> Vec<ItemId> {
        let mut leaves = Vec::new();
        let Some(start) = self.node(id) else {
            return leaves;
        };
        let mut visited = HashSet::new();
        let mut to_visit: Vec<ItemId> = start.source_ids.iter().rev().cloned().collect();
        while let Some(current) = to_visit.pop() {
            if !visited.insert(current.clone()) {
                continue;
            }
            match self.node(&current) {
                Some(node) if !node.is_leaf() => {
                    to_visit.extend(node.source_ids.iter().rev().cloned());
                }
                _ => leaves.push(current),
            }
        }
        leaves
    }

    /// Verify internal consistency, recursing into sub-graphs.
    pub fn check_sanity(&self) -> Result<()> {
        for node in &self.nodes {
            for source in &node.source_ids {
                if !self.has_node(source) {
                    return Err(inconsistent(format!(
                        "source {source} of {} has no node",
                        node.item_id
                    )));
                }
                if !self.derived_ids(source).contains(&node.item_id) {
                    return Err(inconsistent(format!(
                        "{} missing from derived ids of {source}",
                        node.item_id
                    )));
                }
            }
            if node.operation.is_none() && !node.is_leaf() {
                return Err(inconsistent(format!(
                    "node {} has sources but no operation",
                    node.item_id
                )));
            }
        }
        for (source, derived) in &self.derived {
            for id in derived {
                let listed = self
                    .node(id)
                    .is_some_and(|n| n.source_ids.contains(source));
                if !listed {
                    return Err(inconsistent(format!(
                        "derived id {id} does not list {source} as a source"
                    )));
                }
            }
        }
        for (op_id, graph) in &self.sub_graphs {
            lock::read(graph).check_sanity().map_err(|e| {
                inconsistent(format!("in sub-graph of operation {op_id}: {e}"))
            })?;
        }
        Ok(())
    }

    /// JSON view of the graph, sub-graphs included.
    pub fn to_json(&self) -> serde_json::Value {
        let nodes: Vec<serde_json::Value> = self
            .nodes
            .iter()
            .map(|n| serde_json::to_value(n).unwrap_or(serde_json::Value::Null))
            .collect();
        let sub_graphs: Vec<serde_json::Value> = self
            .sub_graphs
            .iter()
            .map(|(op_id, g)| {
                serde_json::json!({
                    "operation_id": op_id,
                    "graph": lock::read(g).to_json(),
                })
            })
            .collect();
        serde_json::json!({ "nodes": nodes, "sub_graphs": sub_graphs })
    }
}

fn inconsistent(message: String) -> crate::error::FlowError {
    ProvenanceError::Inconsistent { message }.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FlowError;

    fn op(name: &str) -> OperationDescription {
        OperationDescription::new(ItemId::from(format!("op-{name}")), name)
    }

    fn produced(id: &str, op_name: &str, sources: &[&str]) -> ProvNode {
        ProvNode {
            item_id: ItemId::from(id),
            operation: Some(op(op_name)),
            source_ids: sources.iter().map(|s| ItemId::from(*s)).collect(),
        }
    }

    #[test]
    fn test_add_node_and_derived_index() {
        let mut graph = ProvGraph::new();
        graph.ensure_leaf(&ItemId::from("sentence"));
        graph.add_node(produced("word", "Tokenizer", &["sentence"])).unwrap();

        assert_eq!(graph.len(), 2);
        assert_eq!(graph.derived_ids(&ItemId::from("sentence")), &[ItemId::from("word")]);
        assert!(graph.node(&ItemId::from("sentence")).unwrap().is_leaf());
        graph.check_sanity().unwrap();
    }

    #[test]
    fn test_duplicate_node_rejected() {
        let mut graph = ProvGraph::new();
        graph.ensure_leaf(&ItemId::from("a"));
        let err = graph.add_node(produced("a", "Op", &[])).unwrap_err();
        assert!(matches!(
            err,
            FlowError::Provenance(ProvenanceError::Duplicate { .. })
        ));
    }

    #[test]
    fn test_leaf_sources_walks_to_leaves() {
        let mut graph = ProvGraph::new();
        graph.ensure_leaf(&ItemId::from("s1"));
        graph.ensure_leaf(&ItemId::from("s2"));
        graph.add_node(produced("mid", "A", &["s1"])).unwrap();
        graph.add_node(produced("out", "B", &["mid", "s2"])).unwrap();

        let leaves = graph.leaf_sources_of(&ItemId::from("out"));
        assert_eq!(leaves, vec![ItemId::from("s1"), ItemId::from("s2")]);
        assert!(graph.leaf_sources_of(&ItemId::from("s1")).is_empty());
        assert!(graph.leaf_sources_of(&ItemId::from("unknown")).is_empty());
    }

    #[test]
    fn test_sanity_detects_missing_source() {
        let mut graph = ProvGraph::new();
        graph.add_node(produced("out", "B", &["ghost"])).unwrap();
        assert!(graph.check_sanity().is_err());
    }

    #[test]
    fn test_sub_graph_reference_sees_later_mutation() {
        let inner = ProvGraph::new().into_shared();
        let mut outer = ProvGraph::new();
        outer.add_sub_graph(ItemId::from("op-p"), Arc::clone(&inner));

        lock::write(&inner).ensure_leaf(&ItemId::from("late"));

        let seen = outer.sub_graph(&ItemId::from("op-p")).unwrap();
        assert!(lock::read(&seen).has_node(&ItemId::from("late")));
    }

    #[test]
    fn test_to_json_includes_sub_graphs() {
        let inner = ProvGraph::new().into_shared();
        lock::write(&inner).ensure_leaf(&ItemId::from("x"));
        let mut outer = ProvGraph::new();
        outer.add_sub_graph(ItemId::from("op-p"), inner);

        let json = outer.to_json();
        assert_eq!(json["sub_graphs"][0]["operation_id"], "op-p");
        assert_eq!(json["sub_graphs"][0]["graph"]["nodes"][0]["item_id"], "x");
    }
}
