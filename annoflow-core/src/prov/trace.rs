//! Backward traversal over a provenance graph and its composed sub-graphs.
//!
//! The walk keeps a chain of scopes: the top-level graph, then each
//! sub-graph entered through an expanded operation. An item is resolved in
//! the innermost scope first. If that scope only knows it as a leaf, the
//! lookup falls back outward, so items produced before a sub-pipeline ran
//! keep their own history.

use crate::id::ItemId;
use crate::lock;
use crate::operation::OperationDescription;
use crate::prov::graph::{ProvNode, SharedGraph};
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

/// One production edge: `operation` derived `target` from `source`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProvEdge {
    pub source: ItemId,
    pub target: ItemId,
    pub operation: OperationDescription,
}

/// Result of a backward walk.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProvTrace {
    /// `levels[0]` holds the starting items, `levels[k]` the items first
    /// reached after `k` hops backward.
    pub levels: Vec<Vec<ItemId>>,
    pub edges: Vec<ProvEdge>,
    /// Items with no further explanation, in discovery order.
    pub sources: Vec<ItemId>,
}

impl ProvTrace {
    /// Every item visited, level by level.
    pub fn item_ids(&self) -> impl Iterator<Item = &ItemId> {
        self.levels.iter().flatten()
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.item_ids().any(|i| i == id)
    }

    pub fn edges_into(&self, target: &ItemId) -> Vec<&ProvEdge> {
        self.edges.iter().filter(|e| &e.target == target).collect()
    }
}

#[derive(Clone)]
struct Scope {
    graph: SharedGraph,
    depth: usize,
}

pub(crate) fn trace(
    root: &SharedGraph,
    start: &[ItemId],
    max_sub_graph_depth: Option<usize>,
) -> ProvTrace {
    let mut result = ProvTrace::default();
    let mut visited: HashSet<ItemId> = HashSet::new();
    let mut queue: VecDeque<(ItemId, Vec<Scope>, usize)> = VecDeque::new();
    let root_chain = vec![Scope {
        graph: Arc::clone(root),
        depth: 0,
    }];

    for id in start {
        queue.push_back((id.clone(), root_chain.clone(), 0));
    }

    while let Some((id, chain, level)) = queue.pop_front() {
        if !visited.insert(id.clone()) {
            continue;
        }
        if result.levels.len() <= level {
            result.levels.resize_with(level + 1, Vec::new);
        }
        result.levels[level].push(id.clone());

        let Some((node, node_chain)) = resolve(&id, &chain, max_sub_graph_depth) else {
            result.sources.push(id);
            continue;
        };
        let Some(operation) = node.operation else {
            result.sources.push(id);
            continue;
        };
        for source in node.source_ids {
            result.edges.push(ProvEdge {
                source: source.clone(),
                target: id.clone(),
                operation: operation.clone(),
            });
            queue.push_back((source, node_chain.clone(), level + 1));
        }
    }
    result
}

/// Find the node explaining `id`, expanding sub-graphs within the bound.
fn resolve(
    id: &ItemId,
    chain: &[Scope],
    max_depth: Option<usize>,
) -> Option<(ProvNode, Vec<Scope>)> {
    for level in (0..chain.len()).rev() {
        let found = lock::read(&chain[level].graph)
            .node(id)
            .filter(|n| !n.is_leaf())
            .cloned();
        let Some(mut node) = found else {
            continue;
        };
        let mut scopes = chain[..=level].to_vec();
        loop {
            let Some(current) = scopes.last().cloned() else {
                break;
            };
            if max_depth.is_some_and(|max| current.depth >= max) {
                break;
            }
            let Some(op_id) = node.operation.as_ref().map(|op| op.id.clone()) else {
                break;
            };
            let Some(sub) = lock::read(&current.graph).sub_graph(&op_id) else {
                break;
            };
            let inner = lock::read(&sub).node(id).filter(|n| !n.is_leaf()).cloned();
            match inner {
                Some(inner_node) => {
                    scopes.push(Scope {
                        graph: sub,
                        depth: current.depth + 1,
                    });
                    node = inner_node;
                }
                None => break,
            }
        }
        return Some((node, scopes));
    }
    None
}
