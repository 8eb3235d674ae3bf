//! Graphviz DOT rendering of a provenance trace.

use crate::error::Result;
use crate::id::ItemId;
use crate::item::DataItem;
use crate::operation::OperationDescription;
use crate::prov::ProvBuilder;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::Write;

/// Rendering options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DotOptions {
    /// `Some(0)` draws each composed pipeline as one edge; `None` expands
    /// every level.
    pub max_sub_graph_depth: Option<usize>,
    /// Draw dashed links from items to their attached attributes.
    pub show_attr_links: bool,
}

impl Default for DotOptions {
    fn default() -> Self {
        Self {
            max_sub_graph_depth: None,
            show_attr_links: true,
        }
    }
}

/// Write the whole provenance of `builder` as a DOT digraph.
///
/// Node lines look like `"<id>" [label="..."];` and edge lines like
/// `"<source>" -> "<target>" [label="..."];`, one per line. Items missing
/// from the store are labelled with their id.
pub fn write_prov_dot<W, F, G>(
    builder: &ProvBuilder,
    writer: &mut W,
    item_formatter: F,
    op_formatter: G,
    options: &DotOptions,
) -> Result<()>
where
    W: Write,
    F: Fn(&DataItem) -> String,
    G: Fn(&OperationDescription) -> String,
{
    let trace = builder.trace_all(options.max_sub_graph_depth);
    let mut written: HashSet<ItemId> = HashSet::new();

    writer.write_all(b"digraph {\n\n")?;

    for id in trace.item_ids() {
        let label = match builder.store().get(id) {
            Ok(item) => item_formatter(&item),
            Err(_) => id.to_string(),
        };
        write_node(writer, id, &label)?;
        written.insert(id.clone());
    }

    writer.write_all(b"\n")?;
    for edge in &trace.edges {
        writeln!(
            writer,
            "\"{}\" -> \"{}\" [label=\"{}\"];",
            edge.source,
            edge.target,
            escape(&op_formatter(&edge.operation))
        )?;
    }

    if options.show_attr_links {
        for id in trace.item_ids() {
            let Ok(item) = builder.store().get(id) else {
                continue;
            };
            for attr in item.attrs() {
                if written.insert(attr.id().clone()) {
                    write_node(writer, attr.id(), &item_formatter(&attr))?;
                }
                writeln!(
                    writer,
                    "\"{}\" -> \"{}\" [style=dashed, color=grey, label=\"attr\", fontcolor=grey];",
                    id,
                    attr.id()
                )?;
            }
        }
    }

    writer.write_all(b"\n}\n")?;
    Ok(())
}

fn write_node<W: Write>(writer: &mut W, id: &ItemId, label: &str) -> Result<()> {
    writeln!(writer, "\"{}\" [label=\"{}\"];", id, escape(label))?;
    Ok(())
}

fn escape(label: &str) -> String {
    label
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
