//! Provenance: which operation produced which item from which sources.
//!
//! A [`ProvBuilder`] records into a [`ProvGraph`]. Nested pipelines record
//! into their own builder, whose graph the parent then references as a
//! single collapsible production event.

pub mod builder;
pub mod dot;
pub mod graph;
pub mod trace;

pub use builder::ProvBuilder;
pub use dot::{DotOptions, write_prov_dot};
pub use graph::{ProvGraph, ProvNode, SharedGraph};
pub use trace::{ProvEdge, ProvTrace};
