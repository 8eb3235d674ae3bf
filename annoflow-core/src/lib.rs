//! # Annoflow Core
//!
//! Core library for annoflow, a keyed pipeline engine for document
//! annotation. Provides data items and their store, the operation trait,
//! pipelines and doc pipelines, provenance recording with sub-graph
//! composition, configuration, and fundamental types.

pub mod config;
pub mod dict;
pub mod doc_pipeline;
pub mod document;
pub mod error;
pub mod id;
pub mod item;
mod lock;
pub mod operation;
pub mod pipeline;
pub mod prov;
pub mod store;

// Re-export commonly used types at the crate root.
pub use config::{FlowConfig, load_config};
pub use dict::DictConvertible;
pub use doc_pipeline::DocPipeline;
pub use document::{
    AnnotationContainer, AudioDocument, Document, RAW_AUDIO_LABEL, RAW_TEXT_LABEL, TextDocument,
};
pub use error::{FlowError, Result};
pub use id::{IdGenerator, ItemId, generate_deterministic};
pub use item::{AudioSpan, Content, DataItem, ItemGroup, ItemRef, Span};
pub use operation::{OpConfig, OpOutput, Operation, OperationDescription};
pub use pipeline::{Pipeline, PipelineStep};
pub use prov::{DotOptions, ProvBuilder, ProvTrace, write_prov_dot};
pub use store::{DictStore, SharedStore, Store};
