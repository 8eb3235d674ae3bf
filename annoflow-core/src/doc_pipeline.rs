//! Document-level wrapper around [`Pipeline`].

use crate::document::Document;
use crate::error::Result;
use crate::id::{IdGenerator, ItemId};
use crate::item::ItemGroup;
use crate::operation::{OpConfig, Operation, OperationDescription};
use crate::pipeline::{Pipeline, PipelineStep};
use crate::prov::ProvBuilder;
use tracing::{debug, info};

/// Feeds document annotations into a pipeline and attaches what comes out
/// back onto the same document.
pub struct DocPipeline {
    pipeline: Pipeline,
    labels_by_input_key: Vec<(String, Vec<String>)>,
}

impl DocPipeline {
    /// `labels_by_input_key` is ordered: its key order is the order of the
    /// inner pipeline's inputs.
    pub fn new(
        ids: &IdGenerator,
        steps: Vec<PipelineStep>,
        labels_by_input_key: Vec<(String, Vec<String>)>,
        output_keys: Vec<String>,
    ) -> Self {
        Self::with_id(ids.generate(), steps, labels_by_input_key, output_keys)
    }

    pub fn with_id(
        id: ItemId,
        steps: Vec<PipelineStep>,
        labels_by_input_key: Vec<(String, Vec<String>)>,
        output_keys: Vec<String>,
    ) -> Self {
        let input_keys = labels_by_input_key.iter().map(|(k, _)| k.clone()).collect();
        Self {
            pipeline: Pipeline::with_id(id, steps, input_keys, output_keys),
            labels_by_input_key,
        }
    }

    pub fn id(&self) -> &ItemId {
        self.pipeline.id()
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn labels_by_input_key(&self) -> &[(String, Vec<String>)] {
        &self.labels_by_input_key
    }

    pub fn description(&self) -> OperationDescription {
        let labels: Vec<serde_json::Value> = self
            .labels_by_input_key
            .iter()
            .map(|(key, labels)| serde_json::json!({ "key": key, "labels": labels }))
            .collect();
        let mut config = OpConfig::new();
        config.insert("steps".into(), self.pipeline.describe_steps().into());
        config.insert("labels_by_input_key".into(), labels.into());
        config.insert(
            "output_keys".into(),
            self.pipeline.output_keys().to_vec().into(),
        );
        OperationDescription::new(self.id().clone(), "DocPipeline").with_config(config)
    }

    pub fn set_prov_builder(&mut self, builder: ProvBuilder) {
        self.pipeline.set_prov_builder(builder);
    }

    /// Run the pipeline on each document in order.
    ///
    /// Stops at the first failing document. Annotations already attached to
    /// earlier documents stay attached.
    pub fn process<D: Document>(&self, docs: &mut [D]) -> Result<()> {
        for doc in docs.iter_mut() {
            let inputs = self.gather_inputs(doc);
            debug!(
                doc = %doc.id(),
                items = inputs.iter().map(Vec::len).sum::<usize>(),
                "Gathered document inputs"
            );

            let outputs = self.pipeline.process(&inputs)?.into_groups();
            let mut attached = 0;
            for item in outputs.into_iter().flatten() {
                doc.add_annotation(item)?;
                attached += 1;
            }
            info!(doc = %doc.id(), items = attached, "Attached annotations");
        }
        Ok(())
    }

    fn gather_inputs<D: Document>(&self, doc: &D) -> Vec<ItemGroup> {
        self.labels_by_input_key
            .iter()
            .map(|(_, labels)| {
                labels
                    .iter()
                    .flat_map(|label| doc.annotations_by_label(label))
                    .collect()
            })
            .collect()
    }
}
