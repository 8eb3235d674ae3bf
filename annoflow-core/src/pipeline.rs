//! Keyed pipeline executor.
//!
//! Steps are wired through named keys and run strictly in declaration
//! order. The executor keeps an environment mapping each key to the latest
//! group written under it; a later step writing an existing key replaces
//! the earlier value.

use crate::error::{FlowError, LookupError, Result};
use crate::id::{IdGenerator, ItemId};
use crate::item::ItemGroup;
use crate::operation::{OpConfig, OpOutput, Operation, OperationDescription};
use crate::prov::ProvBuilder;
use std::collections::HashMap;
use tracing::{debug, trace};

/// One operation bound to input and output keys.
pub struct PipelineStep {
    pub operation: Box<dyn Operation>,
    pub input_keys: Vec<String>,
    pub output_keys: Vec<String>,
}

impl PipelineStep {
    pub fn new(
        operation: impl Operation + 'static,
        input_keys: &[&str],
        output_keys: &[&str],
    ) -> Self {
        Self::boxed(
            Box::new(operation),
            input_keys.iter().map(|k| k.to_string()).collect(),
            output_keys.iter().map(|k| k.to_string()).collect(),
        )
    }

    pub fn boxed(
        operation: Box<dyn Operation>,
        input_keys: Vec<String>,
        output_keys: Vec<String>,
    ) -> Self {
        Self {
            operation,
            input_keys,
            output_keys,
        }
    }

    fn describe(&self) -> serde_json::Value {
        serde_json::json!({
            "operation": self.operation.description(),
            "input_keys": self.input_keys,
            "output_keys": self.output_keys,
        })
    }
}

struct ProvWiring {
    parent: ProvBuilder,
    sub: ProvBuilder,
}

/// Ordered composition of steps, itself usable as an [`Operation`].
pub struct Pipeline {
    id: ItemId,
    steps: Vec<PipelineStep>,
    input_keys: Vec<String>,
    output_keys: Vec<String>,
    prov: Option<ProvWiring>,
}

impl Pipeline {
    pub fn new(
        ids: &IdGenerator,
        steps: Vec<PipelineStep>,
        input_keys: Vec<String>,
        output_keys: Vec<String>,
    ) -> Self {
        Self::with_id(ids.generate(), steps, input_keys, output_keys)
    }

    pub fn with_id(
        id: ItemId,
        steps: Vec<PipelineStep>,
        input_keys: Vec<String>,
        output_keys: Vec<String>,
    ) -> Self {
        Self {
            id,
            steps,
            input_keys,
            output_keys,
            prov: None,
        }
    }

    pub fn id(&self) -> &ItemId {
        &self.id
    }

    pub fn steps(&self) -> &[PipelineStep] {
        &self.steps
    }

    pub fn input_keys(&self) -> &[String] {
        &self.input_keys
    }

    pub fn output_keys(&self) -> &[String] {
        &self.output_keys
    }

    /// Step descriptions as they appear in the pipeline's config.
    pub fn describe_steps(&self) -> Vec<serde_json::Value> {
        self.steps.iter().map(PipelineStep::describe).collect()
    }

    /// Run all steps and return one group per declared output key.
    pub fn run(&self, inputs: &[ItemGroup]) -> Result<Vec<ItemGroup>> {
        if inputs.len() != self.input_keys.len() {
            return Err(FlowError::arity(
                "pipeline input",
                self.input_keys.len(),
                inputs.len(),
            ));
        }

        let mut env: HashMap<&str, ItemGroup> = self
            .input_keys
            .iter()
            .map(String::as_str)
            .zip(inputs.iter().cloned())
            .collect();

        for (index, step) in self.steps.iter().enumerate() {
            let name = step_name(index, step);
            let step_inputs = step
                .input_keys
                .iter()
                .map(|key| {
                    env.get(key.as_str()).cloned().ok_or_else(|| {
                        FlowError::Lookup(LookupError::MissingKey {
                            key: key.clone(),
                            step: name.clone(),
                        })
                    })
                })
                .collect::<Result<Vec<ItemGroup>>>()?;

            debug!(
                pipeline = %self.id,
                step = %name,
                inputs = step_inputs.iter().map(Vec::len).sum::<usize>(),
                "Running step"
            );
            let groups = step.operation.process(&step_inputs)?.into_groups();

            if groups.len() != step.output_keys.len() {
                return Err(FlowError::arity(
                    format!("output of step {name}"),
                    step.output_keys.len(),
                    groups.len(),
                ));
            }
            for (key, group) in step.output_keys.iter().zip(groups) {
                if env.contains_key(key.as_str()) {
                    trace!(key = %key, step = %name, "Overwriting key");
                }
                env.insert(key.as_str(), group);
            }
        }

        self.output_keys
            .iter()
            .map(|key| {
                env.get(key.as_str()).cloned().ok_or_else(|| {
                    FlowError::Lookup(LookupError::MissingKey {
                        key: key.clone(),
                        step: "pipeline output".to_string(),
                    })
                })
            })
            .collect()
    }
}

fn step_name(index: usize, step: &PipelineStep) -> String {
    format!("#{index} ({})", step.operation.description().name)
}

impl Operation for Pipeline {
    fn description(&self) -> OperationDescription {
        let mut config = OpConfig::new();
        config.insert("steps".into(), self.describe_steps().into());
        config.insert("input_keys".into(), self.input_keys.clone().into());
        config.insert("output_keys".into(), self.output_keys.clone().into());
        OperationDescription::new(self.id.clone(), "Pipeline").with_config(config)
    }

    fn process(&self, inputs: &[ItemGroup]) -> Result<OpOutput> {
        let groups = self.run(inputs)?;
        if let Some(wiring) = &self.prov {
            let outputs: ItemGroup = groups.iter().flatten().cloned().collect();
            wiring
                .parent
                .compose_sub_graph(&outputs, &self.description(), &wiring.sub)?;
        }
        Ok(OpOutput::from_groups(groups))
    }

    fn set_prov_builder(&mut self, builder: ProvBuilder) {
        let sub = builder.sub_builder();
        for step in &mut self.steps {
            step.operation.set_prov_builder(sub.clone());
        }
        self.prov = Some(ProvWiring {
            parent: builder,
            sub,
        });
    }
}
