//! YAML pipeline definitions.
//!
//! ```yaml
//! labels_by_input_key:
//!   - key: raw
//!     labels: [RAW_TEXT]
//! steps:
//!   - operation: SentenceTokenizer
//!     input_keys: [raw]
//!     output_keys: [sentences]
//!   - steps:                      # nested pipeline, composed as one event
//!       - operation: RegexMatcher
//!         config: { rules: [{ label: drug, pattern: aspirin }] }
//!         input_keys: [sentences]
//!         output_keys: [drugs]
//!     input_keys: [sentences]
//!     output_keys: [drugs]
//! output_keys: [sentences, drugs]
//! ```

use annoflow_core::error::{ConfigError, FlowError, Result};
use annoflow_core::{DocPipeline, IdGenerator, Operation, Pipeline, PipelineStep};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

use crate::registry::OperationRegistry;

/// One step: either a registered operation or an inline nested pipeline
/// whose keys are the step's own keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub config: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<StepDefinition>>,
    #[serde(default)]
    pub input_keys: Vec<String>,
    #[serde(default)]
    pub output_keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputBinding {
    pub key: String,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    pub steps: Vec<StepDefinition>,
    pub labels_by_input_key: Vec<InputBinding>,
    #[serde(default)]
    pub output_keys: Vec<String>,
}

/// Parse a pipeline definition from a YAML string.
pub fn parse_definition(yaml: &str) -> Result<PipelineDefinition> {
    serde_yaml::from_str::<PipelineDefinition>(yaml).map_err(|e| {
        FlowError::from(ConfigError::ParseError {
            message: e.to_string(),
        })
    })
}

impl PipelineDefinition {
    /// Check wiring without instantiating anything.
    ///
    /// Checks:
    /// - At least one step exists
    /// - Input keys are unique
    /// - Every step input key is bound before the step runs
    /// - Every output key is produced
    /// - Each step names exactly one of `operation` and `steps`
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for binding in &self.labels_by_input_key {
            if !seen.insert(binding.key.as_str()) {
                return Err(FlowError::invalid_definition(format!(
                    "Duplicate input key: '{}'",
                    binding.key
                )));
            }
        }
        let bound: HashSet<String> = self
            .labels_by_input_key
            .iter()
            .map(|b| b.key.clone())
            .collect();
        validate_steps(&self.steps, bound, &self.output_keys, "pipeline")
    }

    /// Validate, then instantiate every operation through `registry`.
    pub fn build(&self, registry: &OperationRegistry, ids: &IdGenerator) -> Result<DocPipeline> {
        self.validate()?;
        let steps = build_steps(&self.steps, registry, ids)?;
        let labels = self
            .labels_by_input_key
            .iter()
            .map(|b| (b.key.clone(), b.labels.clone()))
            .collect();
        debug!(steps = steps.len(), "Built pipeline from definition");
        Ok(DocPipeline::new(ids, steps, labels, self.output_keys.clone()))
    }
}

fn validate_steps(
    steps: &[StepDefinition],
    mut bound: HashSet<String>,
    output_keys: &[String],
    scope: &str,
) -> Result<()> {
    if steps.is_empty() {
        return Err(FlowError::invalid_definition(format!(
            "{scope} must have at least one step"
        )));
    }
    for (index, step) in steps.iter().enumerate() {
        let name = step_label(index, step);
        match (&step.operation, &step.steps) {
            (Some(_), None) => {}
            (None, Some(inner)) => {
                let inner_bound = step.input_keys.iter().cloned().collect();
                validate_steps(inner, inner_bound, &step.output_keys, &format!("{scope} / {name}"))?;
            }
            _ => {
                return Err(FlowError::invalid_definition(format!(
                    "{scope} / {name}: exactly one of 'operation' and 'steps' is required"
                )));
            }
        }
        for key in &step.input_keys {
            if !bound.contains(key) {
                return Err(FlowError::invalid_definition(format!(
                    "{scope} / {name} reads key '{key}' before it is produced"
                )));
            }
        }
        bound.extend(step.output_keys.iter().cloned());
    }
    for key in output_keys {
        if !bound.contains(key) {
            return Err(FlowError::invalid_definition(format!(
                "{scope} output key '{key}' is never produced"
            )));
        }
    }
    Ok(())
}

fn step_label(index: usize, step: &StepDefinition) -> String {
    format!("#{index} ({})", step.operation.as_deref().unwrap_or("Pipeline"))
}

fn build_steps(
    steps: &[StepDefinition],
    registry: &OperationRegistry,
    ids: &IdGenerator,
) -> Result<Vec<PipelineStep>> {
    steps
        .iter()
        .map(|step| {
            let operation: Box<dyn Operation> = match (&step.operation, &step.steps) {
                (Some(name), _) => registry.create(name, &step.config, ids)?,
                (None, Some(inner)) => Box::new(Pipeline::new(
                    ids,
                    build_steps(inner, registry, ids)?,
                    step.input_keys.clone(),
                    step.output_keys.clone(),
                )),
                (None, None) => {
                    return Err(FlowError::invalid_definition(
                        "step has neither 'operation' nor 'steps'",
                    ));
                }
            };
            Ok(PipelineStep::boxed(
                operation,
                step.input_keys.clone(),
                step.output_keys.clone(),
            ))
        })
        .collect()
}
