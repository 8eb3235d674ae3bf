//! Regular-expression entity matcher.

use annoflow_core::error::{ConfigError, FlowError, Result};
use annoflow_core::{
    Content, DataItem, IdGenerator, ItemGroup, OpOutput, Operation, OperationDescription,
    ProvBuilder, Span,
};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::parse_config;
use crate::tokenizer::base_offset;

/// One matching rule: every match of `pattern` becomes a `label` entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegexRule {
    pub label: String,
    pub pattern: String,
    #[serde(default = "default_case_sensitive")]
    pub case_sensitive: bool,
}

fn default_case_sensitive() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegexMatcherConfig {
    pub rules: Vec<RegexRule>,
}

pub struct RegexMatcher {
    desc: OperationDescription,
    rules: Vec<(String, Regex)>,
    ids: IdGenerator,
    prov: Option<ProvBuilder>,
}

impl RegexMatcher {
    pub const NAME: &'static str = "RegexMatcher";

    /// Compile all rules. Fails on the first invalid pattern.
    pub fn new(ids: &IdGenerator, config: RegexMatcherConfig) -> Result<Self> {
        let rules = config
            .rules
            .iter()
            .map(|rule| {
                RegexBuilder::new(&rule.pattern)
                    .case_insensitive(!rule.case_sensitive)
                    .build()
                    .map(|re| (rule.label.clone(), re))
                    .map_err(|e| {
                        FlowError::from(ConfigError::ParseError {
                            message: format!("invalid pattern for '{}': {e}", rule.label),
                        })
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        let desc = OperationDescription::generated(ids, Self::NAME)
            .with_entry("rules", serde_json::to_value(&config.rules)?);
        Ok(Self {
            desc,
            rules,
            ids: ids.clone(),
            prov: None,
        })
    }

    pub fn from_config(
        config: &serde_json::Value,
        ids: &IdGenerator,
    ) -> Result<Box<dyn Operation>> {
        let config: RegexMatcherConfig = parse_config(Self::NAME, config)?;
        Ok(Box::new(Self::new(ids, config)?))
    }
}

impl Operation for RegexMatcher {
    fn description(&self) -> OperationDescription {
        self.desc.clone()
    }

    fn process(&self, inputs: &[ItemGroup]) -> Result<OpOutput> {
        let mut entities = Vec::new();
        for segment in inputs.iter().flatten() {
            let Some(text) = segment.text() else {
                continue;
            };
            let base = base_offset(segment.content());
            for (label, re) in &self.rules {
                for m in re.find_iter(text) {
                    let spans = base
                        .map(|b| vec![Span::new(b + m.start(), b + m.end())])
                        .unwrap_or_default();
                    let entity =
                        DataItem::new(&self.ids, label.clone(), Content::text(m.as_str(), spans))
                            .into_ref();
                    if let Some(prov) = &self.prov {
                        prov.record(&entity, &self.desc, &[Arc::clone(segment)])?;
                    }
                    entities.push(entity);
                }
            }
        }
        debug!(entities = entities.len(), "Matched entities");
        Ok(OpOutput::Single(entities))
    }

    fn set_prov_builder(&mut self, builder: ProvBuilder) {
        self.prov = Some(builder);
    }
}
