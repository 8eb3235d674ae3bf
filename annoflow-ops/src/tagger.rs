//! Keyword tagger: attaches a boolean attribute to each input item.
//!
//! Works in place. The attribute is added to the item it describes and no
//! new group is returned.

use annoflow_core::error::Result;
use annoflow_core::{
    Content, DataItem, IdGenerator, ItemGroup, OpOutput, Operation, OperationDescription,
    ProvBuilder,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::parse_config;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordTaggerConfig {
    pub attr_label: String,
    pub keywords: Vec<String>,
    pub case_sensitive: bool,
}

impl Default for KeywordTaggerConfig {
    fn default() -> Self {
        Self {
            attr_label: "has_keyword".to_string(),
            keywords: Vec::new(),
            case_sensitive: false,
        }
    }
}

pub struct KeywordTagger {
    desc: OperationDescription,
    config: KeywordTaggerConfig,
    ids: IdGenerator,
    prov: Option<ProvBuilder>,
}

impl KeywordTagger {
    pub const NAME: &'static str = "KeywordTagger";

    pub fn new(ids: &IdGenerator, mut config: KeywordTaggerConfig) -> Self {
        let desc = OperationDescription::generated(ids, Self::NAME)
            .with_entry("attr_label", config.attr_label.clone())
            .with_entry("keywords", config.keywords.clone())
            .with_entry("case_sensitive", config.case_sensitive);
        if !config.case_sensitive {
            config.keywords = config.keywords.iter().map(|k| k.to_lowercase()).collect();
        }
        Self {
            desc,
            config,
            ids: ids.clone(),
            prov: None,
        }
    }

    pub fn from_config(
        config: &serde_json::Value,
        ids: &IdGenerator,
    ) -> Result<Box<dyn Operation>> {
        let config: KeywordTaggerConfig = parse_config(Self::NAME, config)?;
        Ok(Box::new(Self::new(ids, config)))
    }

    fn matches(&self, text: &str) -> bool {
        if self.config.case_sensitive {
            self.config.keywords.iter().any(|k| text.contains(k.as_str()))
        } else {
            let lowered = text.to_lowercase();
            self.config.keywords.iter().any(|k| lowered.contains(k.as_str()))
        }
    }
}

impl Operation for KeywordTagger {
    fn description(&self) -> OperationDescription {
        self.desc.clone()
    }

    fn process(&self, inputs: &[ItemGroup]) -> Result<OpOutput> {
        for item in inputs.iter().flatten() {
            let value = item.text().is_some_and(|t| self.matches(t));
            let attr = DataItem::new(
                &self.ids,
                self.config.attr_label.clone(),
                Content::value(value),
            )
            .into_ref();
            item.add_attr(Arc::clone(&attr));
            if let Some(prov) = &self.prov {
                prov.record(&attr, &self.desc, &[Arc::clone(item)])?;
            }
        }
        Ok(OpOutput::InPlace)
    }

    fn set_prov_builder(&mut self, builder: ProvBuilder) {
        self.prov = Some(builder);
    }
}
