//! Sentence tokenizer.
//!
//! Splits each text item on punctuation characters and emits one segment per
//! non-blank sentence. Spans are expressed in the coordinates of the parent
//! item's own spans, so sentences of a raw segment point into the document
//! text.

use annoflow_core::error::Result;
use annoflow_core::{
    Content, DataItem, IdGenerator, ItemGroup, OpOutput, Operation, OperationDescription,
    ProvBuilder, Span,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::parse_config;

/// Configuration for [`SentenceTokenizer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentenceTokenizerConfig {
    pub output_label: String,
    pub punct_chars: Vec<char>,
    /// Keep the terminating punctuation inside the sentence.
    pub keep_punct: bool,
}

impl Default for SentenceTokenizerConfig {
    fn default() -> Self {
        Self {
            output_label: "sentence".to_string(),
            punct_chars: vec!['.', ';', '?', '!', '\n', '\r'],
            keep_punct: false,
        }
    }
}

pub struct SentenceTokenizer {
    desc: OperationDescription,
    config: SentenceTokenizerConfig,
    ids: IdGenerator,
    prov: Option<ProvBuilder>,
}

impl SentenceTokenizer {
    pub const NAME: &'static str = "SentenceTokenizer";

    pub fn new(ids: &IdGenerator, config: SentenceTokenizerConfig) -> Self {
        let desc = OperationDescription::generated(ids, Self::NAME)
            .with_entry("output_label", config.output_label.clone())
            .with_entry(
                "punct_chars",
                config.punct_chars.iter().map(|c| c.to_string()).collect::<Vec<_>>(),
            )
            .with_entry("keep_punct", config.keep_punct);
        Self {
            desc,
            config,
            ids: ids.clone(),
            prov: None,
        }
    }

    /// Factory entry for the operation registry.
    pub fn from_config(
        config: &serde_json::Value,
        ids: &IdGenerator,
    ) -> Result<Box<dyn Operation>> {
        let config: SentenceTokenizerConfig = parse_config(Self::NAME, config)?;
        Ok(Box::new(Self::new(ids, config)))
    }

    /// Byte ranges of the sentences of `text`, whitespace trimmed.
    pub fn split(&self, text: &str) -> Vec<(usize, usize)> {
        let mut ranges = Vec::new();
        let mut start = 0;
        for (pos, ch) in text.char_indices() {
            if self.config.punct_chars.contains(&ch) {
                let end = if self.config.keep_punct {
                    pos + ch.len_utf8()
                } else {
                    pos
                };
                push_trimmed(text, start, end, &mut ranges);
                start = pos + ch.len_utf8();
            }
        }
        push_trimmed(text, start, text.len(), &mut ranges);
        ranges
    }
}

fn push_trimmed(text: &str, start: usize, end: usize, ranges: &mut Vec<(usize, usize)>) {
    let piece = &text[start..end];
    let trimmed = piece.trim();
    if trimmed.is_empty() {
        return;
    }
    let lead = piece.len() - piece.trim_start().len();
    ranges.push((start + lead, start + lead + trimmed.len()));
}

/// Offset of the parent's text inside the document, when it has one span
/// covering its whole text.
pub(crate) fn base_offset(content: &Content) -> Option<usize> {
    match content {
        Content::Text { text, spans } if spans.len() == 1 && spans[0].len() == text.len() => {
            Some(spans[0].start)
        }
        _ => None,
    }
}

impl Operation for SentenceTokenizer {
    fn description(&self) -> OperationDescription {
        self.desc.clone()
    }

    fn process(&self, inputs: &[ItemGroup]) -> Result<OpOutput> {
        let mut sentences = Vec::new();
        for parent in inputs.iter().flatten() {
            let Some(text) = parent.text() else {
                continue;
            };
            let base = base_offset(parent.content());
            for (start, end) in self.split(text) {
                let spans = base
                    .map(|b| vec![Span::new(b + start, b + end)])
                    .unwrap_or_default();
                let sentence = DataItem::new(
                    &self.ids,
                    self.config.output_label.clone(),
                    Content::text(&text[start..end], spans),
                )
                .into_ref();
                if let Some(prov) = &self.prov {
                    prov.record(&sentence, &self.desc, &[Arc::clone(parent)])?;
                }
                sentences.push(sentence);
            }
        }
        debug!(sentences = sentences.len(), "Tokenized sentences");
        Ok(OpOutput::Single(sentences))
    }

    fn set_prov_builder(&mut self, builder: ProvBuilder) {
        self.prov = Some(builder);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use annoflow_core::{Document, RAW_TEXT_LABEL, TextDocument};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_split_trims_and_drops_blank() {
        let ids = IdGenerator::seeded(1);
        let tokenizer = SentenceTokenizer::new(&ids, SentenceTokenizerConfig::default());
        let text = "The patient is febrile.  No cough!\n\n";
        let ranges = tokenizer.split(text);
        let pieces: Vec<&str> = ranges.iter().map(|&(s, e)| &text[s..e]).collect();
        assert_eq!(pieces, vec!["The patient is febrile", "No cough"]);
    }

    #[test]
    fn test_keep_punct() {
        let ids = IdGenerator::seeded(2);
        let config = SentenceTokenizerConfig {
            keep_punct: true,
            ..Default::default()
        };
        let tokenizer = SentenceTokenizer::new(&ids, config);
        let text = "Yes. No?";
        let pieces: Vec<&str> = tokenizer.split(text).iter().map(|&(s, e)| &text[s..e]).collect();
        assert_eq!(pieces, vec!["Yes.", "No?"]);
    }

    #[test]
    fn test_sentences_point_into_document() {
        let ids = IdGenerator::seeded(3);
        let doc = TextDocument::new(&ids, "Héllo world. Bye.");
        let tokenizer = SentenceTokenizer::new(&ids, SentenceTokenizerConfig::default());
        let out = tokenizer
            .process(&[doc.annotations_by_label(RAW_TEXT_LABEL)])
            .unwrap()
            .items();
        assert_eq!(out.len(), 2);
        let Content::Text { text, spans } = out[1].content() else {
            panic!("not text");
        };
        assert_eq!(text, "Bye");
        assert_eq!(&doc.text()[spans[0].start..spans[0].end], "Bye");
        assert_eq!(out[0].label(), "sentence");
    }

    #[test]
    fn test_records_provenance() {
        let ids = IdGenerator::seeded(4);
        let doc = TextDocument::new(&ids, "A. B.");
        let raw = doc.annotations_by_label(RAW_TEXT_LABEL);
        let mut tokenizer = SentenceTokenizer::new(&ids, SentenceTokenizerConfig::default());
        let builder = ProvBuilder::new();
        tokenizer.set_prov_builder(builder.clone());
        let out = tokenizer.process(&[raw.clone()]).unwrap().items();
        for sentence in &out {
            let graph = builder.graph();
            let node = graph.node(sentence.id()).unwrap();
            assert_eq!(node.source_ids, vec![raw[0].id().clone()]);
        }
    }

    #[test]
    fn test_from_config() {
        let ids = IdGenerator::seeded(5);
        let op = SentenceTokenizer::from_config(
            &serde_json::json!({ "output_label": "phrase", "punct_chars": [","] }),
            &ids,
        )
        .unwrap();
        let desc = op.description();
        assert_eq!(desc.name, "SentenceTokenizer");
        assert_eq!(desc.config["output_label"], "phrase");
        assert_eq!(desc.config["punct_chars"], serde_json::json!([","]));
    }
}
