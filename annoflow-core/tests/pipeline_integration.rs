//! End-to-end tests: documents flowing through nested pipelines with
//! provenance recorded, traced and exported.

use pretty_assertions::assert_eq;
use std::sync::Arc;

use annoflow_core::prov::DotOptions;
use annoflow_core::{
    Content, DataItem, DictStore, DocPipeline, Document, IdGenerator, ItemGroup, OpOutput,
    Operation, OperationDescription, Pipeline, PipelineStep, ProvBuilder, RAW_TEXT_LABEL, Result,
    Span, TextDocument, write_prov_dot,
};

/// Splits text items on a separator, one output per non-empty piece.
struct Splitter {
    desc: OperationDescription,
    ids: IdGenerator,
    separator: char,
    label: &'static str,
    prov: Option<ProvBuilder>,
}

impl Splitter {
    fn new(ids: &IdGenerator, name: &str, separator: char, label: &'static str) -> Self {
        Self {
            desc: OperationDescription::generated(ids, name),
            ids: ids.clone(),
            separator,
            label,
            prov: None,
        }
    }
}

impl Operation for Splitter {
    fn description(&self) -> OperationDescription {
        self.desc.clone()
    }

    fn process(&self, inputs: &[ItemGroup]) -> Result<OpOutput> {
        let mut out = Vec::new();
        for parent in &inputs[0] {
            let Some(text) = parent.text() else { continue };
            let mut offset = 0;
            for piece in text.split(self.separator) {
                let start = offset;
                offset += piece.len() + self.separator.len_utf8();
                let trimmed = piece.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let lead = piece.len() - piece.trim_start().len();
                let span = Span::new(start + lead, start + lead + trimmed.len());
                let item =
                    DataItem::new(&self.ids, self.label, Content::text(trimmed, vec![span])).into_ref();
                if let Some(prov) = &self.prov {
                    prov.record(&item, &self.desc, &[Arc::clone(parent)])?;
                }
                out.push(item);
            }
        }
        Ok(OpOutput::Single(out))
    }

    fn set_prov_builder(&mut self, builder: ProvBuilder) {
        self.prov = Some(builder);
    }
}

fn inner_pipeline(ids: &IdGenerator) -> Pipeline {
    Pipeline::new(
        ids,
        vec![
            PipelineStep::new(
                Splitter::new(ids, "SentenceSplitter", '.', "sentence"),
                &["raw"],
                &["sentences"],
            ),
            PipelineStep::new(
                Splitter::new(ids, "WordSplitter", ' ', "word"),
                &["sentences"],
                &["words"],
            ),
        ],
        vec!["raw".into()],
        vec!["sentences".into(), "words".into()],
    )
}

fn doc_pipeline(ids: &IdGenerator) -> DocPipeline {
    DocPipeline::new(
        ids,
        vec![PipelineStep::new(
            inner_pipeline(ids),
            &["raw"],
            &["sentences", "words"],
        )],
        vec![("raw".into(), vec![RAW_TEXT_LABEL.into()])],
        vec!["sentences".into(), "words".into()],
    )
}

#[test]
fn nested_pipeline_annotates_document() {
    let ids = IdGenerator::seeded(100);
    let mut docs = vec![TextDocument::new(&ids, "The cat sat. It purred.")];
    doc_pipeline(&ids).process(&mut docs).unwrap();

    let doc = &docs[0];
    let sentences: Vec<&str> = doc
        .anns()
        .items()
        .iter()
        .filter(|i| i.label() == "sentence")
        .filter_map(|i| i.text())
        .collect();
    assert_eq!(sentences, vec!["The cat sat", "It purred"]);
    assert_eq!(doc.annotations_by_label("word").len(), 5);

    let second = &doc.annotations_by_label("sentence")[1];
    let Content::Text { spans, .. } = second.content() else {
        panic!("sentence is not text");
    };
    assert_eq!(&doc.text()[spans[0].start..spans[0].end], "It purred");
}

#[test]
fn provenance_collapses_and_expands() {
    let ids = IdGenerator::seeded(200);
    let mut docs = vec![TextDocument::new(&ids, "One two. Three.")];
    let mut pipeline = doc_pipeline(&ids);
    let builder = ProvBuilder::new();
    pipeline.set_prov_builder(builder.clone());
    pipeline.process(&mut docs).unwrap();
    builder.check_sanity().unwrap();

    let doc = &docs[0];
    let raw_id = doc.raw_segment().id().clone();
    let word = doc.annotations_by_label("word")[0].clone();

    let collapsed = builder.trace(&[word.id().clone()], Some(0));
    let into_word = collapsed.edges_into(word.id());
    assert_eq!(into_word.len(), 1);
    assert_eq!(into_word[0].source, raw_id);
    assert_eq!(into_word[0].operation.name, "Pipeline");
    assert_eq!(collapsed.sources, vec![raw_id.clone()]);

    let expanded = builder.trace(&[word.id().clone()], None);
    let names: Vec<&str> = expanded
        .edges
        .iter()
        .map(|e| e.operation.name.as_str())
        .collect();
    assert_eq!(names, vec!["WordSplitter", "SentenceSplitter"]);
    assert_eq!(expanded.sources, collapsed.sources);
    assert_eq!(expanded.levels.len(), 3);
}

#[test]
fn composed_leaves_match_inner_pipeline_alone() {
    let ids = IdGenerator::seeded(300);
    let text = "Alpha beta. Gamma.";

    let mut alone = inner_pipeline(&ids);
    let alone_builder = ProvBuilder::new();
    alone.set_prov_builder(alone_builder.clone());
    let doc = TextDocument::with_id("doc".into(), text);
    let raw = doc.annotations_by_label(RAW_TEXT_LABEL);
    let groups = alone.process(&[raw.clone()]).unwrap().into_groups();
    let alone_words: Vec<_> = groups[1].iter().map(|w| w.id().clone()).collect();
    let alone_sources = alone_builder.trace(&alone_words, None).sources;

    let mut wrapped = Pipeline::new(
        &ids,
        vec![PipelineStep::new(inner_pipeline(&ids), &["raw"], &["sentences", "words"])],
        vec!["raw".into()],
        vec!["words".into()],
    );
    let builder = ProvBuilder::new();
    wrapped.set_prov_builder(builder.clone());
    let words = wrapped.process(&[raw]).unwrap().items();
    let ids_out: Vec<_> = words.iter().map(|w| w.id().clone()).collect();

    assert_eq!(builder.trace(&ids_out, None).sources, alone_sources);
    assert_eq!(builder.trace(&ids_out, Some(0)).sources, alone_sources);
}

#[test]
fn dot_export_to_file() {
    let ids = IdGenerator::seeded(400);
    let store = DictStore::shared();
    let mut docs = vec![TextDocument::new(&ids, "Hi there.").with_store(Arc::clone(&store))];
    let mut pipeline = doc_pipeline(&ids);
    let builder = ProvBuilder::with_store(store);
    pipeline.set_prov_builder(builder.clone());
    pipeline.process(&mut docs).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prov.dot");
    let mut file = std::fs::File::create(&path).unwrap();
    write_prov_dot(
        &builder,
        &mut file,
        |item| format!("{}: {}", item.label(), item.text().unwrap_or_default()),
        |op| op.name.clone(),
        &DotOptions {
            max_sub_graph_depth: Some(0),
            show_attr_links: false,
        },
    )
    .unwrap();
    drop(file);

    let dot = std::fs::read_to_string(&path).unwrap();
    let raw_id = docs[0].raw_segment().id();
    let sentence = &docs[0].annotations_by_label("sentence")[0];
    assert!(dot.starts_with("digraph {"));
    assert!(dot.contains(&format!("\"{raw_id}\" [label=\"RAW_TEXT: Hi there.\"];")));
    assert!(dot.contains(&format!(
        "\"{raw_id}\" -> \"{}\" [label=\"Pipeline\"];",
        sentence.id()
    )));
    assert!(!dot.contains("SentenceSplitter"));
}
