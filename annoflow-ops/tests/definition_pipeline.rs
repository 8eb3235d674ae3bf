//! Integration tests for pipelines built from YAML definitions.
//!
//! Definition file -> registry -> doc pipeline -> documents, with the
//! provenance of the run exported as DOT at several expansion depths.

use annoflow_core::prov::DotOptions;
use annoflow_core::{
    DictStore, Document, IdGenerator, ProvBuilder, TextDocument, write_prov_dot,
};
use annoflow_ops::{OperationRegistry, parse_definition};
use std::sync::Arc;
use tempfile::TempDir;

const DEFINITION: &str = r#"
labels_by_input_key:
  - key: raw
    labels: [RAW_TEXT]
steps:
  - operation: SentenceTokenizer
    input_keys: [raw]
    output_keys: [sentences]
  - steps:
      - operation: RegexMatcher
        config:
          rules:
            - { label: drug, pattern: "aspirin|ibuprofen", case_sensitive: false }
        input_keys: [sentences]
        output_keys: [drugs]
    input_keys: [sentences]
    output_keys: [drugs]
output_keys: [sentences, drugs]
"#;

fn run(texts: &[&str]) -> (ProvBuilder, Vec<TextDocument>) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pipeline.yaml");
    std::fs::write(&path, DEFINITION).unwrap();

    let yaml = std::fs::read_to_string(&path).unwrap();
    let ids = IdGenerator::seeded(7);
    let mut pipeline = parse_definition(&yaml)
        .unwrap()
        .build(&OperationRegistry::with_builtins(), &ids)
        .unwrap();

    let store = DictStore::shared();
    let builder = ProvBuilder::with_store(Arc::clone(&store));
    pipeline.set_prov_builder(builder.clone());

    let mut docs: Vec<TextDocument> = texts
        .iter()
        .map(|t| TextDocument::new(&ids, *t).with_store(Arc::clone(&store)))
        .collect();
    pipeline.process(&mut docs).unwrap();
    (builder, docs)
}

fn dot(builder: &ProvBuilder, depth: Option<usize>) -> String {
    let mut out = Vec::new();
    write_prov_dot(
        builder,
        &mut out,
        |item| item.text().unwrap_or(item.label()).to_string(),
        |op| op.name.clone(),
        &DotOptions {
            max_sub_graph_depth: depth,
            show_attr_links: true,
        },
    )
    .unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn test_definition_annotates_each_document() {
    let (_, docs) = run(&["Took aspirin. Slept well.", "Ibuprofen stopped."]);
    assert_eq!(docs[0].annotations_by_label("sentence").len(), 2);
    assert_eq!(docs[0].annotations_by_label("drug").len(), 1);
    assert_eq!(docs[1].annotations_by_label("sentence").len(), 1);
    assert_eq!(docs[1].annotations_by_label("drug")[0].text(), Some("Ibuprofen"));
}

#[test]
fn test_dot_depth_controls_expansion() {
    let (builder, docs) = run(&["Took aspirin."]);
    builder.check_sanity().unwrap();
    let raw = docs[0].raw_segment().id().to_string();
    let drug = docs[0].annotations_by_label("drug")[0].id().to_string();
    let sentence = docs[0].annotations_by_label("sentence")[0].id().to_string();

    let collapsed = dot(&builder, Some(0));
    assert!(collapsed.contains(&format!("\"{raw}\" -> \"{drug}\" [label=\"Pipeline\"];")));
    assert!(!collapsed.contains("RegexMatcher"));

    let one_level = dot(&builder, Some(1));
    assert!(one_level.contains(&format!("\"{raw}\" -> \"{sentence}\" [label=\"SentenceTokenizer\"];")));
    assert!(one_level.contains(&format!("\"{sentence}\" -> \"{drug}\" [label=\"Pipeline\"];")));

    let expanded = dot(&builder, None);
    assert!(expanded.contains(&format!("\"{sentence}\" -> \"{drug}\" [label=\"RegexMatcher\"];")));
}
