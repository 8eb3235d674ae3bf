//! CLI subcommand handlers.

use crate::Commands;
use crate::ConfigAction;
use crate::RunArgs;
use anyhow::Context;
use annoflow_core::config::{CONFIG_FILE_NAME, FlowConfig};
use annoflow_core::{
    DataItem, DictConvertible, DictStore, Document, ProvBuilder, TextDocument, write_prov_dot,
};
use annoflow_ops::{OperationRegistry, parse_definition};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Handle a CLI subcommand.
pub fn handle_command(
    command: Commands,
    workspace: &Path,
    config: FlowConfig,
) -> anyhow::Result<()> {
    match command {
        Commands::Run(args) => {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            let summary = run_pipeline(&args, &config, &mut out)?;
            info!(
                documents = summary.documents,
                annotations = summary.annotations,
                "Pipeline run complete"
            );
            Ok(())
        }
        Commands::Ops => {
            for name in OperationRegistry::with_builtins().list_names() {
                println!("{name}");
            }
            Ok(())
        }
        Commands::Config { action } => handle_config(action, workspace, &config),
    }
}

fn handle_config(action: ConfigAction, workspace: &Path, config: &FlowConfig) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_path = init_config(workspace)?;
            println!("Configuration file at: {}", config_path.display());
            Ok(())
        }
        ConfigAction::Show => {
            let toml_str = toml::to_string_pretty(config)?;
            println!("{}", toml_str);
            Ok(())
        }
    }
}

/// Write a default `annoflow.toml` unless one exists. Returns its path.
fn init_config(workspace: &Path) -> anyhow::Result<PathBuf> {
    let config_path = workspace.join(CONFIG_FILE_NAME);
    if config_path.exists() {
        info!(path = %config_path.display(), "Configuration file already exists");
        return Ok(config_path);
    }
    let toml_str = toml::to_string_pretty(&FlowConfig::default())?;
    std::fs::write(&config_path, &toml_str)
        .with_context(|| format!("writing {}", config_path.display()))?;
    info!(path = %config_path.display(), "Created default configuration");
    Ok(config_path)
}

/// What a run produced.
#[derive(Debug)]
struct RunSummary {
    documents: usize,
    annotations: usize,
}

/// Run the pipeline over every file, print new annotations as JSON lines
/// to `out`, then write the requested provenance exports.
fn run_pipeline<W: Write>(
    args: &RunArgs,
    config: &FlowConfig,
    out: &mut W,
) -> anyhow::Result<RunSummary> {
    let yaml = std::fs::read_to_string(&args.pipeline)
        .with_context(|| format!("reading pipeline {}", args.pipeline.display()))?;
    let definition = parse_definition(&yaml)
        .with_context(|| format!("parsing pipeline {}", args.pipeline.display()))?;

    let ids = match args.seed {
        Some(seed) => annoflow_core::IdGenerator::seeded(seed),
        None => config.ids.generator(),
    };
    let mut pipeline = definition.build(&OperationRegistry::with_builtins(), &ids)?;

    let store = DictStore::shared();
    let record_prov =
        config.provenance.enabled || args.prov_dot.is_some() || args.prov_json.is_some();
    let builder = ProvBuilder::with_store(Arc::clone(&store));
    if record_prov {
        pipeline.set_prov_builder(builder.clone());
    }

    let mut docs = args
        .files
        .iter()
        .map(|path| {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            let mut metadata = annoflow_core::item::Metadata::new();
            metadata.insert("path".into(), path.display().to_string().into());
            Ok(TextDocument::new(&ids, text)
                .with_store(Arc::clone(&store))
                .with_metadata(metadata))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    pipeline.process(&mut docs)?;

    let mut annotations = 0;
    for doc in &docs {
        for item in doc.anns().items() {
            let line = serde_json::json!({
                "doc": doc.id(),
                "path": doc.metadata().get("path"),
                "annotation": item.to_dict()?,
            });
            writeln!(out, "{line}")?;
            annotations += 1;
        }
    }
    if let Some(path) = &args.prov_dot {
        let mut options = config.provenance.dot_options();
        if args.depth.is_some() {
            options.max_sub_graph_depth = args.depth;
        }
        let mut file = std::fs::File::create(path)
            .with_context(|| format!("creating {}", path.display()))?;
        write_prov_dot(&builder, &mut file, format_item, |op| op.name.clone(), &options)?;
        info!(path = %path.display(), "Wrote provenance DOT");
    }
    if let Some(path) = &args.prov_json {
        let json = builder.graph().to_json();
        std::fs::write(path, serde_json::to_string_pretty(&json)?)
            .with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "Wrote provenance JSON");
    }

    Ok(RunSummary {
        documents: docs.len(),
        annotations,
    })
}

fn format_item(item: &DataItem) -> String {
    match item.text() {
        Some(text) => format!("{}: {}", item.label(), text),
        None => match item.content().as_value() {
            Some(value) => format!("{}: {}", item.label(), value),
            None => item.label().to_string(),
        },
    }
}
