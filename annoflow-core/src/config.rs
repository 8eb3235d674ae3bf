//! Configuration system for annoflow.
//!
//! Uses `figment` for layered configuration: defaults -> user config file ->
//! workspace config file -> environment -> explicit overrides.
//! Configuration is loaded from `~/.config/annoflow/config.toml` and/or
//! `annoflow.toml` in the workspace directory.

use crate::id::IdGenerator;
use crate::prov::DotOptions;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the workspace-level config file.
pub const CONFIG_FILE_NAME: &str = "annoflow.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowConfig {
    #[serde(default)]
    pub ids: IdConfig,
    #[serde(default)]
    pub provenance: ProvenanceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Identifier generation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdConfig {
    /// When set, ids are drawn from a reproducible sequence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl IdConfig {
    pub fn generator(&self) -> IdGenerator {
        match self.seed {
            Some(seed) => IdGenerator::seeded(seed),
            None => IdGenerator::random(),
        }
    }
}

/// Provenance recording and export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceConfig {
    pub enabled: bool,
    /// Sub-graph expansion depth for exports; unset expands everything.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_sub_graph_depth: Option<usize>,
    pub show_attr_links: bool,
}

impl Default for ProvenanceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_sub_graph_depth: None,
            show_attr_links: true,
        }
    }
}

impl ProvenanceConfig {
    pub fn dot_options(&self) -> DotOptions {
        DotOptions {
            max_sub_graph_depth: self.max_sub_graph_depth,
            show_attr_links: self.show_attr_links,
        }
    }
}

/// Logging output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Also write JSON logs to the data directory.
    pub json_log: bool,
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            json_log: false,
            level: "info".to_string(),
        }
    }
}

fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "annoflow", "annoflow")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Load configuration from all sources.
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&FlowConfig>,
) -> Result<FlowConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(FlowConfig::default()));

    if let Some(user_config) = user_config_path()
        && user_config.exists()
    {
        figment = figment.merge(Toml::file(&user_config));
    }

    if let Some(ws) = workspace {
        let ws_config = ws.join(CONFIG_FILE_NAME);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // ANNOFLOW_IDS__SEED, ANNOFLOW_PROVENANCE__ENABLED, ...
    figment = figment.merge(Env::prefixed("ANNOFLOW_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(Box::new)
}

/// Check whether a user-level or workspace-level config file exists.
pub fn config_exists(workspace: Option<&Path>) -> bool {
    if user_config_path().is_some_and(|p| p.exists()) {
        return true;
    }
    workspace.is_some_and(|ws| ws.join(CONFIG_FILE_NAME).exists())
}
