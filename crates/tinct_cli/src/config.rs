//! Tinct configuration file handling

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "tinct.toml";

/// Top-level Tinct configuration (tinct.toml)
#[derive(Debug, Deserialize, Serialize)]
pub struct TinctConfig {
    pub project: ProjectConfig,
    #[serde(default, rename = "entry")]
    pub entries: Vec<EntryConfig>,
}

/// Project metadata
#[derive(Debug, Deserialize, Serialize)]
pub struct ProjectConfig {
    pub name: String,
    /// Directory every document must live under (relative to tinct.toml)
    #[serde(default = "default_source_root")]
    pub source_root: String,
}

fn default_source_root() -> String {
    "tokens".to_string()
}

/// One document to build
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EntryConfig {
    /// Entry document, relative to the source root
    pub file: String,
    /// CSS variable prefix; defaults to the project name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default = "default_selector")]
    pub selector: String,
    /// Stylesheet output path (relative to tinct.toml)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub css: Option<String>,
    /// Type declaration output path (relative to tinct.toml)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub types: Option<String>,
    #[serde(default = "default_type_name")]
    pub type_name: String,
}

fn default_selector() -> String {
    ":root".to_string()
}

fn default_type_name() -> String {
    "Tokens".to_string()
}

impl EntryConfig {
    pub fn new(file: &str) -> Self {
        Self {
            file: file.to_string(),
            prefix: None,
            selector: default_selector(),
            css: None,
            types: None,
            type_name: default_type_name(),
        }
    }
}

/// A configuration together with the directory it was loaded from.
#[derive(Debug)]
pub struct LoadedConfig {
    pub config: TinctConfig,
    pub base_dir: PathBuf,
}

impl LoadedConfig {
    pub fn source_root(&self) -> PathBuf {
        self.base_dir.join(&self.config.project.source_root)
    }

    pub fn output_path(&self, relative: &str) -> PathBuf {
        self.base_dir.join(relative)
    }

    pub fn prefix<'a>(&'a self, entry: &'a EntryConfig) -> &'a str {
        entry.prefix.as_deref().unwrap_or(&self.config.project.name)
    }
}

impl TinctConfig {
    /// Load configuration from a directory (looks for tinct.toml) or a file path
    pub fn load_from_dir(path: &Path) -> Result<LoadedConfig> {
        let config_path = if path.is_file() {
            path.to_path_buf()
        } else {
            path.join(CONFIG_FILE)
        };

        if !config_path.exists() {
            anyhow::bail!(
                "No {} found in {}. Run `tinct init` to create one.",
                CONFIG_FILE,
                path.display()
            );
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let config: TinctConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        let base_dir = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(LoadedConfig { config, base_dir })
    }

    /// Create a new configuration with one entry document
    pub fn new(name: &str, entry: &str) -> Self {
        let mut entry = EntryConfig::new(entry);
        entry.css = Some("dist/tokens.css".to_string());
        entry.types = Some("dist/tokens.d.ts".to_string());
        Self {
            project: ProjectConfig {
                name: name.to_string(),
                source_root: default_source_root(),
            },
            entries: vec![entry],
        }
    }

    /// Serialize to TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }
}
