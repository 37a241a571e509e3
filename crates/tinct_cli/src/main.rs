//! Tinct CLI
//!
//! Usage: tinct <command>
//!
//! - `build`: compile every configured entry and write its outputs
//! - `check`: compile without writing anything
//! - `init`: scaffold a new project

mod config;
mod project;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use serde_json::Value;
use tinct_build::io::FsSourceIo;
use tinct_build::{Builder, SourceLoader, TokenTable};
use tracing::{debug, error, info};

use crate::config::{EntryConfig, LoadedConfig, TinctConfig};

#[derive(Parser)]
#[command(name = "tinct")]
#[command(about = "Design-token build compiler")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build every entry and write the configured outputs
    Build {
        /// Path to tinct.toml or the directory containing it
        #[arg(long, default_value = ".")]
        config: PathBuf,
        /// Only build the entry with this file
        #[arg(long)]
        entry: Option<String>,
    },

    /// Build every entry without writing outputs
    Check {
        /// Path to tinct.toml or the directory containing it
        #[arg(long, default_value = ".")]
        config: PathBuf,
    },

    /// Create a tinct.toml and starter documents
    Init {
        /// Project directory
        #[arg(default_value = ".")]
        path: PathBuf,
        /// Project name (defaults to the directory name)
        #[arg(long)]
        name: Option<String>,
    },
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Build { config, entry } => build(&config, entry.as_deref(), true),
        Command::Check { config } => build(&config, None, false),
        Command::Init { path, name } => init(&path, name),
    }
}

/// Compile one entry with the shared loader and builder.
fn compile_entry(
    loader: &SourceLoader<FsSourceIo>,
    builder: &mut Builder,
    entry: &EntryConfig,
) -> Result<Value> {
    let source = loader.load(&entry.file)?;
    let exports = builder.build(&source)?;
    Ok(exports.unwrap_or_else(|| {
        debug!(file = %entry.file, "entry declares no exports");
        Value::Object(Default::default())
    }))
}

fn write_output(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("Failed to write {}", path.display()))?;
    info!("wrote {}", path.display());
    Ok(())
}

fn emit_entry(loaded: &LoadedConfig, entry: &EntryConfig, table: &TokenTable) -> Result<()> {
    if let Some(css) = &entry.css {
        write_output(&loaded.output_path(css), &table.to_css(&entry.selector))?;
    }
    if let Some(types) = &entry.types {
        write_output(
            &loaded.output_path(types),
            &table.to_type_declarations(&entry.type_name),
        )?;
    }
    Ok(())
}

fn build(config: &Path, only: Option<&str>, write: bool) -> Result<()> {
    let loaded = TinctConfig::load_from_dir(config)?;
    let entries: Vec<&EntryConfig> = loaded
        .config
        .entries
        .iter()
        .filter(|e| only.map_or(true, |name| e.file == name))
        .collect();
    if entries.is_empty() {
        match only {
            Some(name) => anyhow::bail!("No entry `{}` in configuration", name),
            None => anyhow::bail!("No entries configured"),
        }
    }

    let loader = SourceLoader::new(FsSourceIo, loaded.source_root());
    let mut builder = Builder::new();
    let mut failed = 0;

    // Entries are isolated: one failure does not stop the others.
    for entry in &entries {
        let result = compile_entry(&loader, &mut builder, entry).and_then(|exports| {
            let table = TokenTable::from_exports(loaded.prefix(entry), &exports);
            if write {
                emit_entry(&loaded, entry, &table)?;
            }
            Ok(table.len())
        });
        match result {
            Ok(count) => println!("{}: {} tokens", entry.file, count),
            Err(err) => {
                failed += 1;
                error!("{}: {:#}", entry.file, err);
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} entries failed", failed, entries.len());
    }
    Ok(())
}

fn init(path: &Path, name: Option<String>) -> Result<()> {
    fs::create_dir_all(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let name = name
        .or_else(|| {
            path.canonicalize()
                .ok()
                .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        })
        .unwrap_or_else(|| "tokens".to_string());

    project::create_project(path, &name)?;
    println!("Created tinct project `{}` in {}", name, path.display());
    Ok(())
}
