//! Command-line arguments and configuration resolution for segid-svc
//!
//! Priority: CLI flags → `SEGID_*` environment → TOML file → compiled defaults.

use clap::Parser;
use segid_common::config::{resolve_config_path, TomlConfig};
use segid_common::Result;
use std::path::PathBuf;
use tracing::info;

/// segid-svc command-line arguments
#[derive(Debug, Parser)]
#[command(name = "segid-svc", version, about = "Segment-sampled track identification service")]
pub struct Cli {
    /// Path to config.toml (overrides SEGID_CONFIG)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Socket address to bind, e.g. 0.0.0.0:5730
    #[arg(long)]
    pub bind: Option<String>,

    /// Directory for fetched audio artifacts
    #[arg(long)]
    pub artifact_dir: Option<PathBuf>,
}

/// Build the effective configuration from all layers and validate it
pub fn load_config(cli: &Cli) -> Result<TomlConfig> {
    let mut config = match resolve_config_path(cli.config.as_deref()) {
        Some(path) => TomlConfig::load(&path)?,
        None => TomlConfig::default(),
    };

    config.apply_env();

    if let Some(bind) = &cli.bind {
        config.bind_address = bind.clone();
    }
    if let Some(dir) = &cli.artifact_dir {
        config.artifact_dir = Some(dir.clone());
    }

    config.validate()?;
    info!(bind = %config.bind_address, "Configuration resolved");
    Ok(config)
}
