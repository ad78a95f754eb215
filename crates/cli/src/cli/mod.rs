pub mod config_cmd;
pub mod generate;
pub mod probe;
pub mod tokenize;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::debug;

use crate::config::AppConfig;

#[derive(Parser)]
#[command(
    name = "ovgenai",
    version,
    about = "Tokenize and generate text with OpenVINO GenAI"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, clap::Args, Clone)]
pub struct GlobalArgs {
    /// Extra native library directories (can be repeated; Windows only).
    #[arg(long = "library-dir", env = "OVGENAI_LIBRARY_DIRS", value_delimiter = ',')]
    pub library_dirs: Vec<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load the native library and report what was found.
    Probe,

    /// Encode prompts into token ids.
    Encode(EncodeArgs),

    /// Decode token ids into text.
    Decode(DecodeArgs),

    /// Generate a completion.
    Generate(GenerateArgs),

    /// View / edit configuration.
    Config(ConfigArgs),
}

//  Subcommand argument structs

#[derive(Debug, clap::Args, Clone)]
pub struct EncodeArgs {
    /// Directory holding the tokenizer model.
    #[arg(long)]
    pub tokenizer: PathBuf,

    /// Prompts to encode; more than one is encoded as a padded batch.
    #[arg(required = true)]
    pub prompts: Vec<String>,
}

#[derive(Debug, clap::Args, Clone)]
pub struct DecodeArgs {
    /// Directory holding the tokenizer model.
    #[arg(long)]
    pub tokenizer: PathBuf,

    /// Token ids to decode.
    #[arg(required = true)]
    pub tokens: Vec<u64>,
}

#[derive(Debug, clap::Args, Clone)]
pub struct GenerateArgs {
    /// Exported model directory.
    pub model: PathBuf,

    /// Prompt text.
    pub prompt: String,

    /// OpenVINO device (overrides config).
    #[arg(long, env = "OVGENAI_DEVICE")]
    pub device: Option<String>,

    /// Load the tokenizer from a separate directory.
    #[arg(long)]
    pub tokenizer: Option<PathBuf>,

    /// Pipeline property as KEY=VALUE (default PERFORMANCE_HINT=LATENCY).
    #[arg(long)]
    pub property: Option<String>,
}

#[derive(Debug, clap::Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Display the current configuration.
    Show,
    /// Set a configuration value.
    Set { key: String, value: String },
    /// Print the configuration file location.
    Path,
}

/// Hand the search directories to the binding before its first call.
/// Command-line directories come first, then the configured ones.
pub fn configure_library(global: &GlobalArgs, cfg: &AppConfig) -> anyhow::Result<()> {
    let dirs: Vec<PathBuf> = global
        .library_dirs
        .iter()
        .chain(&cfg.library_dirs)
        .cloned()
        .collect();
    debug!(?dirs, "library search directories");
    ovgenai_core::configure_search_paths(dirs)?;
    Ok(())
}
