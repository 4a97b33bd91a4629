//! Command-line interface definition.

use std::path::PathBuf;

use clap::Parser;

use crate::config::{DEFAULT_MAX_TOKENS, DEFAULT_MODEL};

/// Switchboard CLI
#[derive(Parser, Debug)]
#[command(
    name = "switchboard",
    version,
    about = "Switchboard: MCP orchestration client"
)]
pub struct Cli {
    /// Tool server scripts to launch and connect to (.py or .js)
    #[arg(required = true)]
    pub server_scripts: Vec<PathBuf>,

    /// Anthropic model to use
    #[arg(short, long, default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Max tokens per model turn
    #[arg(long, default_value_t = DEFAULT_MAX_TOKENS)]
    pub max_tokens: u32,
}
