//! Environment-driven configuration.

use crate::error::{Result, SwitchboardError};

/// Default Anthropic model used when none is supplied on the command line.
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";

/// Default max tokens per model turn.
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

/// Runtime configuration resolved from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    /// Override for the Anthropic API base URL, e.g. for a local proxy.
    pub base_url: Option<String>,
}

impl Config {
    /// Load from environment variables (`ANTHROPIC_API_KEY`,
    /// `ANTHROPIC_BASE_URL`), reading `.env` first if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error

        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| {
            SwitchboardError::Configuration(
                "ANTHROPIC_API_KEY is not set (export it or put it in .env)".into(),
            )
        })?;
        let base_url = std::env::var("ANTHROPIC_BASE_URL").ok();

        Ok(Self { api_key, base_url })
    }
}
