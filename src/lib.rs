//! Switchboard, an MCP orchestration client.
//!
//! Connects to MCP tool servers launched as child processes, aggregates
//! their tools into a single catalog, and drives a streamed Anthropic
//! conversation in which the model can invoke those tools mid-response.
//!
//! The pieces:
//! - [`registry`]: session lifecycle and id assignment for connected servers
//! - [`router`]: the flattened tool catalog and name-to-session routing
//! - [`engine`]: the turn loop (stream, dispatch, resubmit)
//! - [`provider`]: the [`provider::ModelProvider`] trait and the Anthropic
//!   streaming implementation
//! - [`client`]: the connect / ask / shutdown facade the CLI uses

pub mod cli;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod mcp;
pub mod provider;
pub mod registry;
pub mod router;
pub mod types;

pub use client::OrchestrationClient;
pub use error::{Result, SwitchboardError};
