//! MCP schema types.

use serde::{Deserialize, Serialize};

/// A tool advertised by an MCP server.
///
/// The registry snapshots each session's descriptors at connect time; tools
/// a server adds later are not discovered until the next catalog build.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}
