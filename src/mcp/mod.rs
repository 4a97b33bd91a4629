//! Model Context Protocol (MCP) session layer.

pub mod schema;
pub mod session;

pub use schema::ToolDescriptor;
pub use session::{McpSession, ToolCallOutcome};
