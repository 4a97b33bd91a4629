//! MCP session over a child-process stdio transport.

use std::path::Path;

use async_trait::async_trait;
use rmcp::{
    model::{CallToolRequestParams, CallToolResult, ClientInfo, Content, JsonObject, ResourceContents},
    service::{ClientInitializeError, DynService, RoleClient, RunningService, ServiceError, ServiceExt},
    transport::TokioChildProcess,
};
use tokio::process::Command;

use crate::error::{Result, SwitchboardError};
use crate::registry::{ServerKind, ToolSession};

use super::schema::ToolDescriptor;

type DynClientService = Box<dyn DynService<RoleClient>>;
type ClientService = RunningService<RoleClient, DynClientService>;

/// Result of one tool invocation.
///
/// Ephemeral: folded into a transcript message by the turn engine, then
/// discarded.
#[derive(Debug, Clone)]
pub struct ToolCallOutcome {
    pub text_content: Option<String>,
    pub content: Vec<serde_json::Value>,
}

/// One connected MCP server subprocess.
///
/// The initialization handshake is handled by rmcp `serve(...)` during
/// [`McpSession::launch`]; a constructed session is always initialized.
pub struct McpSession {
    service: Option<ClientService>,
}

impl McpSession {
    /// Spawn the server script as a child process and perform the MCP
    /// initialization handshake.
    pub async fn launch(kind: ServerKind, script: &Path) -> Result<Self> {
        let mut command = Command::new(kind.command());
        command.arg(script);
        let transport = TokioChildProcess::new(command).map_err(|e| {
            SwitchboardError::Connection(format!(
                "failed to spawn MCP server process '{}': {e}",
                script.display()
            ))
        })?;

        let service = ClientInfo::default()
            .into_dyn()
            .serve(transport)
            .await
            .map_err(map_initialize_error)?;

        Ok(Self {
            service: Some(service),
        })
    }

    /// List the tools this server advertises.
    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        let service = self.service_ref()?;

        let tools = match service.list_all_tools().await {
            Ok(tools) => tools,
            Err(ServiceError::UnexpectedResponse) => {
                // Some servers reject cursor pagination; fall back to a
                // single unpaginated page.
                let page = service
                    .list_tools(None)
                    .await
                    .map_err(|e| map_service_error("list_tools", e))?;
                page.tools
            }
            Err(e) => return Err(map_service_error("list_tools", e)),
        };

        Ok(tools.into_iter().map(map_tool_descriptor).collect())
    }

    fn service_ref(&self) -> Result<&ClientService> {
        self.service
            .as_ref()
            .ok_or_else(|| SwitchboardError::Stream("MCP session is closed".into()))
    }
}

#[async_trait]
impl ToolSession for McpSession {
    async fn call_tool(
        &mut self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolCallOutcome> {
        let service = self.service_ref()?;
        let arguments = coerce_tool_arguments(arguments)?;

        let result = service
            .call_tool(CallToolRequestParams {
                meta: None,
                name: name.to_owned().into(),
                arguments,
                task: None,
            })
            .await
            .map_err(|e| map_tool_call_error(name, e))?;

        map_call_result(name, result)
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(service) = self.service.take() {
            service
                .cancel()
                .await
                .map_err(|e| SwitchboardError::Stream(format!("MCP session shutdown failed: {e}")))?;
        }
        Ok(())
    }
}

fn map_tool_descriptor(tool: rmcp::model::Tool) -> ToolDescriptor {
    ToolDescriptor {
        name: tool.name.to_string(),
        description: tool.description.map(|d| d.to_string()).unwrap_or_default(),
        input_schema: serde_json::Value::Object((*tool.input_schema).clone()),
    }
}

fn coerce_tool_arguments(value: serde_json::Value) -> Result<Option<JsonObject>> {
    match value {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::Object(map) => Ok(Some(map)),
        serde_json::Value::String(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            let parsed: serde_json::Value = serde_json::from_str(trimmed).map_err(|e| {
                SwitchboardError::InvalidArgument(format!(
                    "MCP tool arguments must be valid JSON: {e}"
                ))
            })?;
            coerce_tool_arguments(parsed)
        }
        other => Err(SwitchboardError::InvalidArgument(format!(
            "MCP tool arguments must be a JSON object; got {other}"
        ))),
    }
}

fn extract_text_content(content: &[Content]) -> Option<String> {
    let mut lines = Vec::new();
    for item in content {
        if let Some(text) = item.as_text() {
            lines.push(text.text.clone());
            continue;
        }
        if let Some(resource) = item.as_resource() {
            if let ResourceContents::TextResourceContents { text, .. } = &resource.resource {
                lines.push(text.clone());
            }
        }
    }

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

fn map_call_result(name: &str, result: CallToolResult) -> Result<ToolCallOutcome> {
    let text_content = extract_text_content(&result.content);
    let content = result
        .content
        .iter()
        .filter_map(|item| serde_json::to_value(item).ok())
        .collect::<Vec<_>>();

    if result.is_error.unwrap_or(false) {
        let message = result
            .structured_content
            .as_ref()
            .map(|v| v.to_string())
            .or_else(|| text_content.clone())
            .unwrap_or_else(|| "MCP tool returned an error result".into());

        return Err(SwitchboardError::ToolExecution {
            tool_name: name.to_string(),
            message,
        });
    }

    Ok(ToolCallOutcome {
        text_content,
        content,
    })
}

/// A failed tool invocation is always a tool execution failure, whatever
/// the underlying service error was; the turn engine recovers it inline.
fn map_tool_call_error(name: &str, error: ServiceError) -> SwitchboardError {
    match map_service_error(name, error) {
        err if err.is_recoverable_in_turn() => err,
        other => SwitchboardError::ToolExecution {
            tool_name: name.to_string(),
            message: other.to_string(),
        },
    }
}

fn map_initialize_error(error: ClientInitializeError) -> SwitchboardError {
    match error {
        ClientInitializeError::ConnectionClosed(context) => {
            SwitchboardError::Connection(format!("MCP initialize connection closed: {context}"))
        }
        ClientInitializeError::TransportError { error, context } => SwitchboardError::Connection(
            format!("MCP initialize transport error ({context}): {error}"),
        ),
        ClientInitializeError::JsonRpcError(error) => SwitchboardError::Connection(format!(
            "MCP initialize JSON-RPC error {}: {}",
            error.code.0, error.message
        )),
        ClientInitializeError::Cancelled => {
            SwitchboardError::Connection("MCP initialize cancelled".into())
        }
        other => SwitchboardError::Connection(format!("MCP initialize error: {other}")),
    }
}

fn map_service_error(context: &str, error: ServiceError) -> SwitchboardError {
    match error {
        ServiceError::McpError(error) => SwitchboardError::ToolExecution {
            tool_name: context.to_string(),
            message: format!("MCP error {}: {}", error.code.0, error.message),
        },
        ServiceError::TransportSend(error) => {
            SwitchboardError::Stream(format!("{context}: MCP transport send failed: {error}"))
        }
        ServiceError::TransportClosed => {
            SwitchboardError::Stream(format!("{context}: MCP transport closed"))
        }
        ServiceError::UnexpectedResponse => {
            SwitchboardError::Stream(format!("{context}: unexpected MCP response"))
        }
        ServiceError::Cancelled { reason } => {
            let suffix = reason
                .as_deref()
                .map(|r| format!(" ({r})"))
                .unwrap_or_default();
            SwitchboardError::Stream(format!("{context}: MCP request cancelled{suffix}"))
        }
        ServiceError::Timeout { timeout } => SwitchboardError::Timeout(timeout.as_millis() as u64),
        other => SwitchboardError::Stream(format!("{context}: MCP service error: {other}")),
    }
}
