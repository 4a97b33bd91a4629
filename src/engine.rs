//! Conversation turn engine.
//!
//! Drives one query through the model: submit the transcript, consume the
//! streamed response, dispatch any tool-use requests through the router,
//! fold the results back into the transcript, and resubmit until the model
//! produces a turn with no further tool use.

use futures::StreamExt;
use tracing::{debug, info};

use crate::error::{Result, SwitchboardError};
use crate::provider::{ModelProvider, ProviderRequest};
use crate::registry::{SessionId, SessionRegistry};
use crate::router::ToolCatalog;
use crate::types::{ModelMessage, StreamEvent, ToolUseBlock};

/// Fixed reply when a query arrives with no connected sessions.
pub const NO_SESSIONS_MESSAGE: &str =
    "Error: not connected to any server. Connect to an MCP server first.";

/// Guard against a provider that keeps requesting tools forever.
const MAX_DISPATCH_ROUNDS: usize = 20;

/// Run a single conversation turn for `query`.
///
/// Every `textDelta` is forwarded to `on_chunk` as it arrives; the returned
/// string is the concatenation of all forwarded fragments in emission
/// order. Tool resolution and execution failures are recovered inline as
/// conversation text; everything else propagates as an error.
pub async fn run_turn(
    provider: &dyn ModelProvider,
    registry: &mut SessionRegistry,
    query: &str,
    max_tokens: u32,
    on_chunk: &mut (dyn FnMut(&str) + Send),
) -> Result<String> {
    if registry.is_empty() {
        return Ok(NO_SESSIONS_MESSAGE.to_string());
    }

    let mut messages = vec![ModelMessage::user(query)];
    let mut final_text = String::new();
    let mut offer_tools = true;

    for round in 0..MAX_DISPATCH_ROUNDS {
        // Rebuilt on every submission so sessions connected mid-conversation
        // are picked up.
        let catalog = ToolCatalog::build(registry);
        let tools = if offer_tools && !catalog.is_empty() {
            Some(catalog.definitions().to_vec())
        } else {
            None
        };
        let request = ProviderRequest {
            messages: messages.clone(),
            tools,
            max_tokens,
        };

        let mut stream = provider.stream_turn(&request).await?;

        let mut turn_text = String::new();
        let mut tool_uses: Vec<ToolUseBlock> = Vec::new();
        let mut turn_complete = false;

        while let Some(event) = stream.next().await {
            match event? {
                StreamEvent::TextDelta { text } => {
                    on_chunk(&text);
                    final_text.push_str(&text);
                    turn_text.push_str(&text);
                }
                StreamEvent::ToolUse(block) => tool_uses.push(block),
                StreamEvent::TurnComplete => {
                    turn_complete = true;
                    break;
                }
            }
        }
        if !turn_complete {
            return Err(SwitchboardError::Stream(
                "model stream ended before completing the turn".into(),
            ));
        }

        if !turn_text.is_empty() {
            messages.push(ModelMessage::assistant(turn_text));
        }

        if tool_uses.is_empty() {
            debug!(round, "turn complete without tool use");
            return Ok(final_text);
        }

        // Dispatch strictly in the order the model emitted the blocks.
        for block in tool_uses {
            let route = catalog.resolve(&block.name).cloned();
            let result = match &route {
                None => Err(SwitchboardError::ToolNotFound(block.name.clone())),
                Some(session_id) => match registry.session_mut(session_id) {
                    // The routing snapshot can only go stale if the session
                    // was shut down mid-turn; same as a resolution failure.
                    None => Err(SwitchboardError::ToolNotFound(block.name.clone())),
                    Some(session) => {
                        info!(
                            session = %session_id,
                            tool = %block.name,
                            args = %block.arguments,
                            "calling tool"
                        );
                        session.call_tool(&block.name, block.arguments.clone()).await
                    }
                },
            };

            match result {
                Ok(outcome) => {
                    if let Some(text) = block.text.as_deref().filter(|t| !t.is_empty()) {
                        messages.push(ModelMessage::assistant(text));
                    }
                    messages.push(ModelMessage::tool_result(outcome.content));
                }
                Err(err) if err.is_recoverable_in_turn() => {
                    let line = inline_error_line(&err, route.as_ref());
                    recover_inline(&line, &mut messages, &mut final_text, on_chunk);
                }
                Err(err) => return Err(err),
            }
        }

        // The continuation after a dispatch round is a plain submission:
        // the tool catalog is not re-offered.
        offer_tools = false;
    }

    Err(SwitchboardError::Stream(
        "tool dispatch exceeded the maximum number of rounds".into(),
    ))
}

/// Conversation-text rendering of a recovered dispatch failure.
fn inline_error_line(err: &SwitchboardError, session: Option<&SessionId>) -> String {
    match (err, session) {
        (SwitchboardError::ToolNotFound(name), _) => {
            format!("Error: no connected server provides tool '{name}'.")
        }
        (SwitchboardError::ToolExecution { message, .. }, Some(id)) => {
            format!("Tool execution error ({id}): {message}")
        }
        (err, Some(id)) => format!("Tool execution error ({id}): {err}"),
        (err, None) => format!("Tool execution error: {err}"),
    }
}

/// Surface a recovered error inline: it goes to the live output sink, into
/// the final text, and into the transcript as a user message so the model
/// sees it on the next submission.
fn recover_inline(
    line: &str,
    messages: &mut Vec<ModelMessage>,
    final_text: &mut String,
    on_chunk: &mut (dyn FnMut(&str) + Send),
) {
    on_chunk(line);
    final_text.push_str(line);
    messages.push(ModelMessage::user(line));
}
