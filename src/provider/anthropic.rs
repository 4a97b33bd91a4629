//! Anthropic Messages API provider.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::debug;

use crate::error::{Result, SwitchboardError};
use crate::types::{ContentPart, Role, StreamEvent, ToolUseBlock};

use super::http::{anthropic_headers, parse_sse_data, shared_client, status_to_error};
use super::{ModelProvider, ProviderRequest};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    model: String,
    api_key: String,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(model: impl Into<String>, api_key: String, base_url: Option<String>) -> Self {
        Self {
            model: model.into(),
            api_key,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        }
    }

    fn build_headers(&self) -> reqwest::header::HeaderMap {
        anthropic_headers(&self.api_key, API_VERSION)
    }

    fn build_request_body(&self, request: &ProviderRequest) -> serde_json::Value {
        let mut messages = Vec::new();

        for msg in &request.messages {
            let role = match msg.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            let content = build_anthropic_content(&msg.content);
            messages.push(serde_json::json!({
                "role": role,
                "content": content,
            }));
        }

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": request.max_tokens,
            "stream": true,
        });

        let obj = body.as_object_mut().unwrap();

        if let Some(ref tools) = request.tools {
            if !tools.is_empty() {
                let tool_defs: Vec<serde_json::Value> = tools
                    .iter()
                    .map(|t| {
                        serde_json::json!({
                            "name": t.name,
                            "description": t.description,
                            "input_schema": t.parameters,
                        })
                    })
                    .collect();
                obj.insert("tools".into(), tool_defs.into());
            }
        }

        body
    }
}

#[async_trait]
impl ModelProvider for AnthropicProvider {
    fn provider_name(&self) -> &str {
        "anthropic"
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    async fn stream_turn(
        &self,
        request: &ProviderRequest,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        let body = self.build_request_body(request);
        let url = format!("{}/messages", self.base_url);

        debug!(
            model = %self.model,
            tools = request.tools.as_ref().map(|t| t.len()).unwrap_or(0),
            "Anthropic stream_turn"
        );

        let resp = shared_client()
            .post(&url)
            .headers(self.build_headers())
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status != 200 {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status, &body_text));
        }

        let byte_stream = resp.bytes_stream();

        let stream = async_stream::stream! {
            let mut buffer = String::new();
            let mut current_block_type: Option<String> = None;
            let mut current_tool_id: Option<String> = None;
            let mut current_tool_name: Option<String> = None;
            let mut current_tool_input = String::new();
            let mut complete = false;
            futures::pin_mut!(byte_stream);

            while let Some(chunk_result) = byte_stream.next().await {
                let chunk = match chunk_result {
                    Ok(c) => c,
                    Err(e) => {
                        yield Err(SwitchboardError::Network(e));
                        break;
                    }
                };

                buffer.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(line_end) = buffer.find('\n') {
                    let line = buffer[..line_end].trim().to_string();
                    buffer = buffer[line_end + 1..].to_string();

                    if line.is_empty() || line.starts_with(':') {
                        continue;
                    }

                    let Some(data) = parse_sse_data(&line) else { continue; };
                    let Ok(event) = serde_json::from_str::<serde_json::Value>(data) else { continue; };

                    let event_type = event.get("type").and_then(|t| t.as_str()).unwrap_or("");
                    match event_type {
                        "content_block_start" => {
                            if let Some(block) = event.get("content_block") {
                                let btype = block.get("type").and_then(|t| t.as_str()).unwrap_or("");
                                current_block_type = Some(btype.to_string());
                                if btype == "tool_use" {
                                    current_tool_id = block.get("id").and_then(|v| v.as_str()).map(|s| s.to_string());
                                    current_tool_name = block.get("name").and_then(|v| v.as_str()).map(|s| s.to_string());
                                    current_tool_input.clear();
                                }
                            }
                        }
                        "content_block_delta" => {
                            if let Some(delta) = event.get("delta") {
                                let delta_type = delta.get("type").and_then(|t| t.as_str()).unwrap_or("");
                                match delta_type {
                                    "text_delta" => {
                                        if let Some(text) = delta.get("text").and_then(|t| t.as_str()) {
                                            yield Ok(StreamEvent::TextDelta { text: text.to_string() });
                                        }
                                    }
                                    "input_json_delta" => {
                                        if let Some(json) = delta.get("partial_json").and_then(|t| t.as_str()) {
                                            current_tool_input.push_str(json);
                                        }
                                    }
                                    _ => {}
                                }
                            }
                        }
                        "content_block_stop" => {
                            if current_block_type.as_deref() == Some("tool_use") {
                                if let (Some(id), Some(name)) = (current_tool_id.take(), current_tool_name.take()) {
                                    let arguments = parse_tool_input(&current_tool_input);
                                    yield Ok(StreamEvent::ToolUse(ToolUseBlock {
                                        id,
                                        name,
                                        arguments,
                                        text: None,
                                    }));
                                    current_tool_input.clear();
                                }
                            }
                            current_block_type = None;
                        }
                        "message_stop" => {
                            yield Ok(StreamEvent::TurnComplete);
                            complete = true;
                        }
                        "error" => {
                            let message = event
                                .get("error")
                                .and_then(|e| e.get("message"))
                                .and_then(|m| m.as_str())
                                .unwrap_or("stream error")
                                .to_string();
                            yield Err(SwitchboardError::Stream(message));
                            complete = true;
                        }
                        _ => {}
                    }

                    if complete {
                        break;
                    }
                }

                if complete {
                    break;
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

/// Parse an accumulated tool input buffer into arguments.
///
/// An empty buffer means a tool with no arguments.
fn parse_tool_input(raw: &str) -> serde_json::Value {
    if raw.trim().is_empty() {
        return serde_json::json!({});
    }
    serde_json::from_str(raw).unwrap_or(serde_json::Value::String(raw.to_string()))
}

fn build_anthropic_content(parts: &[ContentPart]) -> serde_json::Value {
    if parts.len() == 1 {
        if let ContentPart::Text { ref text } = parts[0] {
            return serde_json::Value::String(text.clone());
        }
    }

    let mut content: Vec<serde_json::Value> = Vec::new();
    for part in parts {
        match part {
            ContentPart::Text { text } => content.push(serde_json::json!({
                "type": "text",
                "text": text,
            })),
            // Tool results are forwarded as the raw blocks the server
            // produced, spliced into the user content array.
            ContentPart::ToolResult { content: blocks } => {
                content.extend(blocks.iter().cloned());
            }
        }
    }

    serde_json::json!(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ToolDefinition;
    use crate::types::ModelMessage;
    use pretty_assertions::assert_eq;

    fn provider() -> AnthropicProvider {
        AnthropicProvider::new("claude-3-5-sonnet-20241022", "test-key".to_string(), None)
    }

    fn tool_defs() -> Vec<ToolDefinition> {
        vec![ToolDefinition {
            name: "find_files".to_string(),
            description: "Search a directory".to_string(),
            parameters: serde_json::json!({"type": "object", "properties": {}}),
        }]
    }

    #[test]
    fn request_body_maps_single_text_message_to_string_content() {
        let request = ProviderRequest {
            messages: vec![ModelMessage::user("hello")],
            tools: None,
            max_tokens: 1000,
        };
        let body = provider().build_request_body(&request);
        assert_eq!(body["model"], "claude-3-5-sonnet-20241022");
        assert_eq!(body["max_tokens"], 1000);
        assert_eq!(body["stream"], true);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "hello");
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn request_body_includes_tools_on_first_submission() {
        let request = ProviderRequest {
            messages: vec![ModelMessage::user("hello")],
            tools: Some(tool_defs()),
            max_tokens: 1000,
        };
        let body = provider().build_request_body(&request);
        assert_eq!(body["tools"][0]["name"], "find_files");
        assert_eq!(body["tools"][0]["input_schema"]["type"], "object");
    }

    #[test]
    fn request_body_omits_empty_tool_list() {
        let request = ProviderRequest {
            messages: vec![ModelMessage::user("hello")],
            tools: Some(Vec::new()),
            max_tokens: 1000,
        };
        let body = provider().build_request_body(&request);
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn request_body_splices_tool_result_blocks_into_user_content() {
        let blocks = vec![serde_json::json!({"type": "text", "text": "42"})];
        let request = ProviderRequest {
            messages: vec![
                ModelMessage::user("double 21"),
                ModelMessage::assistant("let me check"),
                ModelMessage::tool_result(blocks.clone()),
            ],
            tools: None,
            max_tokens: 1000,
        };
        let body = provider().build_request_body(&request);
        assert_eq!(body["messages"][1]["role"], "assistant");
        assert_eq!(body["messages"][1]["content"], "let me check");
        assert_eq!(body["messages"][2]["role"], "user");
        assert_eq!(body["messages"][2]["content"], serde_json::json!(blocks));
    }

    #[test]
    fn parse_tool_input_handles_empty_and_malformed_buffers() {
        assert_eq!(parse_tool_input(""), serde_json::json!({}));
        assert_eq!(parse_tool_input(r#"{"x":21}"#), serde_json::json!({"x":21}));
        assert_eq!(
            parse_tool_input("{broken"),
            serde_json::Value::String("{broken".to_string())
        );
    }
}
