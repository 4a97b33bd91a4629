//! Model provider trait and implementations.

pub mod anthropic;
pub mod http;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::Result;
use crate::types::{ModelMessage, StreamEvent};

/// A request sent to a model provider.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub messages: Vec<ModelMessage>,
    /// Tool catalog offered for this submission. `None` on continuation
    /// calls that follow a tool-dispatch round.
    pub tools: Option<Vec<ToolDefinition>>,
    pub max_tokens: u32,
}

/// Tool definition sent to the provider API.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Core trait implemented by model providers.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Provider name (e.g., "anthropic").
    fn provider_name(&self) -> &str;

    /// The model ID this provider instance serves.
    fn model_id(&self) -> &str;

    /// Submit a transcript and stream back the model's turn.
    async fn stream_turn(
        &self,
        request: &ProviderRequest,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>>;
}
