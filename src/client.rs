//! Top-level orchestration client.
//!
//! Owns the session registry and the model provider, and exposes the
//! connect / ask / shutdown surface the CLI drives.

use std::path::Path;

use crate::engine::run_turn;
use crate::error::Result;
use crate::provider::ModelProvider;
use crate::registry::{SessionId, SessionRegistry};

pub struct OrchestrationClient {
    registry: SessionRegistry,
    provider: Box<dyn ModelProvider>,
    max_tokens: u32,
}

impl OrchestrationClient {
    pub fn new(provider: Box<dyn ModelProvider>, max_tokens: u32) -> Self {
        Self {
            registry: SessionRegistry::new(),
            provider,
            max_tokens,
        }
    }

    /// Connect to the MCP server launched from `script`, returning its
    /// assigned session id.
    pub async fn connect(&mut self, script: &Path) -> Result<SessionId> {
        self.registry.connect(script).await
    }

    /// Tool names registered for `id`, in listing order.
    pub fn tool_names(&self, id: &SessionId) -> Option<Vec<String>> {
        self.registry.tool_names(id)
    }

    /// Run one query through the model, invoking tools as requested.
    ///
    /// Each transcript starts fresh: no history carries across calls.
    /// `on_chunk` receives every text fragment as it streams in.
    pub async fn ask(
        &mut self,
        query: &str,
        on_chunk: &mut (dyn FnMut(&str) + Send),
    ) -> Result<String> {
        run_turn(
            self.provider.as_ref(),
            &mut self.registry,
            query,
            self.max_tokens,
            on_chunk,
        )
        .await
    }

    /// Release all sessions, newest first.
    pub async fn shutdown(&mut self) {
        self.registry.shutdown().await;
    }
}
