//! Session registry: owns connected MCP server sessions.

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::{Result, SwitchboardError};
use crate::mcp::{McpSession, ToolCallOutcome, ToolDescriptor};

/// Process-unique identifier for a connected session.
///
/// Assigned in connection order (`server_1`, `server_2`, ...). The index is
/// monotonic and never reused, even when a connect attempt fails after
/// classification.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Executable kind of a server endpoint, classified by file suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerKind {
    Python,
    Node,
}

impl ServerKind {
    /// Classify a server script path. Anything that is not a `.py` or `.js`
    /// file is a configuration error, raised before any spawn attempt.
    pub fn classify(script: &Path) -> Result<Self> {
        match script.extension().and_then(|e| e.to_str()) {
            Some("py") => Ok(Self::Python),
            Some("js") => Ok(Self::Node),
            _ => Err(SwitchboardError::Configuration(
                "Server script must be a .py or .js file".into(),
            )),
        }
    }

    /// Interpreter used to launch the script.
    pub fn command(&self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Node => "node",
        }
    }
}

/// Session-side operations the registry and turn engine need.
///
/// [`McpSession`] is the production implementation; tests substitute fakes.
#[async_trait]
pub trait ToolSession: Send {
    async fn call_tool(
        &mut self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolCallOutcome>;

    async fn close(&mut self) -> Result<()>;
}

struct SessionEntry {
    id: SessionId,
    session: Box<dyn ToolSession>,
    tools: Vec<ToolDescriptor>,
}

/// Owns the set of active sessions, in registration order, together with
/// each session's advertised tool snapshot.
#[derive(Default)]
pub struct SessionRegistry {
    entries: Vec<SessionEntry>,
    connect_seq: u64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Launch the given server script, perform the handshake, fetch its
    /// tool list, and register it.
    ///
    /// Registration is all-or-nothing: a failure at any step after
    /// classification leaves the registry unchanged (the allocated id is
    /// consumed, never reused).
    pub async fn connect(&mut self, script: &Path) -> Result<SessionId> {
        let kind = ServerKind::classify(script)?;
        let id = self.allocate_id();

        let session = McpSession::launch(kind, script).await?;
        let tools = session.list_tools().await?;

        info!(
            session = %id,
            script = %script.display(),
            tools = ?tools.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
            "connected to MCP server"
        );

        self.entries.push(SessionEntry {
            id: id.clone(),
            session: Box::new(session),
            tools,
        });
        Ok(id)
    }

    /// Release every registered session, in reverse registration order.
    ///
    /// Best-effort: an individual release failure is logged and the
    /// remaining sessions are still released.
    pub async fn shutdown(&mut self) {
        while let Some(mut entry) = self.entries.pop() {
            if let Err(e) = entry.session.close().await {
                warn!(session = %entry.id, error = %e, "failed to close MCP session");
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterate sessions in registration order with their tool snapshots.
    pub fn iter(&self) -> impl Iterator<Item = (&SessionId, &[ToolDescriptor])> {
        self.entries
            .iter()
            .map(|entry| (&entry.id, entry.tools.as_slice()))
    }

    /// Names of the tools a session advertised at connect time.
    pub fn tool_names(&self, id: &SessionId) -> Option<Vec<String>> {
        self.entries
            .iter()
            .find(|entry| &entry.id == id)
            .map(|entry| entry.tools.iter().map(|t| t.name.clone()).collect())
    }

    pub(crate) fn session_mut<'a>(&'a mut self, id: &SessionId) -> Option<&'a mut (dyn ToolSession + 'a)> {
        self.entries
            .iter_mut()
            .find(|entry| &entry.id == id)
            .map(|entry| &mut *entry.session as &mut dyn ToolSession)
    }

    fn allocate_id(&mut self) -> SessionId {
        self.connect_seq += 1;
        SessionId(format!("server_{}", self.connect_seq))
    }

    /// Register a pre-built session, following the same id-assignment path
    /// as `connect`.
    #[cfg(test)]
    pub(crate) fn register(
        &mut self,
        session: Box<dyn ToolSession>,
        tools: Vec<ToolDescriptor>,
    ) -> SessionId {
        let id = self.allocate_id();
        self.entries.push(SessionEntry {
            id: id.clone(),
            session,
            tools,
        });
        id
    }

    /// Consume an id without registering, simulating a connect attempt that
    /// fails after classification.
    #[cfg(test)]
    pub(crate) fn fail_connect(&mut self) -> SessionId {
        self.allocate_id()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::{Arc, Mutex};

    use super::*;

    /// Recording fake session for registry/router/engine tests.
    pub(crate) struct FakeSession {
        pub calls: Arc<Mutex<Vec<(String, serde_json::Value)>>>,
        pub results: Mutex<std::collections::VecDeque<Result<ToolCallOutcome>>>,
        pub closed: Arc<Mutex<bool>>,
        pub close_error: Option<String>,
    }

    impl FakeSession {
        pub(crate) fn new(results: Vec<Result<ToolCallOutcome>>) -> Self {
            Self {
                calls: Arc::new(Mutex::new(Vec::new())),
                results: Mutex::new(results.into()),
                closed: Arc::new(Mutex::new(false)),
                close_error: None,
            }
        }

        pub(crate) fn text_outcome(text: &str) -> ToolCallOutcome {
            ToolCallOutcome {
                text_content: Some(text.to_string()),
                content: vec![serde_json::json!({"type": "text", "text": text})],
            }
        }
    }

    #[async_trait]
    impl ToolSession for FakeSession {
        async fn call_tool(
            &mut self,
            name: &str,
            arguments: serde_json::Value,
        ) -> Result<ToolCallOutcome> {
            self.calls
                .lock()
                .expect("calls lock")
                .push((name.to_string(), arguments));
            self.results
                .lock()
                .expect("results lock")
                .pop_front()
                .unwrap_or_else(|| {
                    Err(SwitchboardError::Stream("missing fake call result".into()))
                })
        }

        async fn close(&mut self) -> Result<()> {
            *self.closed.lock().expect("closed lock") = true;
            match &self.close_error {
                Some(message) => Err(SwitchboardError::Stream(message.clone())),
                None => Ok(()),
            }
        }
    }

    pub(crate) fn descriptor(name: &str) -> ToolDescriptor {
        ToolDescriptor {
            name: name.to_string(),
            description: format!("{name} tool"),
            input_schema: serde_json::json!({"type": "object", "properties": {}}),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{descriptor, FakeSession};
    use super::*;

    #[test]
    fn classify_accepts_py_and_js_only() {
        assert_eq!(
            ServerKind::classify(Path::new("server.py")).unwrap(),
            ServerKind::Python
        );
        assert_eq!(
            ServerKind::classify(Path::new("dir/server.js")).unwrap(),
            ServerKind::Node
        );
        let err = ServerKind::classify(Path::new("server.sh")).unwrap_err();
        assert!(matches!(
            err,
            SwitchboardError::Configuration(message)
            if message == "Server script must be a .py or .js file"
        ));
        assert!(ServerKind::classify(Path::new("server")).is_err());
    }

    #[test]
    fn server_kind_selects_interpreter() {
        assert_eq!(ServerKind::Python.command(), "python");
        assert_eq!(ServerKind::Node.command(), "node");
    }

    #[test]
    fn session_ids_ascend_in_registration_order() {
        let mut registry = SessionRegistry::new();
        let a = registry.register(Box::new(FakeSession::new(Vec::new())), Vec::new());
        let b = registry.register(Box::new(FakeSession::new(Vec::new())), Vec::new());
        assert_eq!(a.as_str(), "server_1");
        assert_eq!(b.as_str(), "server_2");
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn failed_connect_consumes_an_id_without_registering() {
        let mut registry = SessionRegistry::new();
        let a = registry.register(Box::new(FakeSession::new(Vec::new())), Vec::new());
        let failed = registry.fail_connect();
        let c = registry.register(Box::new(FakeSession::new(Vec::new())), Vec::new());

        assert_eq!(a.as_str(), "server_1");
        assert_eq!(failed.as_str(), "server_2");
        assert_eq!(c.as_str(), "server_3");
        // The failed id is consumed but nothing was registered for it.
        assert_eq!(registry.len(), 2);
        assert!(registry.tool_names(&failed).is_none());
    }

    #[test]
    fn tool_names_reports_connect_time_snapshot() {
        let mut registry = SessionRegistry::new();
        let id = registry.register(
            Box::new(FakeSession::new(Vec::new())),
            vec![descriptor("find_files"), descriptor("search_file_content")],
        );
        assert_eq!(
            registry.tool_names(&id).unwrap(),
            vec!["find_files", "search_file_content"]
        );
    }

    #[tokio::test]
    async fn shutdown_releases_all_sessions_despite_individual_failures() {
        let mut registry = SessionRegistry::new();

        let mut failing = FakeSession::new(Vec::new());
        failing.close_error = Some("pipe already closed".into());
        let failing_flag = failing.closed.clone();

        let ok = FakeSession::new(Vec::new());
        let ok_flag = ok.closed.clone();

        registry.register(Box::new(ok), Vec::new());
        registry.register(Box::new(failing), Vec::new());

        registry.shutdown().await;

        assert!(registry.is_empty());
        assert!(*failing_flag.lock().unwrap());
        assert!(*ok_flag.lock().unwrap());
    }

    #[tokio::test]
    async fn ids_are_not_reused_after_shutdown() {
        let mut registry = SessionRegistry::new();
        registry.register(Box::new(FakeSession::new(Vec::new())), Vec::new());
        registry.shutdown().await;
        let next = registry.register(Box::new(FakeSession::new(Vec::new())), Vec::new());
        assert_eq!(next.as_str(), "server_2");
    }

    #[tokio::test]
    async fn connect_rejects_unknown_suffix_before_spawning() {
        let mut registry = SessionRegistry::new();
        let err = registry
            .connect(Path::new("not-a-server.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, SwitchboardError::Configuration(_)));
        assert!(registry.is_empty());
        // Classification failure happens before id allocation.
        let id = registry.register(Box::new(FakeSession::new(Vec::new())), Vec::new());
        assert_eq!(id.as_str(), "server_1");
    }
}
