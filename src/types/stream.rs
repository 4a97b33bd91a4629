//! Streaming types.

/// A single event in a streamed model turn.
///
/// The model collaborator produces these as a lazy, finite, single-pass
/// sequence terminated by [`StreamEvent::TurnComplete`]. Consuming a stream
/// twice is not supported.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Incremental text content.
    TextDelta { text: String },
    /// A fully assembled tool-use request.
    ToolUse(ToolUseBlock),
    /// The turn is finished; no further events follow.
    TurnComplete,
}

/// A tool-use content block emitted by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolUseBlock {
    /// Raw content-block id assigned by the model API.
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
    /// Accompanying text carried on the block, when the API supplies it.
    pub text: Option<String>,
}
