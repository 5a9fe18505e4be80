use serde_json::{Map, Value, json};

/// Progress of one turn, delivered to the client as named SSE events.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    Thinking,
    Token {
        text: String,
    },
    /// The streamed tokens were the final answer.
    StreamEnd,
    /// The streamed tokens contained tool calls and should not be shown.
    StreamDiscard,
    ToolCall {
        name: String,
        args: Map<String, Value>,
    },
    ToolResult {
        name: String,
        data: Option<Value>,
        error: Option<String>,
    },
    ApprovalRequired {
        approval_id: String,
        tool: String,
        preview: Map<String, Value>,
    },
    ApprovalResolved {
        approval_id: String,
        approved: bool,
        reason: Option<String>,
    },
    Message {
        content: String,
    },
    Error {
        error: String,
    },
    Done {
        conversation_id: String,
        title: Option<String>,
    },
}

impl TurnEvent {
    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Thinking => "thinking",
            Self::Token { .. } => "token",
            Self::StreamEnd => "stream_end",
            Self::StreamDiscard => "stream_discard",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResult { .. } => "tool_result",
            Self::ApprovalRequired { .. } => "approval_required",
            Self::ApprovalResolved { .. } => "approval_resolved",
            Self::Message { .. } => "message",
            Self::Error { .. } => "error",
            Self::Done { .. } => "done",
        }
    }

    /// JSON body of the SSE `data:` field.
    pub fn payload(&self) -> Value {
        match self {
            Self::Thinking | Self::StreamEnd | Self::StreamDiscard => json!({}),
            Self::Token { text } => json!({"text": text}),
            Self::ToolCall { name, args } => json!({"name": name, "args": args}),
            Self::ToolResult { name, data, error } => {
                json!({"name": name, "data": data, "error": error})
            }
            Self::ApprovalRequired {
                approval_id,
                tool,
                preview,
            } => json!({"approval_id": approval_id, "tool": tool, "preview": preview}),
            Self::ApprovalResolved {
                approval_id,
                approved,
                reason,
            } => json!({"approval_id": approval_id, "approved": approved, "reason": reason}),
            Self::Message { content } => json!({"content": content}),
            Self::Error { error } => json!({"error": error}),
            Self::Done {
                conversation_id,
                title,
            } => json!({"conversation_id": conversation_id, "title": title}),
        }
    }
}
