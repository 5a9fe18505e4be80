use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::time::Instant;

/// A structured invocation extracted from agent output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, args: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// String argument, trimmed. Empty strings count as absent.
    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.args
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Required string argument, with a descriptive error when missing.
    pub fn required_str(&self, key: &str) -> anyhow::Result<&str> {
        self.str_arg(key)
            .ok_or_else(|| anyhow::anyhow!("missing required argument: {}", key))
    }

    /// Optional string argument, defaulting to empty.
    pub fn optional_str(&self, key: &str) -> &str {
        self.str_arg(key).unwrap_or("")
    }

    /// Numeric argument coerced to a count.
    ///
    /// Agents emit JSON numbers as floats and sometimes quote them. Absent,
    /// unparseable or non-positive values take `default`; the result is capped
    /// at `max`.
    pub fn limit_arg(&self, key: &str, default: usize, max: usize) -> usize {
        let raw = match self.args.get(key) {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        match raw {
            Some(v) if v.is_finite() && v >= 1.0 => (v.floor() as usize).min(max),
            _ => default,
        }
    }
}

/// Outcome of one tool execution. Exactly one of `data` / `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok(tool: impl Into<String>, data: Value) -> Self {
        Self {
            tool: tool.into(),
            data: Some(data),
            error: None,
        }
    }

    pub fn error(tool: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            data: None,
            error: Some(error.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Per-call context handed to the executor.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub conversation_id: String,
    /// Backend calls still running at this instant are abandoned.
    pub deadline: Instant,
}

impl ExecutionContext {
    pub fn new(conversation_id: impl Into<String>, deadline: Instant) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            deadline,
        }
    }
}
