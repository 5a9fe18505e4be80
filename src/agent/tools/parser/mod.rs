use crate::agent::tools::base::{ToolCall, ToolResult};
use serde_json::{Map, Value};
use tracing::warn;

/// Line prefix the agent uses to request a tool.
pub const TOOL_CALL_MARKER: &str = "TOOL_CALL:";
/// Line prefix used when feeding results back to the agent.
pub const TOOL_RESULT_MARKER: &str = "TOOL_RESULT:";

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedOutput {
    /// Calls in the order they appeared.
    pub calls: Vec<ToolCall>,
    /// Everything that was not a well-formed call line.
    pub text: String,
}

/// Split agent output into tool calls and remaining prose.
///
/// A line whose trimmed form starts with `TOOL_CALL:` is parsed as JSON after
/// the marker. Well-formed lines become calls and are removed from the text;
/// malformed ones stay in the text untouched. Never fails.
pub fn parse(output: &str) -> ParsedOutput {
    let mut calls = Vec::new();
    let mut kept = Vec::new();

    for line in output.lines() {
        let trimmed = line.trim();
        if let Some(payload) = trimmed.strip_prefix(TOOL_CALL_MARKER)
            && let Some(call) = parse_payload(payload.trim())
        {
            calls.push(call);
            continue;
        }
        kept.push(line);
    }

    ParsedOutput {
        calls,
        text: kept.join("\n").trim().to_string(),
    }
}

/// Accepts `{"name": ..., "args": {...}}` with `tool` / `arguments` as aliases.
fn parse_payload(payload: &str) -> Option<ToolCall> {
    let parsed: Value = match serde_json::from_str(payload) {
        Ok(v) => v,
        Err(e) => {
            warn!("malformed tool call line, keeping as text: {e}");
            return None;
        }
    };

    let name = parsed
        .get("name")
        .or_else(|| parsed.get("tool"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|n| !n.is_empty())?
        .to_string();

    let args = match parsed.get("args").or_else(|| parsed.get("arguments")) {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map.clone(),
        Some(other) => {
            warn!("tool call '{name}' has non-object args ({other}), keeping as text");
            return None;
        }
    };

    Some(ToolCall { name, args })
}

/// Render a call the way the agent is taught to write it.
pub fn format_call(call: &ToolCall) -> String {
    let payload = serde_json::json!({"name": call.name, "args": call.args});
    format!("{} {}", TOOL_CALL_MARKER, payload)
}

/// Render a result line fed back to the agent.
pub fn format_result(result: &ToolResult) -> String {
    let payload = serde_json::to_string(result).unwrap_or_else(|_| "{}".to_string());
    format!("{} {}", TOOL_RESULT_MARKER, payload)
}
