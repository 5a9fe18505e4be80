//! Prompt assembly.
//!
//! The agent is a plain text-in/text-out process, so the whole conversation
//! is flattened into one prompt: system framing with the tool catalog, the
//! running summary of compacted history, the remaining messages, the new
//! user message and a trailing `Assistant:` cue.

use crate::agent::tools::catalog::{CATALOG, render_instructions};
use crate::agent::tools::parser::{TOOL_CALL_MARKER, TOOL_RESULT_MARKER};
use crate::session::{Conversation, Message, Role};
use std::fmt::Write;

const ROLE_FRAMING: &str = "You are a personal assistant acting on behalf of the user. \
You can read and send email, look at and create calendar events, look up contacts, \
and read and post Slack messages by calling the tools below.";

const PROTOCOL_RULES: &str = r#"To call a tool, write a line of exactly this form:
TOOL_CALL: {"name": "<tool name>", "args": {<arguments>}}

Rules:
- One tool call per line, with nothing else on that line.
- After writing tool calls, stop and wait. Each result comes back as a TOOL_RESULT: line.
- Tools that send or create something need the user's approval and may be rejected.
- When you have what you need, answer the user in plain text with no TOOL_CALL lines."#;

/// Cue that ends every prompt.
pub const CONTINUATION_CUE: &str = "Assistant:";

pub fn system_prompt() -> String {
    let mut out = String::with_capacity(4096);
    out.push_str(ROLE_FRAMING);
    out.push_str("\n\n");
    out.push_str(&render_instructions());

    let gated: Vec<&str> = CATALOG.iter().filter(|t| t.gated).map(|t| t.name).collect();
    let _ = writeln!(out, "\nRequire approval: {}", gated.join(", "));

    out.push('\n');
    out.push_str(PROTOCOL_RULES);
    out
}

fn render_message(message: &Message) -> String {
    match message.role {
        Role::User => format!("User: {}", message.content),
        Role::Assistant => format!("Assistant: {}", message.content),
        Role::ToolCall => format!("{} {}", TOOL_CALL_MARKER, message.content),
        Role::ToolResult => format!("{} {}", TOOL_RESULT_MARKER, message.content),
    }
}

pub fn render_history(messages: &[Message]) -> String {
    messages
        .iter()
        .map(render_message)
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Full prompt for the next agent call. `conversation` must not already
/// contain `new_message`.
pub fn build_prompt(conversation: &Conversation, new_message: &str) -> String {
    let mut out = system_prompt();

    if let Some(summary) = conversation
        .summary
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        let _ = write!(out, "\n\nSummary of the earlier conversation:\n{}", summary);
    }

    if !conversation.messages.is_empty() {
        out.push_str("\n\nConversation so far:\n\n");
        out.push_str(&render_history(&conversation.messages));
    }

    let _ = write!(out, "\n\nUser: {}\n\n{}", new_message, CONTINUATION_CUE);
    out
}

/// Prompt for a short conversation title after the first exchange.
pub fn title_prompt(user_message: &str, assistant_reply: &str) -> String {
    format!(
        "Write a title of at most six words for this conversation. \
Reply with the title only, no quotes or punctuation at the end.\n\n\
User: {}\n\nAssistant: {}\n\nTitle:",
        user_message, assistant_reply
    )
}
