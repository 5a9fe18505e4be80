//! Slash commands: quick lookups that run a tool directly, without the agent.

use crate::agent::TurnRunner;
use crate::agent::tools::catalog::{LIST_EVENTS, SEARCH_CONTACTS, SEARCH_EMAIL};
use crate::agent::tools::{ExecutionContext, ToolCall};
use serde_json::{Map, Value, json};
use std::fmt::Write;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);
const COMMAND_CONVERSATION: &str = "slash-command";

pub const HELP: &str = "Commands:
  /status            active agent, backends and pending approvals
  /email <query>     search email
  /calendar [days]   upcoming events (default 7 days)
  /contacts <query>  search contacts
  /help              this list";

#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    #[error("unknown command: {0}")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
}

/// Run `name` (with or without a leading `/`) and render its output as text.
pub async fn run_command(
    runner: &TurnRunner,
    name: &str,
    args: &str,
) -> Result<String, CommandError> {
    let args = args.trim();
    match name.trim().trim_start_matches('/') {
        "status" => Ok(status(runner).await),
        "help" => Ok(HELP.to_string()),
        "email" => {
            if args.is_empty() {
                return Err(CommandError::Usage("/email <query>"));
            }
            let data = run_tool(runner, SEARCH_EMAIL, json!({"query": args})).await;
            Ok(data.map_or_else(|e| e, |d| format_emails(&d)))
        }
        "calendar" => {
            let mut call_args = json!({});
            if !args.is_empty() {
                let days: u32 = args
                    .parse()
                    .map_err(|_| CommandError::Usage("/calendar [days]"))?;
                call_args["days"] = json!(days);
            }
            let data = run_tool(runner, LIST_EVENTS, call_args).await;
            Ok(data.map_or_else(|e| e, |d| format_events(&d)))
        }
        "contacts" => {
            if args.is_empty() {
                return Err(CommandError::Usage("/contacts <query>"));
            }
            let data = run_tool(runner, SEARCH_CONTACTS, json!({"query": args})).await;
            Ok(data.map_or_else(|e| e, |d| format_contacts(&d)))
        }
        other => Err(CommandError::Unknown(other.to_string())),
    }
}

/// Tool data on success, or a printable error line.
async fn run_tool(runner: &TurnRunner, tool: &str, args: Value) -> Result<Value, String> {
    let ctx = ExecutionContext::new(COMMAND_CONVERSATION, Instant::now() + COMMAND_TIMEOUT);
    let args: Map<String, Value> = args.as_object().cloned().unwrap_or_default();
    let result = runner
        .executor()
        .execute(&ctx, &ToolCall::new(tool, args))
        .await;
    match (result.data, result.error) {
        (_, Some(error)) => Err(format!("error: {}", error)),
        (Some(data), None) => Ok(data),
        (None, None) => Ok(Value::Null),
    }
}

async fn status(runner: &TurnRunner) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Agent: {}", runner.agents().active_name());
    let _ = writeln!(out, "Available agents: {}", runner.agents().names().join(", "));
    let backends = runner.executor().configured_backends();
    let _ = writeln!(
        out,
        "Backends: {}",
        if backends.is_empty() {
            "none".to_string()
        } else {
            backends.join(", ")
        }
    );
    let _ = writeln!(out, "Pending approvals: {}", runner.approvals().pending().len());
    match runner.store().list().await {
        Ok(list) => {
            let _ = write!(out, "Conversations: {}", list.len());
        }
        Err(e) => {
            let _ = write!(out, "Conversations: unavailable ({:#})", e);
        }
    }
    out
}

fn s<'a>(v: &'a Value, key: &str) -> &'a str {
    v[key].as_str().unwrap_or_default()
}

fn format_emails(data: &Value) -> String {
    let messages = data["messages"].as_array().cloned().unwrap_or_default();
    if messages.is_empty() {
        return "No matching email.".to_string();
    }
    let mut out = format!("{} message(s):", messages.len());
    for m in &messages {
        let _ = write!(
            out,
            "\n- {} | {} | {} [{}]",
            s(m, "date"),
            s(m, "from"),
            s(m, "subject"),
            s(m, "id")
        );
    }
    out
}

fn format_events(data: &Value) -> String {
    let events = data["events"].as_array().cloned().unwrap_or_default();
    if events.is_empty() {
        return "No upcoming events.".to_string();
    }
    let mut out = format!("{} event(s):", events.len());
    for e in &events {
        let _ = write!(out, "\n- {} to {}: {}", s(e, "start"), s(e, "end"), s(e, "title"));
        if !s(e, "location").is_empty() {
            let _ = write!(out, " @ {}", s(e, "location"));
        }
    }
    out
}

fn format_contacts(data: &Value) -> String {
    let contacts = data["contacts"].as_array().cloned().unwrap_or_default();
    if contacts.is_empty() {
        return "No matching contacts.".to_string();
    }
    let mut out = format!("{} contact(s):", contacts.len());
    for c in &contacts {
        let join = |key: &str| {
            c[key]
                .as_array()
                .map(|a| a.iter().filter_map(Value::as_str).collect::<Vec<_>>().join(", "))
                .unwrap_or_default()
        };
        let _ = write!(out, "\n- {}", s(c, "name"));
        let emails = join("emails");
        if !emails.is_empty() {
            let _ = write!(out, " <{}>", emails);
        }
        let phones = join("phones");
        if !phones.is_empty() {
            let _ = write!(out, " {}", phones);
        }
    }
    out
}
