use super::ConversationCommands;
use crate::agent::{ApprovalDecision, TurnEvent, TurnRequest};
use crate::config::Config;
use crate::session::{Conversation, ConversationStore, ConversationSummary, Role};
use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::fmt::Write;
use std::path::Path;
use tokio::sync::mpsc;

const TERMINAL_REJECT_REASON: &str = "declined at the terminal";

pub(super) async fn ask(
    config: &Config,
    message: String,
    conversation_id: Option<String>,
    agent: Option<String>,
    auto_approve: bool,
) -> Result<()> {
    let runner = super::build_runner(config)?;
    let (tx, mut rx) = mpsc::channel(64);
    let request = TurnRequest {
        message,
        conversation_id,
        agent,
    };
    let turn_runner = runner.clone();
    let turn = tokio::spawn(async move { turn_runner.run_turn(request, tx).await });

    while let Some(event) = rx.recv().await {
        match &event {
            TurnEvent::ApprovalRequired {
                approval_id,
                tool,
                preview,
            } => {
                eprintln!("{}", describe_approval(tool, preview));
                let approved = auto_approve || confirm().await?;
                let decision = if approved {
                    ApprovalDecision::approve(None)
                } else {
                    ApprovalDecision::reject(Some(TERMINAL_REJECT_REASON.to_string()))
                };
                runner.approvals().resolve(approval_id, decision);
            }
            TurnEvent::Message { content } => println!("\u{1f500} {}", content),
            TurnEvent::Done {
                conversation_id, ..
            } => eprintln!("conversation: {}", conversation_id),
            other => {
                if let Some(line) = describe_event(other) {
                    eprintln!("{}", line);
                }
            }
        }
    }

    turn.await.context("turn task failed")??;
    Ok(())
}

/// Ask on stdin whether to go ahead. Anything but y/yes declines.
async fn confirm() -> Result<bool> {
    eprint!("Approve? (y/N): ");
    let answer = tokio::task::spawn_blocking(|| {
        let mut input = String::new();
        std::io::stdin().read_line(&mut input).map(|_| input)
    })
    .await
    .context("stdin reader failed")??;
    let answer = answer.trim().to_ascii_lowercase();
    Ok(answer == "y" || answer == "yes")
}

fn describe_approval(tool: &str, preview: &Map<String, Value>) -> String {
    let mut out = format!("\u{26a0}\u{fe0f}  {} needs approval", tool);
    for (key, value) in preview {
        let shown = value.as_str().map_or_else(|| value.to_string(), ToString::to_string);
        let _ = write!(out, "\n    {}: {}", key, shown);
    }
    out
}

/// One progress line for the terminal, or `None` for events not worth showing.
pub(super) fn describe_event(event: &TurnEvent) -> Option<String> {
    match event {
        TurnEvent::ToolCall { name, args } => Some(format!(
            "\u{2192} {} {}",
            name,
            Value::Object(args.clone())
        )),
        TurnEvent::ToolResult {
            name,
            error: Some(error),
            ..
        } => Some(format!("\u{2717} {}: {}", name, error)),
        TurnEvent::ToolResult { name, .. } => Some(format!("\u{2713} {}", name)),
        TurnEvent::ApprovalResolved {
            approved, reason, ..
        } => Some(match (approved, reason) {
            (true, _) => "approved".to_string(),
            (false, Some(reason)) => format!("rejected: {}", reason),
            (false, None) => "rejected".to_string(),
        }),
        TurnEvent::Error { error } => Some(format!("error: {}", error)),
        _ => None,
    }
}

pub(super) async fn conversations_command(config: &Config, cmd: ConversationCommands) -> Result<()> {
    let store = ConversationStore::new(config.conversations_dir()?)?;
    match cmd {
        ConversationCommands::List => {
            let list = store.list().await?;
            print!("{}", render_list(&list));
        }
        ConversationCommands::Show { id } => match store.get(&id).await? {
            Some(conversation) => print!("{}", render_transcript(&conversation)),
            None => anyhow::bail!("conversation not found: {}", id),
        },
        ConversationCommands::Delete { id } => {
            if store.delete(&id).await? {
                println!("\u{2713} Deleted {}", id);
            } else {
                anyhow::bail!("conversation not found: {}", id);
            }
        }
    }
    Ok(())
}

pub(super) fn render_list(list: &[ConversationSummary]) -> String {
    if list.is_empty() {
        return "No conversations.\n".to_string();
    }
    let mut out = String::new();
    for c in list {
        let title = if c.title.is_empty() {
            "(untitled)"
        } else {
            &c.title
        };
        let _ = writeln!(
            out,
            "{}  {}  {:>3} msgs  [{}]  {}",
            c.id,
            c.updated_at.format("%Y-%m-%d %H:%M"),
            c.message_count,
            c.agent,
            title
        );
    }
    out
}

pub(super) fn render_transcript(conversation: &Conversation) -> String {
    let mut out = String::new();
    let title = if conversation.title.is_empty() {
        "(untitled)"
    } else {
        &conversation.title
    };
    let _ = writeln!(out, "# {} ({})", title, conversation.id);
    let _ = writeln!(out, "agent: {}", conversation.agent);
    if let Some(summary) = &conversation.summary {
        let _ = writeln!(out, "\n[summary] {}", summary);
    }
    for message in &conversation.messages {
        let label = match (message.role, &message.tool) {
            (Role::ToolCall | Role::ToolResult, Some(tool)) => {
                format!("{} {}", message.role.as_str(), tool)
            }
            _ => message.role.as_str().to_string(),
        };
        let _ = writeln!(out, "\n[{}] {}", label, message.content);
    }
    out
}

pub(super) async fn status_command(config: &Config, config_path: Option<&Path>) -> Result<()> {
    let config_path = match config_path {
        Some(p) => p.to_path_buf(),
        None => crate::config::get_config_path()?,
    };
    let conversations = config.conversations_dir()?;

    println!("\u{1f500} switchboard Status\n");
    println!(
        "Config: {} {}",
        config_path.display(),
        if config_path.exists() {
            "\u{2713}"
        } else {
            "\u{2717}"
        }
    );

    let mut agents: Vec<_> = config.agents.definitions.keys().cloned().collect();
    agents.sort();
    println!("Default agent: {}", config.agents.default);
    println!("Agents: {}", agents.join(", "));

    let executor = crate::agent::tools::build_executor(&config.tools);
    for backend in ["email", "calendar", "contacts", "slack"] {
        println!(
            "{}: {}",
            backend,
            if executor.configured_backends().contains(&backend) {
                "\u{2713}"
            } else {
                "not configured"
            }
        );
    }

    let count = ConversationStore::new(&conversations)?.list().await?.len();
    println!("Conversations: {} in {}", count, conversations.display());
    Ok(())
}
