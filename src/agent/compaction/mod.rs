//! History compaction: once a conversation holds more than `threshold`
//! user/assistant messages, everything before the most recent `keep_recent`
//! of them is replaced by an agent-written summary.

use crate::providers::Agent;
use crate::session::{Conversation, ConversationStore, Message};
use anyhow::{Result, bail};
use tracing::{debug, info};

const SUMMARY_PROMPT: &str = "Summarize the following conversation in 3-4 sentences. \
Preserve names, dates, email addresses, channel names and other identifiers that later \
messages may refer to. Reply with the summary only.\n\n{messages}\n\nSummary:";

/// True iff the conversation holds more than `threshold` user/assistant
/// messages. Tool messages are not counted.
pub fn needs_compaction(conversation: &Conversation, threshold: usize) -> bool {
    conversation.dialogue_count() > threshold
}

/// Index of the first kept message: scanning from the newest backwards,
/// the position at which `keep_recent` user/assistant messages have been
/// seen. Tool messages after that point are kept with them.
pub fn split_point(messages: &[Message], keep_recent: usize) -> usize {
    if keep_recent == 0 {
        return messages.len();
    }
    let mut seen = 0;
    for (i, message) in messages.iter().enumerate().rev() {
        if message.role.is_dialogue() {
            seen += 1;
            if seen == keep_recent {
                return i;
            }
        }
    }
    0
}

fn transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .filter(|m| m.role.is_dialogue())
        .map(|m| format!("{}: {}", m.role.as_str(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Summarize and drop the older part of `conversation`.
///
/// The store is only touched after the agent has produced a non-empty
/// summary; any failure leaves the conversation as it was. Returns `None`
/// when there was nothing to drop or another turn compacted it first.
pub async fn compact(
    store: &ConversationStore,
    agent: &dyn Agent,
    conversation: &Conversation,
    keep_recent: usize,
) -> Result<Option<Conversation>> {
    let split = split_point(&conversation.messages, keep_recent);
    if split == 0 {
        debug!("conversation {} has nothing to compact", conversation.id);
        return Ok(None);
    }

    let prompt = SUMMARY_PROMPT.replace("{messages}", &transcript(&conversation.messages[..split]));
    let summary = agent.run(&prompt).await?;
    let summary = summary.trim();
    if summary.is_empty() {
        bail!("agent returned an empty summary");
    }

    let combined = match conversation.summary.as_deref().map(str::trim) {
        Some(previous) if !previous.is_empty() => format!("{}\n\n{}", previous, summary),
        _ => summary.to_string(),
    };

    let Some(updated) = store.apply_compaction(conversation, split, combined).await? else {
        return Ok(None);
    };
    info!(
        "compacted conversation {}: dropped {} message(s), kept {}",
        conversation.id, split, updated.message_count
    );
    Ok(Some(updated))
}
