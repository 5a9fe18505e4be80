use crate::agent::tools::backends::{ChatMessage, MessagingBackend};
use anyhow::Result;
use tracing::{debug, warn};

/// Channels requested per membership page.
pub const CHANNEL_PAGE_SIZE: usize = 200;
/// Membership pages scanned before giving up on a name.
pub const MAX_CHANNEL_PAGES: usize = 10;
/// History shorter than this is retried via search.
pub const SPARSE_HISTORY_THRESHOLD: usize = 3;
/// Replies fetched per thread, parent included.
pub const MAX_THREAD_REPLIES: usize = 20;

/// Whether `s` is already a channel id (public, private or DM).
pub fn looks_like_channel_id(s: &str) -> bool {
    s.len() >= 9 && s.starts_with(['C', 'G', 'D'])
}

/// Turn a user-supplied channel reference into a channel id.
///
/// Ids pass through untouched. Names are matched case-insensitively against
/// the user's memberships: an exact match wins immediately, otherwise the
/// first prefix match is used. As a last resort a one-hit message search
/// scoped to the name supplies the id.
pub async fn resolve_channel(backend: &dyn MessagingBackend, raw: &str) -> Result<String> {
    let raw = raw.trim();
    if looks_like_channel_id(raw) {
        return Ok(raw.to_string());
    }

    let name = raw.trim_start_matches('#').to_lowercase();
    if name.is_empty() {
        return Err(anyhow::anyhow!("channel not found: {}", raw));
    }

    let mut fallback: Option<String> = None;
    let mut cursor: Option<String> = None;
    for page_no in 0..MAX_CHANNEL_PAGES {
        let page = backend
            .list_channels(cursor.as_deref(), CHANNEL_PAGE_SIZE)
            .await?;
        for channel in page.channels {
            if channel.is_archived {
                continue;
            }
            let candidate = channel.name.to_lowercase();
            if candidate == name {
                debug!("resolved #{} to {} on page {}", name, channel.id, page_no + 1);
                return Ok(channel.id);
            }
            if fallback.is_none() && candidate.starts_with(&name) {
                fallback = Some(channel.id);
            }
        }
        match page.next_cursor {
            Some(next) if !next.is_empty() => cursor = Some(next),
            _ => break,
        }
    }

    if let Some(id) = fallback {
        debug!("resolved #{} to {} by prefix", name, id);
        return Ok(id);
    }

    match backend.search(&format!("in:#{}", name), 1).await {
        Ok(hits) => {
            if let Some(id) = hits.into_iter().find_map(|m| m.channel_id) {
                debug!("resolved #{} to {} via search", name, id);
                return Ok(id);
            }
        }
        Err(e) => debug!("search fallback for #{} failed: {}", name, e),
    }

    Err(anyhow::anyhow!("channel not found: {}", name))
}

/// Recent messages in a channel with thread replies inlined after their parent.
///
/// Sparse history (some channel types return little or nothing) is retried
/// through search and the larger of the two result sets is kept.
pub async fn fetch_channel_messages(
    backend: &dyn MessagingBackend,
    channel_id: &str,
    limit: usize,
) -> Result<Vec<ChatMessage>> {
    let mut messages = backend.history(channel_id, limit).await?;

    if messages.len() < SPARSE_HISTORY_THRESHOLD {
        match backend.search(&format!("in:<#{}>", channel_id), limit).await {
            Ok(found) if found.len() > messages.len() => {
                debug!(
                    "history for {} had {} message(s), using {} from search",
                    channel_id,
                    messages.len(),
                    found.len()
                );
                messages = found;
            }
            Ok(_) => {}
            Err(e) => debug!("search retry for {} failed: {}", channel_id, e),
        }
    }

    let mut out = Vec::with_capacity(messages.len());
    for msg in messages {
        let is_thread_parent = msg.reply_count > 0
            && msg.thread_ts.as_deref().is_none_or(|ts| ts == msg.ts);
        let ts = msg.ts.clone();
        out.push(msg);
        if !is_thread_parent {
            continue;
        }
        match backend.replies(channel_id, &ts, MAX_THREAD_REPLIES).await {
            Ok(thread) => out.extend(thread.into_iter().skip(1).map(|mut reply| {
                reply.is_reply = true;
                reply
            })),
            Err(e) => warn!("failed to fetch replies for {} in {}: {}", ts, channel_id, e),
        }
    }
    Ok(out)
}
