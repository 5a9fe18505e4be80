//! File-per-conversation store.
//!
//! Each conversation is one JSON document at `<dir>/<id>.json`, replaced
//! atomically on every write. A single async mutex serializes every
//! read-modify-write, so readers never observe a half-applied update.

use crate::errors::SwitchboardError;
use crate::session::conversation::{Conversation, ConversationSummary, Message};
use crate::utils::{atomic_write, ensure_dir};
use anyhow::{Context, Result};
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub struct ConversationStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl ConversationStore {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            dir: ensure_dir(dir)?,
            lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn create(&self, agent: &str) -> Result<Conversation> {
        let _guard = self.lock.lock().await;
        let conversation = Conversation::new(agent);
        self.write(&conversation)?;
        info!("created conversation {}", conversation.id);
        Ok(conversation)
    }

    /// `None` when the id is unknown, malformed, or the record is unreadable.
    pub async fn get(&self, id: &str) -> Result<Option<Conversation>> {
        let _guard = self.lock.lock().await;
        self.read(id)
    }

    /// Conversation summaries, most recently updated first. Unreadable
    /// records are skipped.
    pub async fn list(&self) -> Result<Vec<ConversationSummary>> {
        let _guard = self.lock.lock().await;
        let entries = fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to read {}", self.dir.display()))?;

        let mut out = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match load_file(&path) {
                Ok(c) => out.push(c.summary_view()),
                Err(e) => warn!("skipping unreadable conversation {}: {:#}", path.display(), e),
            }
        }
        out.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(out)
    }

    /// Returns false if there was nothing to delete.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let Some(path) = self.path_for(id) else {
            return Ok(false);
        };
        match fs::remove_file(&path) {
            Ok(()) => {
                info!("deleted conversation {}", id);
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("Failed to delete {}", path.display())),
        }
    }

    pub async fn append_message(&self, id: &str, message: Message) -> Result<Conversation> {
        self.update(id, |c| c.push(message)).await
    }

    /// Append to `id`, or to a fresh conversation tagged with `agent` when
    /// no id is given or the id is unknown.
    pub async fn append_or_create(
        &self,
        id: Option<&str>,
        agent: &str,
        message: Message,
    ) -> Result<Conversation> {
        let _guard = self.lock.lock().await;
        let mut conversation = match id {
            Some(id) => match self.read(id)? {
                Some(c) => c,
                None => {
                    debug!("conversation {} not found, starting a new one", id);
                    Conversation::new(agent)
                }
            },
            None => Conversation::new(agent),
        };
        conversation.push(message);
        self.write(&conversation)?;
        Ok(conversation)
    }

    pub async fn set_title(&self, id: &str, title: &str) -> Result<Conversation> {
        let title = title.trim().to_string();
        self.update(id, |c| {
            c.title = title;
            c.updated_at = Utc::now();
        })
        .await
    }

    /// Replace the oldest `dropped` messages of `snapshot` with `summary`.
    ///
    /// Counting from the front keeps messages appended after the snapshot
    /// was taken. Returns `None` without writing when the stored record was
    /// compacted since the snapshot, so two turns compacting the same
    /// snapshot drop its prefix only once.
    pub async fn apply_compaction(
        &self,
        snapshot: &Conversation,
        dropped: usize,
        summary: String,
    ) -> Result<Option<Conversation>> {
        let applied = self
            .try_update(&snapshot.id, |c| {
                if !shares_prefix(c, snapshot) || c.messages.len() < dropped {
                    return false;
                }
                c.messages.drain(..dropped);
                c.message_count = c.messages.len();
                c.summary = Some(summary);
                let now = Utc::now();
                c.compacted_at = Some(now);
                c.updated_at = now;
                true
            })
            .await?;
        if applied.is_none() {
            debug!(
                "conversation {} changed since the compaction snapshot, skipping",
                snapshot.id
            );
        }
        Ok(applied)
    }

    async fn update(
        &self,
        id: &str,
        apply: impl FnOnce(&mut Conversation),
    ) -> Result<Conversation> {
        let updated = self
            .try_update(id, |c| {
                apply(c);
                true
            })
            .await?;
        updated.ok_or_else(|| anyhow::anyhow!("update of conversation {} was skipped", id))
    }

    /// Read, modify and write under the store lock. Nothing is written
    /// when `apply` returns false.
    async fn try_update(
        &self,
        id: &str,
        apply: impl FnOnce(&mut Conversation) -> bool,
    ) -> Result<Option<Conversation>> {
        let _guard = self.lock.lock().await;
        let mut conversation = self
            .read(id)?
            .ok_or_else(|| SwitchboardError::NotFound(format!("conversation {}", id)))?;
        if !apply(&mut conversation) {
            return Ok(None);
        }
        self.write(&conversation)?;
        Ok(Some(conversation))
    }

    fn read(&self, id: &str) -> Result<Option<Conversation>> {
        let Some(path) = self.path_for(id) else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        match load_file(&path) {
            Ok(c) => Ok(Some(c)),
            Err(e) => {
                warn!("conversation {} is unreadable: {:#}", id, e);
                Ok(None)
            }
        }
    }

    fn write(&self, conversation: &Conversation) -> Result<()> {
        let path = self
            .path_for(&conversation.id)
            .ok_or_else(|| SwitchboardError::Store(format!("invalid id {}", conversation.id)))?;
        let json = serde_json::to_string_pretty(conversation)?;
        atomic_write(&path, &json)
            .map_err(|e| SwitchboardError::Store(format!("{:#}", e)).into())
    }

    /// Ids are generated UUIDs; anything that could escape the directory is rejected.
    fn path_for(&self, id: &str) -> Option<PathBuf> {
        let valid = !id.is_empty()
            && id.len() <= 64
            && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        valid.then(|| self.dir.join(format!("{}.json", id)))
    }
}

/// The stored record has not been compacted since `snapshot` was read.
fn shares_prefix(stored: &Conversation, snapshot: &Conversation) -> bool {
    stored.compacted_at == snapshot.compacted_at
        && stored.messages.first().map(|m| m.timestamp)
            == snapshot.messages.first().map(|m| m.timestamp)
}

fn load_file(path: &Path) -> Result<Conversation> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let mut conversation: Conversation =
        serde_json::from_str(&content).context("Failed to parse conversation JSON")?;
    conversation.message_count = conversation.messages.len();
    Ok(conversation)
}
