//! Capability traits for the external services tools talk to.
//!
//! Handlers in the executor only see these traits, so tests substitute
//! in-memory fakes and the Google/Slack clients stay thin.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EmailSummary {
    pub id: String,
    pub thread_id: String,
    pub from: String,
    pub subject: String,
    pub date: String,
    pub snippet: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Email {
    pub id: String,
    pub thread_id: String,
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cc: String,
    pub subject: String,
    pub date: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct OutgoingEmail {
    pub to: String,
    pub cc: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub start: String,
    pub end: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub location: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attendees: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub link: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewEvent {
    pub title: String,
    pub start: String,
    pub end: String,
    pub description: String,
    pub location: String,
    pub attendees: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Contact {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub emails: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub phones: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub organization: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Channel {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub is_archived: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChannelPage {
    pub channels: Vec<Channel>,
    /// Absent on the last page.
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ChatMessage {
    pub ts: String,
    pub user: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
    #[serde(default)]
    pub reply_count: u32,
    #[serde(default)]
    pub is_reply: bool,
}

#[async_trait]
pub trait MailBackend: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<EmailSummary>>;
    async fn read(&self, id: &str) -> Result<Email>;
    /// Returns the sent message id.
    async fn send(&self, email: &OutgoingEmail) -> Result<String>;
}

#[async_trait]
pub trait CalendarBackend: Send + Sync {
    async fn list_events(&self, days: usize, limit: usize) -> Result<Vec<CalendarEvent>>;
    async fn create_event(&self, event: &NewEvent) -> Result<CalendarEvent>;
}

#[async_trait]
pub trait ContactsBackend: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Contact>>;
}

#[async_trait]
pub trait MessagingBackend: Send + Sync {
    /// One page of channels the user belongs to, archived ones excluded.
    async fn list_channels(&self, cursor: Option<&str>, page_size: usize) -> Result<ChannelPage>;
    async fn history(&self, channel_id: &str, limit: usize) -> Result<Vec<ChatMessage>>;
    /// Thread messages, parent first.
    async fn replies(
        &self,
        channel_id: &str,
        thread_ts: &str,
        limit: usize,
    ) -> Result<Vec<ChatMessage>>;
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ChatMessage>>;
    /// Returns the posted message's timestamp.
    async fn post(&self, channel_id: &str, text: &str, thread_ts: Option<&str>)
    -> Result<String>;
}

#[cfg(test)]
pub(crate) mod fakes;
