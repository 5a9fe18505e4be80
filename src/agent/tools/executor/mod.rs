use crate::agent::tools::backends::{
    CalendarBackend, ContactsBackend, MailBackend, MessagingBackend, NewEvent, OutgoingEmail,
};
use crate::agent::tools::base::{ExecutionContext, ToolCall, ToolResult};
use crate::agent::tools::catalog::{
    CREATE_EVENT, LIST_CHANNELS, LIST_EVENTS, READ_CHANNEL, READ_EMAIL, SEARCH_CONTACTS,
    SEARCH_EMAIL, SEARCH_MESSAGES, SEND_EMAIL, SEND_MESSAGE,
};
use crate::agent::tools::messaging::{
    CHANNEL_PAGE_SIZE, MAX_CHANNEL_PAGES, fetch_channel_messages, resolve_channel,
};
use crate::utils::truncate_chars;
use anyhow::{Result, bail};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

pub const EMAIL_BODY_MAX_CHARS: usize = 5000;
pub const CHAT_TEXT_MAX_CHARS: usize = 500;
pub const TRUNCATION_SUFFIX: &str = "... [truncated]";

/// Dispatches tool calls to their handlers and the configured backends.
///
/// Every failure (unknown tool, bad arguments, missing or failing backend,
/// deadline, panic) comes back as a `ToolResult` error so the agent can
/// react to it.
#[derive(Clone, Default)]
pub struct ToolExecutor {
    mail: Option<Arc<dyn MailBackend>>,
    calendar: Option<Arc<dyn CalendarBackend>>,
    contacts: Option<Arc<dyn ContactsBackend>>,
    messaging: Option<Arc<dyn MessagingBackend>>,
}

impl ToolExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_mail(mut self, backend: Arc<dyn MailBackend>) -> Self {
        self.mail = Some(backend);
        self
    }

    #[must_use]
    pub fn with_calendar(mut self, backend: Arc<dyn CalendarBackend>) -> Self {
        self.calendar = Some(backend);
        self
    }

    #[must_use]
    pub fn with_contacts(mut self, backend: Arc<dyn ContactsBackend>) -> Self {
        self.contacts = Some(backend);
        self
    }

    #[must_use]
    pub fn with_messaging(mut self, backend: Arc<dyn MessagingBackend>) -> Self {
        self.messaging = Some(backend);
        self
    }

    /// Names of the backends that are wired up.
    pub fn configured_backends(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.mail.is_some() {
            out.push("email");
        }
        if self.calendar.is_some() {
            out.push("calendar");
        }
        if self.contacts.is_some() {
            out.push("contacts");
        }
        if self.messaging.is_some() {
            out.push("slack");
        }
        out
    }

    pub async fn execute(&self, ctx: &ExecutionContext, call: &ToolCall) -> ToolResult {
        let args = Value::Object(call.args.clone()).to_string();
        debug!(
            "executing tool: {} (conversation={}) with arguments: {}",
            call.name, ctx.conversation_id, args
        );
        let started = Instant::now();

        // Run in a separate task so a panicking handler cannot take the turn down
        let this = self.clone();
        let owned = call.clone();
        let mut handle = tokio::spawn(async move { this.dispatch(&owned).await });

        let outcome = match tokio::time::timeout_at(ctx.deadline, &mut handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(anyhow::anyhow!("tool '{}' panicked: {}", call.name, join_err)),
            Err(_) => {
                handle.abort();
                Err(anyhow::anyhow!("tool '{}' exceeded the turn deadline", call.name))
            }
        };

        match outcome {
            Ok(data) => {
                info!("tool '{}' completed in {:?}", call.name, started.elapsed());
                ToolResult::ok(&call.name, data)
            }
            Err(e) => {
                let message = format!("{e:#}");
                warn!("tool '{}' returned error: {}", call.name, message);
                ToolResult::error(&call.name, message)
            }
        }
    }

    async fn dispatch(&self, call: &ToolCall) -> Result<Value> {
        match call.name.as_str() {
            SEARCH_EMAIL => self.search_email(call).await,
            READ_EMAIL => self.read_email(call).await,
            SEND_EMAIL => self.send_email(call).await,
            LIST_EVENTS => self.list_events(call).await,
            CREATE_EVENT => self.create_event(call).await,
            SEARCH_CONTACTS => self.search_contacts(call).await,
            LIST_CHANNELS => self.list_channels(call).await,
            READ_CHANNEL => self.read_channel(call).await,
            SEARCH_MESSAGES => self.search_messages(call).await,
            SEND_MESSAGE => self.send_message(call).await,
            other => bail!("unknown tool: {}", other),
        }
    }

    fn mail(&self) -> Result<&dyn MailBackend> {
        self.mail
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("email backend not configured"))
    }

    fn calendar(&self) -> Result<&dyn CalendarBackend> {
        self.calendar
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("calendar backend not configured"))
    }

    fn contacts(&self) -> Result<&dyn ContactsBackend> {
        self.contacts
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("contacts backend not configured"))
    }

    fn messaging(&self) -> Result<&dyn MessagingBackend> {
        self.messaging
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("slack backend not configured"))
    }

    // --- email ---

    async fn search_email(&self, call: &ToolCall) -> Result<Value> {
        let query = call.required_str("query")?;
        let limit = call.limit_arg("limit", 10, 50);
        let messages = self.mail()?.search(query, limit).await?;
        Ok(json!({"count": messages.len(), "messages": messages}))
    }

    async fn read_email(&self, call: &ToolCall) -> Result<Value> {
        let id = call.required_str("id")?;
        let mut email = self.mail()?.read(id).await?;
        email.body = truncate_chars(&email.body, EMAIL_BODY_MAX_CHARS, TRUNCATION_SUFFIX);
        Ok(serde_json::to_value(email)?)
    }

    async fn send_email(&self, call: &ToolCall) -> Result<Value> {
        let email = OutgoingEmail {
            to: call.required_str("to")?.to_string(),
            subject: call.required_str("subject")?.to_string(),
            body: call.required_str("body")?.to_string(),
            cc: call.optional_str("cc").to_string(),
        };
        let id = self.mail()?.send(&email).await?;
        Ok(json!({"status": "sent", "id": id, "to": email.to}))
    }

    // --- calendar ---

    async fn list_events(&self, call: &ToolCall) -> Result<Value> {
        let days = call.limit_arg("days", 7, 90);
        let limit = call.limit_arg("limit", 20, 100);
        let events = self.calendar()?.list_events(days, limit).await?;
        Ok(json!({"count": events.len(), "events": events}))
    }

    async fn create_event(&self, call: &ToolCall) -> Result<Value> {
        let title = call.required_str("title")?;
        let start = call.required_str("start")?;
        let end = call.required_str("end")?;
        let start_at = chrono::DateTime::parse_from_rfc3339(start)
            .map_err(|e| anyhow::anyhow!("invalid start time '{}': {}", start, e))?;
        let end_at = chrono::DateTime::parse_from_rfc3339(end)
            .map_err(|e| anyhow::anyhow!("invalid end time '{}': {}", end, e))?;
        if end_at <= start_at {
            bail!("event end must be after start");
        }

        let event = NewEvent {
            title: title.to_string(),
            start: start.to_string(),
            end: end.to_string(),
            description: call.optional_str("description").to_string(),
            location: call.optional_str("location").to_string(),
            attendees: split_list(call.optional_str("attendees")),
        };
        let created = self.calendar()?.create_event(&event).await?;
        Ok(json!({"status": "created", "event": created}))
    }

    // --- contacts ---

    async fn search_contacts(&self, call: &ToolCall) -> Result<Value> {
        let query = call.required_str("query")?;
        let limit = call.limit_arg("limit", 10, 50);
        let contacts = self.contacts()?.search(query, limit).await?;
        Ok(json!({"count": contacts.len(), "contacts": contacts}))
    }

    // --- slack ---

    async fn list_channels(&self, call: &ToolCall) -> Result<Value> {
        let limit = call.limit_arg("limit", 100, CHANNEL_PAGE_SIZE * MAX_CHANNEL_PAGES);
        let backend = self.messaging()?;

        let mut channels = Vec::new();
        let mut cursor: Option<String> = None;
        for _ in 0..MAX_CHANNEL_PAGES {
            let page = backend
                .list_channels(cursor.as_deref(), CHANNEL_PAGE_SIZE)
                .await?;
            channels.extend(page.channels.into_iter().filter(|c| !c.is_archived));
            if channels.len() >= limit {
                break;
            }
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }
        channels.truncate(limit);
        Ok(json!({"count": channels.len(), "channels": channels}))
    }

    async fn read_channel(&self, call: &ToolCall) -> Result<Value> {
        let raw = call.required_str("channel")?;
        let limit = call.limit_arg("limit", 20, 100);
        let backend = self.messaging()?;
        let channel_id = resolve_channel(backend, raw).await?;
        let mut messages = fetch_channel_messages(backend, &channel_id, limit).await?;
        for m in &mut messages {
            m.text = truncate_chars(&m.text, CHAT_TEXT_MAX_CHARS, TRUNCATION_SUFFIX);
        }
        Ok(json!({"channel": channel_id, "count": messages.len(), "messages": messages}))
    }

    async fn search_messages(&self, call: &ToolCall) -> Result<Value> {
        let query = call.required_str("query")?;
        let limit = call.limit_arg("limit", 20, 100);
        let mut messages = self.messaging()?.search(query, limit).await?;
        for m in &mut messages {
            m.text = truncate_chars(&m.text, CHAT_TEXT_MAX_CHARS, TRUNCATION_SUFFIX);
        }
        Ok(json!({"count": messages.len(), "messages": messages}))
    }

    async fn send_message(&self, call: &ToolCall) -> Result<Value> {
        let raw = call.required_str("channel")?;
        let text = call.required_str("text")?;
        let thread_ts = call.str_arg("thread_ts");
        let backend = self.messaging()?;
        let channel_id = resolve_channel(backend, raw).await?;
        let ts = backend.post(&channel_id, text, thread_ts).await?;
        Ok(json!({"status": "sent", "channel": channel_id, "ts": ts}))
    }
}

/// Split a comma separated list, dropping blanks.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}
