//! In-memory backends for unit tests.

use super::*;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub fn channel(id: &str, name: &str) -> Channel {
    Channel {
        id: id.to_string(),
        name: name.to_string(),
        ..Default::default()
    }
}

pub fn message(ts: &str, text: &str) -> ChatMessage {
    ChatMessage {
        ts: ts.to_string(),
        user: "U1".to_string(),
        text: text.to_string(),
        ..Default::default()
    }
}

#[derive(Default)]
pub struct FakeMessaging {
    pub pages: Vec<ChannelPage>,
    pub history: HashMap<String, Vec<ChatMessage>>,
    pub replies: HashMap<String, Vec<ChatMessage>>,
    pub search_results: HashMap<String, Vec<ChatMessage>>,
    pub fail_search: bool,
    pub list_calls: AtomicUsize,
    pub search_queries: Mutex<Vec<String>>,
    pub posted: Mutex<Vec<(String, String, Option<String>)>>,
}

impl FakeMessaging {
    /// Pages are chained with cursors "1", "2", ...
    pub fn with_pages(pages: Vec<Vec<Channel>>) -> Self {
        let count = pages.len();
        let pages = pages
            .into_iter()
            .enumerate()
            .map(|(i, channels)| ChannelPage {
                channels,
                next_cursor: (i + 1 < count).then(|| (i + 1).to_string()),
            })
            .collect();
        Self {
            pages,
            ..Default::default()
        }
    }
}

#[async_trait]
impl MessagingBackend for FakeMessaging {
    async fn list_channels(&self, cursor: Option<&str>, _page_size: usize) -> Result<ChannelPage> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let idx = cursor.and_then(|c| c.parse::<usize>().ok()).unwrap_or(0);
        Ok(self.pages.get(idx).cloned().unwrap_or_default())
    }

    async fn history(&self, channel_id: &str, limit: usize) -> Result<Vec<ChatMessage>> {
        let mut msgs = self.history.get(channel_id).cloned().unwrap_or_default();
        msgs.truncate(limit);
        Ok(msgs)
    }

    async fn replies(
        &self,
        _channel_id: &str,
        thread_ts: &str,
        limit: usize,
    ) -> Result<Vec<ChatMessage>> {
        let mut msgs = self.replies.get(thread_ts).cloned().unwrap_or_default();
        msgs.truncate(limit);
        Ok(msgs)
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ChatMessage>> {
        self.search_queries
            .lock()
            .unwrap()
            .push(query.to_string());
        if self.fail_search {
            return Err(anyhow::anyhow!("Slack API error: not_allowed_token_type"));
        }
        let mut msgs = self.search_results.get(query).cloned().unwrap_or_default();
        msgs.truncate(limit);
        Ok(msgs)
    }

    async fn post(&self, channel_id: &str, text: &str, thread_ts: Option<&str>) -> Result<String> {
        self.posted.lock().unwrap().push((
            channel_id.to_string(),
            text.to_string(),
            thread_ts.map(ToString::to_string),
        ));
        Ok("1700000000.000100".to_string())
    }
}

#[derive(Default)]
pub struct FakeMail {
    pub inbox: Vec<Email>,
    pub sent: Mutex<Vec<OutgoingEmail>>,
    pub searches: Mutex<Vec<(String, usize)>>,
    pub delay: Option<Duration>,
    pub fail: bool,
}

#[async_trait]
impl MailBackend for FakeMail {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<EmailSummary>> {
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        if self.fail {
            return Err(anyhow::anyhow!("Gmail unavailable"));
        }
        self.searches
            .lock()
            .unwrap()
            .push((query.to_string(), limit));
        Ok(self
            .inbox
            .iter()
            .take(limit)
            .map(|e| EmailSummary {
                id: e.id.clone(),
                thread_id: e.thread_id.clone(),
                from: e.from.clone(),
                subject: e.subject.clone(),
                date: e.date.clone(),
                snippet: e.body.chars().take(40).collect(),
            })
            .collect())
    }

    async fn read(&self, id: &str) -> Result<Email> {
        self.inbox
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("message not found: {}", id))
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<String> {
        self.sent.lock().unwrap().push(email.clone());
        Ok("sent-1".to_string())
    }
}

#[derive(Default)]
pub struct FakeCalendar {
    pub events: Vec<CalendarEvent>,
    pub created: Mutex<Vec<NewEvent>>,
    pub queries: Mutex<Vec<(usize, usize)>>,
}

#[async_trait]
impl CalendarBackend for FakeCalendar {
    async fn list_events(&self, days: usize, limit: usize) -> Result<Vec<CalendarEvent>> {
        self.queries.lock().unwrap().push((days, limit));
        Ok(self.events.iter().take(limit).cloned().collect())
    }

    async fn create_event(&self, event: &NewEvent) -> Result<CalendarEvent> {
        self.created.lock().unwrap().push(event.clone());
        Ok(CalendarEvent {
            id: "evt-1".to_string(),
            title: event.title.clone(),
            start: event.start.clone(),
            end: event.end.clone(),
            attendees: event.attendees.clone(),
            ..Default::default()
        })
    }
}

#[derive(Default)]
pub struct FakeContacts {
    pub contacts: Vec<Contact>,
}

#[async_trait]
impl ContactsBackend for FakeContacts {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Contact>> {
        let q = query.to_lowercase();
        Ok(self
            .contacts
            .iter()
            .filter(|c| c.name.to_lowercase().contains(&q))
            .take(limit)
            .cloned()
            .collect())
    }
}
