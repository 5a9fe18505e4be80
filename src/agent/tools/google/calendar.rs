use super::GoogleApiClient;
use crate::agent::tools::backends::{CalendarBackend, CalendarEvent, NewEvent};
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};

/// Google Calendar client bound to a single calendar.
pub struct GoogleCalendarClient {
    api: GoogleApiClient,
    calendar_id: String,
}

impl GoogleCalendarClient {
    pub fn new(api: GoogleApiClient, calendar_id: impl Into<String>) -> Self {
        Self {
            api,
            calendar_id: calendar_id.into(),
        }
    }

    fn events_endpoint(&self) -> String {
        format!("calendars/{}/events", urlencoding::encode(&self.calendar_id))
    }
}

#[async_trait]
impl CalendarBackend for GoogleCalendarClient {
    async fn list_events(&self, days: usize, limit: usize) -> Result<Vec<CalendarEvent>> {
        let now = Utc::now();
        let days = i64::try_from(days).unwrap_or(i64::MAX).min(366);
        let time_min = now.to_rfc3339();
        let time_max = (now + chrono::Duration::days(days)).to_rfc3339();

        let endpoint = format!(
            "{}?timeMin={}&timeMax={}&maxResults={}&singleEvents=true&orderBy=startTime",
            self.events_endpoint(),
            urlencoding::encode(&time_min),
            urlencoding::encode(&time_max),
            limit
        );
        let result = self.api.call(&endpoint, "GET", None).await?;
        Ok(result["items"]
            .as_array()
            .map(|items| items.iter().take(limit).map(parse_event).collect())
            .unwrap_or_default())
    }

    async fn create_event(&self, event: &NewEvent) -> Result<CalendarEvent> {
        let mut body = json!({
            "summary": event.title,
            "start": {"dateTime": event.start},
            "end": {"dateTime": event.end},
        });
        if !event.description.is_empty() {
            body["description"] = Value::String(event.description.clone());
        }
        if !event.location.is_empty() {
            body["location"] = Value::String(event.location.clone());
        }
        if !event.attendees.is_empty() {
            body["attendees"] = Value::Array(
                event
                    .attendees
                    .iter()
                    .map(|email| json!({"email": email}))
                    .collect(),
            );
        }
        let created = self
            .api
            .call(&self.events_endpoint(), "POST", Some(body))
            .await?;
        Ok(parse_event(&created))
    }
}

/// Map a Calendar API event resource. All-day events carry `date` instead
/// of `dateTime`.
pub(crate) fn parse_event(ev: &Value) -> CalendarEvent {
    let when = |key: &str| {
        ev[key]["dateTime"]
            .as_str()
            .or_else(|| ev[key]["date"].as_str())
            .unwrap_or_default()
            .to_string()
    };
    let text = |key: &str| ev[key].as_str().unwrap_or_default().to_string();
    CalendarEvent {
        id: text("id"),
        title: ev["summary"].as_str().unwrap_or("(no title)").to_string(),
        start: when("start"),
        end: when("end"),
        location: text("location"),
        description: text("description"),
        attendees: ev["attendees"]
            .as_array()
            .map(|list| {
                list.iter()
                    .filter_map(|a| a["email"].as_str().map(ToString::to_string))
                    .collect()
            })
            .unwrap_or_default(),
        link: text("htmlLink"),
    }
}
