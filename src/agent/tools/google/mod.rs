mod calendar;
mod contacts;
mod gmail;

pub use calendar::GoogleCalendarClient;
pub use contacts::GoogleContactsClient;
pub use gmail::GmailClient;

use crate::auth::google::GoogleCredentials;
use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

pub const GMAIL_BASE_URL: &str = "https://gmail.googleapis.com/gmail/v1";
pub const CALENDAR_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";
pub const PEOPLE_BASE_URL: &str = "https://people.googleapis.com/v1";

/// Shared Google API client that handles authentication and HTTP requests.
///
/// Clones share one credential set and one connection pool, so the Gmail,
/// Calendar and People clients refresh the access token only once.
#[derive(Clone)]
pub struct GoogleApiClient {
    credentials: Arc<Mutex<GoogleCredentials>>,
    client: Client,
    base_url: String,
}

impl GoogleApiClient {
    pub fn new(credentials: GoogleCredentials, base_url: &str) -> Self {
        Self {
            credentials: Arc::new(Mutex::new(credentials)),
            client: Client::builder()
                .connect_timeout(std::time::Duration::from_secs(10))
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Same credentials and pool, different API root.
    #[must_use]
    pub fn with_base_url(&self, base_url: &str) -> Self {
        Self {
            credentials: self.credentials.clone(),
            client: self.client.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn get_access_token(&self) -> Result<String> {
        let mut creds = self.credentials.lock().await;
        if !creds.is_valid() {
            creds.refresh(&self.client).await?;
        }
        Ok(creds.get_access_token().to_string())
    }

    pub async fn call(&self, endpoint: &str, method: &str, body: Option<Value>) -> Result<Value> {
        let token = self.get_access_token().await?;
        let url = format!("{}/{}", self.base_url, endpoint);

        let mut response = self
            .send_request(&url, method, &token, body.as_ref())
            .await?;

        // On 401, force token refresh and retry once
        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            info!("Google API returned 401, refreshing token and retrying");
            let new_token = {
                let mut creds = self.credentials.lock().await;
                creds.refresh(&self.client).await?;
                creds.get_access_token().to_string()
            };
            response = self
                .send_request(&url, method, &new_token, body.as_ref())
                .await?;
        }

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "Google API {} {} failed ({}): {}",
                method,
                endpoint.split('?').next().unwrap_or(endpoint),
                status,
                google_error_message(&text)
            ));
        }

        // Some endpoints (e.g. DELETE) answer with an empty body
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).context("Google API returned invalid JSON")
    }

    async fn send_request(
        &self,
        url: &str,
        method: &str,
        token: &str,
        body: Option<&Value>,
    ) -> Result<reqwest::Response> {
        let mut request = match method {
            "GET" => self.client.get(url),
            "POST" => self.client.post(url),
            "PUT" => self.client.put(url),
            "DELETE" => self.client.delete(url),
            _ => return Err(anyhow::anyhow!("Unsupported HTTP method: {}", method)),
        };

        request = request.header("Authorization", format!("Bearer {}", token));

        if let Some(body) = body {
            request = request.json(body);
        }

        Ok(request.send().await?)
    }
}

/// Pull `error.message` out of a Google error body, or return the raw text.
fn google_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(ToString::to_string))
        .unwrap_or_else(|| body.chars().take(200).collect())
}

/// Collect `[{name, value}]` message headers into a map.
fn header_map(headers: &Value) -> HashMap<String, String> {
    headers
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|h| {
                    let name = h["name"].as_str()?;
                    let value = h["value"].as_str()?;
                    Some((name.to_ascii_lowercase(), value.to_string()))
                })
                .collect()
        })
        .unwrap_or_default()
}
