use super::{GoogleApiClient, header_map};
use crate::agent::tools::backends::{Email, EmailSummary, MailBackend, OutgoingEmail};
use anyhow::Result;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use regex::Regex;
use serde_json::{Value, json};
use std::sync::LazyLock;
use tracing::debug;

const MAX_MIME_DEPTH: u32 = 10;
const NO_READABLE_BODY: &str = "(no readable body)";

static HTML_TAGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("Failed to compile HTML tags regex"));

/// Gmail REST client for the authenticated user's mailbox.
pub struct GmailClient {
    api: GoogleApiClient,
}

impl GmailClient {
    pub fn new(api: GoogleApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl MailBackend for GmailClient {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<EmailSummary>> {
        let endpoint = format!(
            "users/me/messages?q={}&maxResults={}",
            urlencoding::encode(query),
            limit
        );
        let result = self.api.call(&endpoint, "GET", None).await?;
        let stubs = result["messages"].as_array().cloned().unwrap_or_default();
        debug!("gmail search '{}' matched {} message(s)", query, stubs.len());

        let mut out = Vec::with_capacity(stubs.len());
        for stub in stubs.iter().take(limit) {
            let Some(id) = stub["id"].as_str() else {
                continue;
            };
            let endpoint = format!(
                "users/me/messages/{}?format=metadata&metadataHeaders=From&metadataHeaders=Subject&metadataHeaders=Date",
                urlencoding::encode(id)
            );
            let msg = self.api.call(&endpoint, "GET", None).await?;
            let headers = header_map(&msg["payload"]["headers"]);
            out.push(EmailSummary {
                id: id.to_string(),
                thread_id: msg["threadId"].as_str().unwrap_or_default().to_string(),
                from: headers.get("from").cloned().unwrap_or_default(),
                subject: headers
                    .get("subject")
                    .cloned()
                    .unwrap_or_else(|| "(no subject)".to_string()),
                date: headers.get("date").cloned().unwrap_or_default(),
                snippet: msg["snippet"].as_str().unwrap_or_default().to_string(),
            });
        }
        Ok(out)
    }

    async fn read(&self, id: &str) -> Result<Email> {
        let endpoint = format!("users/me/messages/{}?format=full", urlencoding::encode(id));
        let msg = self.api.call(&endpoint, "GET", None).await?;
        let headers = header_map(&msg["payload"]["headers"]);
        let get = |k: &str| headers.get(k).cloned().unwrap_or_default();
        Ok(Email {
            id: id.to_string(),
            thread_id: msg["threadId"].as_str().unwrap_or_default().to_string(),
            from: get("from"),
            to: get("to"),
            cc: get("cc"),
            subject: headers
                .get("subject")
                .cloned()
                .unwrap_or_else(|| "(no subject)".to_string()),
            date: get("date"),
            body: extract_body(&msg["payload"]),
        })
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<String> {
        let raw = URL_SAFE_NO_PAD.encode(build_rfc2822(email).as_bytes());
        let sent = self
            .api
            .call("users/me/messages/send", "POST", Some(json!({"raw": raw})))
            .await?;
        Ok(sent["id"].as_str().unwrap_or_default().to_string())
    }
}

/// Render a plain-text message. Header values are stripped of CR/LF so
/// agent-supplied text cannot inject extra headers.
pub(crate) fn build_rfc2822(email: &OutgoingEmail) -> String {
    let clean = |s: &str| s.replace(['\r', '\n'], "");
    let mut msg = format!("To: {}\r\n", clean(&email.to));
    if !email.cc.is_empty() {
        msg.push_str(&format!("Cc: {}\r\n", clean(&email.cc)));
    }
    msg.push_str(&format!("Subject: {}\r\n", clean(&email.subject)));
    msg.push_str("MIME-Version: 1.0\r\n");
    msg.push_str("Content-Type: text/plain; charset=\"UTF-8\"\r\n\r\n");
    msg.push_str(&email.body);
    msg
}

fn decode_part(data: &str) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD
        .decode(data)
        .or_else(|_| URL_SAFE.decode(data))
        .ok()?;
    String::from_utf8(bytes).ok()
}

/// Extract the human-readable body from a Gmail message payload.
pub(crate) fn extract_body(payload: &Value) -> String {
    extract_body_inner(payload, 0).unwrap_or_else(|| NO_READABLE_BODY.to_string())
}

fn extract_body_inner(payload: &Value, depth: u32) -> Option<String> {
    if depth > MAX_MIME_DEPTH {
        return None;
    }

    if payload["mimeType"].as_str() == Some("text/plain")
        && let Some(text) = payload["body"]["data"].as_str().and_then(decode_part)
    {
        return Some(text);
    }

    let parts = payload["parts"].as_array()?;
    // Prefer text/plain anywhere at this level, then html, then nested parts
    for mime in ["text/plain", "text/html"] {
        for part in parts {
            if part["mimeType"].as_str() == Some(mime)
                && let Some(text) = part["body"]["data"].as_str().and_then(decode_part)
            {
                if mime == "text/html" {
                    return Some(HTML_TAGS.replace_all(&text, "").trim().to_string());
                }
                return Some(text);
            }
        }
    }
    parts
        .iter()
        .filter(|p| p["parts"].is_array())
        .find_map(|p| extract_body_inner(p, depth + 1))
}
