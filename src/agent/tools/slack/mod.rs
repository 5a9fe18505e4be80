use crate::agent::tools::backends::{Channel, ChannelPage, ChatMessage, MessagingBackend};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

pub const SLACK_API_URL: &str = "https://slack.com/api";

/// Slack Web API client acting as the user (`xoxp-` token), which is what
/// `search.messages` requires.
pub struct SlackClient {
    token: String,
    base_url: String,
    client: reqwest::Client,
}

impl SlackClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_base_url(token, SLACK_API_URL)
    }

    pub fn with_base_url(token: impl Into<String>, base_url: &str) -> Self {
        Self {
            token: token.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::builder()
                .connect_timeout(std::time::Duration::from_secs(10))
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    async fn send_slack_api(&self, method: &str, params: &HashMap<&str, String>) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, method);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .form(params)
            .send()
            .await
            .with_context(|| format!("Slack {} request failed", method))?;

        let json: Value = response.json().await?;
        if json.get("ok").and_then(Value::as_bool) != Some(true) {
            let error = json
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            return Err(anyhow::anyhow!("Slack API error: {}", error));
        }
        Ok(json)
    }
}

#[async_trait]
impl MessagingBackend for SlackClient {
    async fn list_channels(&self, cursor: Option<&str>, page_size: usize) -> Result<ChannelPage> {
        let mut params = HashMap::from([
            ("types", "public_channel,private_channel".to_string()),
            ("exclude_archived", "true".to_string()),
            ("limit", page_size.to_string()),
        ]);
        if let Some(cursor) = cursor {
            params.insert("cursor", cursor.to_string());
        }
        let json = self.send_slack_api("users.conversations", &params).await?;
        let channels = json["channels"]
            .as_array()
            .map(|arr| arr.iter().map(parse_channel).collect())
            .unwrap_or_default();
        let next_cursor = json["response_metadata"]["next_cursor"]
            .as_str()
            .filter(|c| !c.is_empty())
            .map(ToString::to_string);
        Ok(ChannelPage {
            channels,
            next_cursor,
        })
    }

    async fn history(&self, channel_id: &str, limit: usize) -> Result<Vec<ChatMessage>> {
        let params = HashMap::from([
            ("channel", channel_id.to_string()),
            ("limit", limit.to_string()),
        ]);
        let json = self.send_slack_api("conversations.history", &params).await?;
        Ok(parse_messages(&json["messages"], Some(channel_id)))
    }

    async fn replies(
        &self,
        channel_id: &str,
        thread_ts: &str,
        limit: usize,
    ) -> Result<Vec<ChatMessage>> {
        let params = HashMap::from([
            ("channel", channel_id.to_string()),
            ("ts", thread_ts.to_string()),
            ("limit", limit.to_string()),
        ]);
        let json = self.send_slack_api("conversations.replies", &params).await?;
        Ok(parse_messages(&json["messages"], Some(channel_id)))
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ChatMessage>> {
        let params = HashMap::from([
            ("query", query.to_string()),
            ("count", limit.to_string()),
            ("sort", "timestamp".to_string()),
        ]);
        let json = self.send_slack_api("search.messages", &params).await?;
        let matches = &json["messages"]["matches"];
        debug!(
            "slack search '{}' returned {} match(es)",
            query,
            matches.as_array().map_or(0, Vec::len)
        );
        Ok(matches
            .as_array()
            .map(|arr| {
                arr.iter()
                    .map(|m| {
                        let channel = m["channel"]["id"].as_str();
                        parse_message(m, channel)
                    })
                    .take(limit)
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn post(&self, channel_id: &str, text: &str, thread_ts: Option<&str>) -> Result<String> {
        let mut params = HashMap::from([
            ("channel", channel_id.to_string()),
            ("text", text.to_string()),
        ]);
        if let Some(ts) = thread_ts {
            params.insert("thread_ts", ts.to_string());
        }
        let json = self.send_slack_api("chat.postMessage", &params).await?;
        Ok(json["ts"].as_str().unwrap_or_default().to_string())
    }
}

fn parse_channel(c: &Value) -> Channel {
    Channel {
        id: c["id"].as_str().unwrap_or_default().to_string(),
        name: c["name"].as_str().unwrap_or_default().to_string(),
        is_private: c["is_private"].as_bool().unwrap_or(false),
        is_archived: c["is_archived"].as_bool().unwrap_or(false),
    }
}

fn parse_messages(list: &Value, channel_id: Option<&str>) -> Vec<ChatMessage> {
    list.as_array()
        .map(|arr| arr.iter().map(|m| parse_message(m, channel_id)).collect())
        .unwrap_or_default()
}

fn parse_message(m: &Value, channel_id: Option<&str>) -> ChatMessage {
    let text = |key: &str| m[key].as_str().unwrap_or_default().to_string();
    ChatMessage {
        ts: text("ts"),
        // bot posts carry `username` instead of `user`
        user: m["user"]
            .as_str()
            .or_else(|| m["username"].as_str())
            .unwrap_or_default()
            .to_string(),
        text: text("text"),
        channel_id: channel_id.map(ToString::to_string),
        thread_ts: m["thread_ts"].as_str().map(ToString::to_string),
        reply_count: m["reply_count"]
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(0),
        is_reply: false,
    }
}

#[cfg(test)]
mod tests;
