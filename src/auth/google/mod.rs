use crate::config::GoogleConfig;
use anyhow::{Context, Result};
use reqwest::Client;
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Refresh this many seconds before the advertised expiry.
const EXPIRY_SKEW_SECS: u64 = 60;

/// OAuth credentials for the Google APIs, renewed via the refresh-token grant.
#[derive(Clone)]
pub struct GoogleCredentials {
    pub token: String,
    pub refresh_token: String,
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    /// Unix timestamp after which `token` must be refreshed.
    pub expiry: Option<u64>,
}

impl std::fmt::Debug for GoogleCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleCredentials")
            .field("token_uri", &self.token_uri)
            .field("client_id", &self.client_id)
            .field("expiry", &self.expiry)
            .finish_non_exhaustive()
    }
}

impl GoogleCredentials {
    pub fn from_config(config: &GoogleConfig) -> Self {
        Self {
            token: String::new(),
            refresh_token: config.refresh_token.clone(),
            token_uri: config.token_uri.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            expiry: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        if self.token.is_empty() {
            return false;
        }
        // No expiry means we don't know, so refresh
        self.expiry.is_some_and(|expiry| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs() + EXPIRY_SKEW_SECS < expiry)
                .unwrap_or(false)
        })
    }

    pub async fn refresh(&mut self, client: &Client) -> Result<()> {
        if self.refresh_token.is_empty() {
            return Err(anyhow::anyhow!("No refresh token available"));
        }

        let mut params = HashMap::new();
        params.insert("refresh_token", self.refresh_token.as_str());
        params.insert("client_id", self.client_id.as_str());
        params.insert("client_secret", self.client_secret.as_str());
        params.insert("grant_type", "refresh_token");

        let response = client
            .post(&self.token_uri)
            .form(&params)
            .send()
            .await
            .context("Token refresh request failed")?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(anyhow::anyhow!("Token refresh failed: {}", error_text));
        }

        let token_data: serde_json::Value = response.json().await?;

        if token_data.get("error").is_some() {
            let error_desc = token_data
                .get("error_description")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown error");
            return Err(anyhow::anyhow!("Token refresh failed: {}", error_desc));
        }

        self.token = token_data["access_token"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("Missing access_token"))?
            .to_string();

        if let Some(refresh_token) = token_data.get("refresh_token").and_then(|v| v.as_str()) {
            self.refresh_token = refresh_token.to_string();
        }

        self.expiry = token_data
            .get("expires_in")
            .and_then(serde_json::Value::as_u64)
            .and_then(|expires_in| {
                SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .ok()
                    .map(|d| d.as_secs() + expires_in)
            });

        debug!("refreshed Google access token");
        Ok(())
    }

    pub fn get_access_token(&self) -> &str {
        &self.token
    }
}
