use serde::{Deserialize, Serialize};

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

/// Gmail, Calendar and People API access via a long-lived refresh token.
#[derive(Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, rename = "clientId")]
    pub client_id: String,
    #[serde(default, rename = "clientSecret")]
    pub client_secret: String,
    #[serde(default, rename = "refreshToken")]
    pub refresh_token: String,
    #[serde(default = "default_token_uri", rename = "tokenUri")]
    pub token_uri: String,
    /// Calendar to read and write events on.
    #[serde(default = "default_calendar_id", rename = "calendarId")]
    pub calendar_id: String,
}

redact_debug!(
    GoogleConfig,
    enabled,
    client_id,
    redact(client_secret),
    redact(refresh_token),
    token_uri,
    calendar_id,
);

fn default_calendar_id() -> String {
    "primary".to_string()
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            client_id: String::new(),
            client_secret: String::new(),
            refresh_token: String::new(),
            token_uri: default_token_uri(),
            calendar_id: default_calendar_id(),
        }
    }
}

/// Slack Web API access. A user token is required for `search.messages`.
#[derive(Clone, Serialize, Deserialize, Default)]
pub struct SlackConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, rename = "userToken")]
    pub user_token: String,
}

redact_debug!(SlackConfig, enabled, redact(user_token),);

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToolsConfig {
    #[serde(default)]
    pub google: GoogleConfig,
    #[serde(default)]
    pub slack: SlackConfig,
}
