use crate::agent::tools::executor::ToolExecutor;
use crate::agent::tools::google::{
    CALENDAR_BASE_URL, GMAIL_BASE_URL, GmailClient, GoogleApiClient, GoogleCalendarClient,
    GoogleContactsClient, PEOPLE_BASE_URL,
};
use crate::agent::tools::slack::SlackClient;
use crate::auth::google::GoogleCredentials;
use crate::config::ToolsConfig;
use std::sync::Arc;
use tracing::info;

/// Wire up the backends enabled in config. Disabled or unconfigured ones
/// are left out, so their tools answer "<kind> backend not configured".
pub fn build_executor(config: &ToolsConfig) -> ToolExecutor {
    let mut executor = ToolExecutor::new();

    let google = &config.google;
    if google.enabled && !google.client_id.is_empty() && !google.refresh_token.is_empty() {
        let gmail_api = GoogleApiClient::new(GoogleCredentials::from_config(google), GMAIL_BASE_URL);
        let calendar_api = gmail_api.with_base_url(CALENDAR_BASE_URL);
        let people_api = gmail_api.with_base_url(PEOPLE_BASE_URL);
        executor = executor
            .with_mail(Arc::new(GmailClient::new(gmail_api)))
            .with_calendar(Arc::new(GoogleCalendarClient::new(
                calendar_api,
                google.calendar_id.clone(),
            )))
            .with_contacts(Arc::new(GoogleContactsClient::new(people_api)));
        info!("Google backends enabled (email, calendar, contacts)");
    }

    let slack = &config.slack;
    if slack.enabled && !slack.user_token.is_empty() {
        executor = executor.with_messaging(Arc::new(SlackClient::new(slack.user_token.clone())));
        info!("Slack backend enabled");
    }

    executor
}
