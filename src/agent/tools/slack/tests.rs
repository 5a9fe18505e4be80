use super::*;
use crate::agent::tools::messaging::{fetch_channel_messages, resolve_channel};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> SlackClient {
    SlackClient::with_base_url("xoxp-test", &server.uri())
}

#[tokio::test]
async fn test_api_error_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/conversations.history"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"ok": false, "error": "not_in_channel"})),
        )
        .mount(&server)
        .await;

    let err = client(&server).history("C123456789", 10).await.unwrap_err();
    assert_eq!(err.to_string(), "Slack API error: not_in_channel");
}

#[tokio::test]
async fn test_list_channels_sends_token_and_reads_cursor() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/users.conversations"))
        .and(header("Authorization", "Bearer xoxp-test"))
        .and(body_string_contains("exclude_archived=true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "channels": [{"id": "C111111111", "name": "general", "is_private": false}],
            "response_metadata": {"next_cursor": "dXNlcjpVMDYx"}
        })))
        .mount(&server)
        .await;

    let page = client(&server).list_channels(None, 200).await.unwrap();
    assert_eq!(page.channels[0].name, "general");
    assert_eq!(page.next_cursor.as_deref(), Some("dXNlcjpVMDYx"));
}

#[tokio::test]
async fn test_empty_cursor_means_last_page() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/users.conversations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "channels": [],
            "response_metadata": {"next_cursor": ""}
        })))
        .mount(&server)
        .await;

    let page = client(&server).list_channels(Some("abc"), 200).await.unwrap();
    assert!(page.next_cursor.is_none());
}

#[tokio::test]
async fn test_search_carries_channel_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search.messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "messages": {"matches": [
                {"ts": "1.1", "user": "U1", "text": "deploy done", "channel": {"id": "C222222222", "name": "ops"}}
            ]}
        })))
        .mount(&server)
        .await;

    let hits = client(&server).search("deploy", 5).await.unwrap();
    assert_eq!(hits[0].channel_id.as_deref(), Some("C222222222"));
    assert_eq!(hits[0].text, "deploy done");
}

#[tokio::test]
async fn test_post_in_thread() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat.postMessage"))
        .and(body_string_contains("thread_ts=1700000000.000100"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"ok": true, "ts": "1700000001.000200"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let ts = client(&server)
        .post("C333333333", "on it", Some("1700000000.000100"))
        .await
        .unwrap();
    assert_eq!(ts, "1700000001.000200");
}

#[tokio::test]
async fn test_resolve_and_fetch_thread_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/users.conversations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "channels": [
                {"id": "C111111111", "name": "incident-20260213-foo"},
                {"id": "C222222222", "name": "incident"}
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/conversations.history"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "messages": [
                {"ts": "10.0", "user": "U1", "text": "db is down", "reply_count": 2, "thread_ts": "10.0"},
                {"ts": "11.0", "user": "U2", "text": "paging oncall"},
                {"ts": "12.0", "user": "U3", "text": "status page updated"}
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/conversations.replies"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "messages": [
                {"ts": "10.0", "user": "U1", "text": "db is down"},
                {"ts": "10.1", "user": "U4", "text": "restarting primary"}
            ]
        })))
        .mount(&server)
        .await;

    let slack = client(&server);
    let id = resolve_channel(&slack, "incident").await.unwrap();
    assert_eq!(id, "C222222222");

    let messages = fetch_channel_messages(&slack, &id, 20).await.unwrap();
    let texts: Vec<&str> = messages.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(
        texts,
        vec!["db is down", "restarting primary", "paging oncall", "status page updated"]
    );
    assert!(messages[1].is_reply);
}
