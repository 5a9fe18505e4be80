use super::*;
use crate::agent::ApprovalStore;
use crate::agent::tools::ToolCall;
use crate::agent::tools::ToolExecutor;
use crate::agent::tools::backends::Email;
use crate::agent::tools::backends::fakes::FakeMail;
use crate::config::{ApprovalsConfig, TurnConfig};
use crate::providers::{Agent, AgentRegistry};
use crate::session::ConversationStore;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tempfile::TempDir;
use tower::ServiceExt;

/// Always answers with the same text.
struct FixedAgent {
    name: &'static str,
    reply: &'static str,
}

#[async_trait]
impl Agent for FixedAgent {
    fn name(&self) -> &str {
        self.name
    }

    async fn run(&self, prompt: &str) -> anyhow::Result<String> {
        if prompt.starts_with("Write a title") {
            return Ok("Greeting".to_string());
        }
        Ok(self.reply.to_string())
    }
}

struct TestGateway {
    _dir: TempDir,
    runner: Arc<TurnRunner>,
}

impl TestGateway {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let mut agents: HashMap<String, Arc<dyn Agent>> = HashMap::new();
        agents.insert(
            "alpha".to_string(),
            Arc::new(FixedAgent {
                name: "alpha",
                reply: "Hello from alpha.",
            }),
        );
        agents.insert(
            "beta".to_string(),
            Arc::new(FixedAgent {
                name: "beta",
                reply: "Hello from beta.",
            }),
        );
        let mail = FakeMail {
            inbox: vec![Email {
                id: "m1".to_string(),
                from: "alice@example.com".to_string(),
                subject: "Quarterly numbers".to_string(),
                date: "Mon, 3 Mar 2025".to_string(),
                body: "See attached.".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let runner = TurnRunner::new(
            Arc::new(ConversationStore::new(dir.path()).unwrap()),
            Arc::new(AgentRegistry::new(agents, "alpha").unwrap()),
            ToolExecutor::new().with_mail(Arc::new(mail)),
            Arc::new(ApprovalStore::new(&ApprovalsConfig::default())),
            TurnConfig::default(),
        );
        Self {
            _dir: dir,
            runner: Arc::new(runner),
        }
    }

    fn app(&self) -> Router {
        build_router(GatewayState::new(self.runner.clone()))
    }
}

async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), 65536).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn test_health_endpoint_returns_json() {
    let gw = TestGateway::new();
    let (status, json) = send(gw.app(), "GET", "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["version"], crate::VERSION);
}

#[tokio::test]
async fn test_chat_streams_named_events() {
    let gw = TestGateway::new();
    let req = Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header("content-type", "application/json")
        .body(Body::from(json!({"message": "hi"}).to_string()))
        .unwrap();
    let resp = gw.app().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(
        resp.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream")
    );

    let bytes = axum::body::to_bytes(resp.into_body(), 65536).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    let thinking = text.find("event: thinking").unwrap();
    let message = text.find("event: message").unwrap();
    let done = text.find("event: done").unwrap();
    assert!(thinking < message && message < done, "{text}");
    assert!(text.contains("Hello from alpha."), "{text}");
    assert!(text.contains("\"title\":\"Greeting\""), "{text}");

    let list = gw.runner.store().list().await.unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].title, "Greeting");
}

#[tokio::test]
async fn test_chat_rejects_empty_message_and_unknown_agent() {
    let gw = TestGateway::new();
    let (status, json) = send(gw.app(), "POST", "/api/chat", Some(json!({"message": "  "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("empty"));

    let (status, json) = send(
        gw.app(),
        "POST",
        "/api/chat",
        Some(json!({"message": "hi", "agent": "gamma"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("gamma"));
    assert!(gw.runner.store().list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_approve_unknown_id_is_404() {
    let gw = TestGateway::new();
    let (status, json) = send(
        gw.app(),
        "POST",
        "/api/approve",
        Some(json!({"approval_id": "approval_99"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("approval_99"));
}

#[tokio::test]
async fn test_reject_resolves_pending_approval() {
    let gw = TestGateway::new();
    let mut args = Map::new();
    args.insert("to".to_string(), json!("bob@example.com"));
    let call = ToolCall::new("send_email", args);
    let ticket = gw
        .runner
        .approvals()
        .create(&call, crate::agent::approval::preview(&call));
    let id = ticket.id().to_string();

    let (status, json) = send(gw.app(), "GET", "/api/approvals", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json[0]["id"], id.as_str());
    assert_eq!(json[0]["tool"], "send_email");

    let (status, json) = send(
        gw.app(),
        "POST",
        "/api/reject",
        Some(json!({"approval_id": id, "reason": "wrong recipient"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "rejected");

    let (decision, resolved) = gw.runner.approvals().wait(ticket).await;
    assert!(resolved);
    assert!(!decision.approved);
    assert_eq!(decision.reason.as_deref(), Some("wrong recipient"));

    // A second decision on the same id finds nothing.
    let (status, _) = send(
        gw.app(),
        "POST",
        "/api/approve",
        Some(json!({"approval_id": id})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_conversation_crud() {
    let gw = TestGateway::new();
    let (status, created) = send(
        gw.app(),
        "POST",
        "/api/conversations",
        Some(json!({"agent": "beta"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["agent"], "beta");
    let id = created["id"].as_str().unwrap().to_string();

    let (status, list) = send(gw.app(), "GET", "/api/conversations", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);

    let uri = format!("/api/conversations/{}", id);
    let (status, fetched) = send(gw.app(), "GET", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], id.as_str());

    let (status, json) = send(gw.app(), "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "deleted");

    let (status, _) = send(gw.app(), "GET", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(gw.app(), "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_conversation_without_body_uses_active_agent() {
    let gw = TestGateway::new();
    let (status, created) = send(gw.app(), "POST", "/api/conversations", None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["agent"], "alpha");
}

#[tokio::test]
async fn test_agent_get_and_switch() {
    let gw = TestGateway::new();
    let (status, json) = send(gw.app(), "GET", "/api/agent", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["active"], "alpha");
    assert_eq!(json["available"].as_array().unwrap().len(), 2);

    let (status, json) = send(gw.app(), "POST", "/api/agent", Some(json!({"name": "beta"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["active"], "beta");
    assert_eq!(gw.runner.agents().active_name(), "beta");

    let (status, _) = send(gw.app(), "POST", "/api/agent", Some(json!({"name": "gamma"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(gw.runner.agents().active_name(), "beta");
}

#[tokio::test]
async fn test_command_endpoint() {
    let gw = TestGateway::new();
    let (status, json) = send(
        gw.app(),
        "POST",
        "/api/command",
        Some(json!({"name": "/email", "args": "numbers"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let output = json["output"].as_str().unwrap();
    assert!(output.contains("Quarterly numbers"), "{output}");
    assert!(output.contains("alice@example.com"), "{output}");

    let (status, json) = send(
        gw.app(),
        "POST",
        "/api/command",
        Some(json!({"name": "weather"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("weather"));
}

#[tokio::test]
async fn test_slash_commands() {
    let gw = TestGateway::new();
    let runner = gw.runner.as_ref();

    let status = run_command(runner, "status", "").await.unwrap();
    assert!(status.contains("Agent: alpha"), "{status}");
    assert!(status.contains("Backends: email"), "{status}");
    assert!(status.contains("Pending approvals: 0"), "{status}");

    assert_eq!(
        run_command(runner, "help", "").await.unwrap(),
        commands::HELP
    );
    assert_eq!(
        run_command(runner, "email", "").await,
        Err(commands::CommandError::Usage("/email <query>"))
    );
    assert_eq!(
        run_command(runner, "calendar", "soon").await,
        Err(commands::CommandError::Usage("/calendar [days]"))
    );

    // No calendar backend is configured; the tool error is shown as output.
    let calendar = run_command(runner, "/calendar", "3").await.unwrap();
    assert!(calendar.starts_with("error:"), "{calendar}");
}
