pub mod commands;

/// HTTP API server for the gateway.
///
/// Streams turn progress over SSE and exposes the approval, conversation,
/// agent and slash-command endpoints used by the web client.
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::Stream;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::agent::{ApprovalDecision, TurnEvent, TurnRequest, TurnRunner};
use commands::run_command;

/// Max message size for the chat endpoint: 1 MB.
const MAX_MESSAGE_SIZE: usize = 1_048_576;

/// Buffered turn events per open stream.
const EVENT_BUFFER: usize = 64;

const KEEP_ALIVE_SECS: u64 = 10;

/// Shared state for HTTP handlers.
#[derive(Clone)]
pub struct GatewayState {
    runner: Arc<TurnRunner>,
}

impl GatewayState {
    pub fn new(runner: Arc<TurnRunner>) -> Self {
        Self { runner }
    }
}

/// Request body for POST /api/chat.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// Omitted to start a new conversation.
    pub conversation_id: Option<String>,
    /// Per-turn agent override.
    pub agent: Option<String>,
}

/// Request body for POST /api/approve and /api/reject.
#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub approval_id: String,
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NewConversationRequest {
    pub agent: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SwitchAgentRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub name: String,
    #[serde(default)]
    pub args: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({"error": message.into()}))).into_response()
}

fn internal_error(context: &str, e: &anyhow::Error) -> Response {
    error!("{}: {:#}", context, e);
    error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e))
}

/// Build the HTTP API router.
pub fn build_router(state: GatewayState) -> Router {
    Router::new()
        .route("/api/chat", post(chat_handler))
        .route("/api/approve", post(approve_handler))
        .route("/api/reject", post(reject_handler))
        .route("/api/approvals", get(approvals_handler))
        .route(
            "/api/conversations",
            get(list_conversations_handler).post(create_conversation_handler),
        )
        .route(
            "/api/conversations/{id}",
            get(get_conversation_handler).delete(delete_conversation_handler),
        )
        .route("/api/agent", get(get_agent_handler).post(switch_agent_handler))
        .route("/api/command", post(command_handler))
        .route("/api/health", get(health_handler))
        .with_state(state)
}

/// POST /api/chat: run one turn and stream its events.
async fn chat_handler(
    State(state): State<GatewayState>,
    Json(body): Json<ChatRequest>,
) -> Response {
    if body.message.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "message must not be empty");
    }
    if body.message.len() > MAX_MESSAGE_SIZE {
        return error_response(StatusCode::PAYLOAD_TOO_LARGE, "message too large");
    }
    if let Some(name) = body.agent.as_deref()
        && state.runner.agents().get(name).is_none()
    {
        return error_response(StatusCode::BAD_REQUEST, format!("unknown agent: {}", name));
    }

    debug!(
        "HTTP API chat request: conversation={:?}, content_len={}",
        body.conversation_id,
        body.message.len()
    );

    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let runner = state.runner.clone();
    let request = TurnRequest {
        message: body.message,
        conversation_id: body.conversation_id,
        agent: body.agent,
    };
    // The turn outlives a disconnected client so its results are still saved.
    tokio::spawn(async move {
        if let Err(e) = runner.run_turn(request, tx).await {
            warn!("HTTP API turn ended with error: {:#}", e);
        }
    });

    Sse::new(event_stream(rx))
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(KEEP_ALIVE_SECS)))
        .into_response()
}

fn event_stream(
    rx: mpsc::Receiver<TurnEvent>,
) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
    futures_util::stream::unfold(rx, |mut rx| async move {
        let event = rx.recv().await?;
        let sse = Event::default()
            .event(event.name())
            .data(event.payload().to_string());
        Some((Ok(sse), rx))
    })
}

/// POST /api/approve
async fn approve_handler(
    State(state): State<GatewayState>,
    Json(body): Json<DecisionRequest>,
) -> Response {
    decide(&state, body, true)
}

/// POST /api/reject
async fn reject_handler(
    State(state): State<GatewayState>,
    Json(body): Json<DecisionRequest>,
) -> Response {
    decide(&state, body, false)
}

fn decide(state: &GatewayState, body: DecisionRequest, approved: bool) -> Response {
    let decision = if approved {
        ApprovalDecision::approve(body.reason)
    } else {
        ApprovalDecision::reject(body.reason)
    };
    if !state.runner.approvals().resolve(&body.approval_id, decision) {
        return error_response(
            StatusCode::NOT_FOUND,
            format!("unknown approval: {}", body.approval_id),
        );
    }
    let status = if approved { "approved" } else { "rejected" };
    info!("approval {} {} over HTTP", body.approval_id, status);
    Json(json!({"status": status})).into_response()
}

/// GET /api/approvals: approvals still waiting for a decision.
async fn approvals_handler(State(state): State<GatewayState>) -> Response {
    Json(state.runner.approvals().pending()).into_response()
}

/// GET /api/conversations
async fn list_conversations_handler(State(state): State<GatewayState>) -> Response {
    match state.runner.store().list().await {
        Ok(list) => Json(list).into_response(),
        Err(e) => internal_error("failed to list conversations", &e),
    }
}

/// POST /api/conversations
async fn create_conversation_handler(
    State(state): State<GatewayState>,
    body: Option<Json<NewConversationRequest>>,
) -> Response {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let agent = match state.runner.agents().resolve(body.agent.as_deref()) {
        Ok((name, _)) => name,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, format!("{:#}", e)),
    };
    match state.runner.store().create(&agent).await {
        Ok(conversation) => (StatusCode::CREATED, Json(conversation)).into_response(),
        Err(e) => internal_error("failed to create conversation", &e),
    }
}

/// GET /api/conversations/{id}
async fn get_conversation_handler(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Response {
    match state.runner.store().get(&id).await {
        Ok(Some(conversation)) => Json(conversation).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "conversation not found"),
        Err(e) => internal_error("failed to load conversation", &e),
    }
}

/// DELETE /api/conversations/{id}
async fn delete_conversation_handler(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Response {
    match state.runner.store().delete(&id).await {
        Ok(true) => Json(json!({"status": "deleted"})).into_response(),
        Ok(false) => error_response(StatusCode::NOT_FOUND, "conversation not found"),
        Err(e) => internal_error("failed to delete conversation", &e),
    }
}

/// GET /api/agent
async fn get_agent_handler(State(state): State<GatewayState>) -> Response {
    let agents = state.runner.agents();
    Json(json!({
        "active": agents.active_name(),
        "available": agents.names(),
    }))
    .into_response()
}

/// POST /api/agent: switch the default agent for later turns.
async fn switch_agent_handler(
    State(state): State<GatewayState>,
    Json(body): Json<SwitchAgentRequest>,
) -> Response {
    match state.runner.agents().switch(&body.name) {
        Ok(()) => Json(json!({"active": body.name})).into_response(),
        Err(e) => error_response(StatusCode::BAD_REQUEST, format!("{:#}", e)),
    }
}

/// POST /api/command: run a slash command.
async fn command_handler(
    State(state): State<GatewayState>,
    Json(body): Json<CommandRequest>,
) -> Response {
    match run_command(&state.runner, &body.name, &body.args).await {
        Ok(output) => Json(json!({"output": output})).into_response(),
        Err(e) => error_response(StatusCode::BAD_REQUEST, e.to_string()),
    }
}

/// GET /api/health: health check endpoint.
async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": crate::VERSION,
    }))
}

/// Bind and serve the HTTP API in a background task.
pub async fn start(
    host: &str,
    port: u16,
    state: GatewayState,
) -> Result<tokio::task::JoinHandle<()>> {
    let app = build_router(state);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("HTTP API listening on {}", addr);

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("HTTP API server error: {}", e);
        }
    });

    Ok(handle)
}

#[cfg(test)]
mod tests;
