use super::*;
use crate::agent::approval::ApprovalDecision;
use crate::agent::tools::backends::fakes::FakeMail;
use crate::config::ApprovalsConfig;
use crate::providers::TokenSender;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tempfile::TempDir;

const TITLE: &str = "Inbox review";

/// Replies from a script; title and summary prompts are answered separately.
#[derive(Default)]
struct ScriptedAgent {
    replies: Mutex<VecDeque<Result<String, String>>>,
    prompts: Mutex<Vec<String>>,
    summary: Option<Result<String, String>>,
    streaming: bool,
    repeat_last: bool,
}

impl ScriptedAgent {
    fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| Ok(r.to_string())).collect()),
            ..Default::default()
        }
    }

    fn failing(error: &str) -> Self {
        Self {
            replies: Mutex::new(VecDeque::from([Err(error.to_string())])),
            ..Default::default()
        }
    }

    fn turn_prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    fn name(&self) -> &str {
        "mock"
    }

    async fn run(&self, prompt: &str) -> anyhow::Result<String> {
        if prompt.starts_with("Write a title") {
            return Ok(format!("\"{}\"\n", TITLE));
        }
        if prompt.starts_with("Summarize the following conversation") {
            return self
                .summary
                .clone()
                .unwrap_or_else(|| Ok("Earlier chat.".to_string()))
                .map_err(|e| anyhow::anyhow!(e));
        }
        self.prompts.lock().unwrap().push(prompt.to_string());
        let mut replies = self.replies.lock().unwrap();
        let next = if self.repeat_last && replies.len() == 1 {
            replies.front().cloned()
        } else {
            replies.pop_front()
        };
        next.unwrap_or_else(|| Ok("(script exhausted)".to_string()))
            .map_err(|e| anyhow::anyhow!(e))
    }

    fn supports_streaming(&self) -> bool {
        self.streaming
    }

    async fn run_streaming(&self, prompt: &str, tokens: TokenSender) -> anyhow::Result<String> {
        let full = self.run(prompt).await?;
        for line in full.lines() {
            let _ = tokens.send(format!("{}\n", line));
        }
        Ok(full)
    }
}

struct Harness {
    _dir: TempDir,
    runner: Arc<TurnRunner>,
    agent: Arc<ScriptedAgent>,
    mail: Arc<FakeMail>,
}

fn harness(agent: ScriptedAgent) -> Harness {
    harness_with(agent, TurnConfig::default())
}

fn harness_with(agent: ScriptedAgent, config: TurnConfig) -> Harness {
    let dir = TempDir::new().unwrap();
    let agent = Arc::new(agent);
    let mail = Arc::new(FakeMail::default());
    let mut agents: HashMap<String, Arc<dyn Agent>> = HashMap::new();
    agents.insert("mock".to_string(), agent.clone());
    let runner = TurnRunner::new(
        Arc::new(ConversationStore::new(dir.path()).unwrap()),
        Arc::new(AgentRegistry::new(agents, "mock").unwrap()),
        ToolExecutor::new().with_mail(mail.clone()),
        Arc::new(ApprovalStore::new(&ApprovalsConfig::default())),
        config,
    );
    Harness {
        _dir: dir,
        runner: Arc::new(runner),
        agent,
        mail,
    }
}

fn request(message: &str) -> TurnRequest {
    TurnRequest {
        message: message.to_string(),
        ..Default::default()
    }
}

/// Run a turn to completion, answering approvals with `decide`.
async fn run_collect(
    h: &Harness,
    req: TurnRequest,
    decide: Option<ApprovalDecision>,
) -> (Result<TurnOutcome>, Vec<TurnEvent>) {
    let (tx, mut rx) = mpsc::channel(64);
    let runner = h.runner.clone();
    let turn = tokio::spawn(async move { runner.run_turn(req, tx).await });

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        if let (TurnEvent::ApprovalRequired { approval_id, .. }, Some(decision)) =
            (&event, decide.as_ref())
        {
            assert!(h.runner.approvals().resolve(approval_id, decision.clone()));
        }
        events.push(event);
    }
    (turn.await.unwrap(), events)
}

fn names(events: &[TurnEvent]) -> Vec<&'static str> {
    events.iter().map(TurnEvent::name).collect()
}

#[tokio::test]
async fn test_plain_answer_persists_and_titles() {
    let h = harness(ScriptedAgent::new(&["Hello! How can I help?"]));
    let (outcome, events) = run_collect(&h, request("hi"), None).await;
    let outcome = outcome.unwrap();

    assert_eq!(names(&events), vec!["thinking", "message", "done"]);
    assert_eq!(outcome.reply, "Hello! How can I help?");
    assert_eq!(outcome.title.as_deref(), Some(TITLE));

    let stored = h
        .runner
        .store()
        .get(&outcome.conversation_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.title, TITLE);
    let roles: Vec<Role> = stored.messages.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant]);
}

#[tokio::test]
async fn test_tool_call_result_is_fed_back_and_persisted() {
    let h = harness(ScriptedAgent::new(&[
        "Let me look.\nTOOL_CALL: {\"name\": \"search_email\", \"args\": {\"query\": \"invoice\"}}",
        "No invoices in your inbox.",
    ]));
    let (outcome, events) = run_collect(&h, request("any invoices?"), None).await;
    let outcome = outcome.unwrap();

    assert_eq!(
        names(&events),
        vec!["thinking", "tool_call", "tool_result", "message", "done"]
    );
    assert_eq!(h.mail.searches.lock().unwrap()[0], ("invoice".to_string(), 10));

    let prompts = h.agent.turn_prompts();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[1].contains("TOOL_RESULT: {\"tool\":\"search_email\""));
    assert!(prompts[1].ends_with("Assistant:"));

    let stored = h
        .runner
        .store()
        .get(&outcome.conversation_id)
        .await
        .unwrap()
        .unwrap();
    let roles: Vec<Role> = stored.messages.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![Role::User, Role::ToolCall, Role::ToolResult, Role::Assistant]
    );
    assert_eq!(stored.messages[1].tool.as_deref(), Some("search_email"));
}

#[tokio::test]
async fn test_rejected_gated_call_never_reaches_backend() {
    let h = harness(ScriptedAgent::new(&[
        "TOOL_CALL: {\"name\": \"send_email\", \"args\": {\"to\": \"bob@example.com\", \"subject\": \"Hi\", \"body\": \"Hello\", \"cc\": \"boss@example.com\"}}",
        "Okay, I won't send it.",
    ]));
    let decision = ApprovalDecision::reject(Some("wrong recipient".to_string()));
    let (outcome, events) = run_collect(&h, request("email bob"), Some(decision)).await;
    outcome.unwrap();

    assert_eq!(
        names(&events),
        vec![
            "thinking",
            "tool_call",
            "approval_required",
            "approval_resolved",
            "tool_result",
            "message",
            "done"
        ]
    );
    let TurnEvent::ApprovalRequired { preview, .. } = &events[2] else {
        panic!("expected approval_required");
    };
    let mut keys: Vec<&str> = preview.keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(keys, vec!["body", "subject", "to"]);

    let TurnEvent::ToolResult { error, data, .. } = &events[4] else {
        panic!("expected tool_result");
    };
    assert!(data.is_none());
    assert!(error.as_deref().unwrap().contains("wrong recipient"));

    assert!(h.mail.sent.lock().unwrap().is_empty());
    assert!(h.agent.turn_prompts()[1].contains("wrong recipient"));
}

#[tokio::test]
async fn test_approved_gated_call_executes_once() {
    let h = harness(ScriptedAgent::new(&[
        "TOOL_CALL: {\"name\": \"send_email\", \"args\": {\"to\": \"bob@example.com\", \"subject\": \"Hi\", \"body\": \"Hello\"}}",
        "Sent.",
    ]));
    let (outcome, events) =
        run_collect(&h, request("email bob"), Some(ApprovalDecision::approve(None))).await;
    outcome.unwrap();

    assert!(events.iter().any(|e| matches!(
        e,
        TurnEvent::ApprovalResolved { approved: true, .. }
    )));
    assert_eq!(h.mail.sent.lock().unwrap().len(), 1);
    assert!(h.runner.approvals().pending().is_empty());
}

#[tokio::test]
async fn test_iteration_budget_ends_with_fallback() {
    let agent = ScriptedAgent {
        repeat_last: true,
        ..ScriptedAgent::new(&["TOOL_CALL: {\"name\": \"search_email\", \"args\": {\"query\": \"x\"}}"])
    };
    let h = harness(agent);
    let (outcome, events) = run_collect(&h, request("loop forever"), None).await;

    assert_eq!(outcome.unwrap().reply, FALLBACK_MESSAGE);
    assert_eq!(h.agent.turn_prompts().len(), TurnConfig::default().max_iterations);
    let tool_calls = events
        .iter()
        .filter(|e| matches!(e, TurnEvent::ToolCall { .. }))
        .count();
    assert_eq!(tool_calls, TurnConfig::default().max_iterations);
}

#[tokio::test]
async fn test_agent_failure_emits_error_without_final_message() {
    let h = harness(ScriptedAgent::failing("agent exited with status 2"));
    let (outcome, events) = run_collect(&h, request("hello"), None).await;

    assert!(outcome.is_err());
    assert_eq!(names(&events), vec!["thinking", "error"]);
    let TurnEvent::Error { error } = &events[1] else {
        panic!("expected error");
    };
    assert!(error.contains("status 2"));

    let list = h.runner.store().list().await.unwrap();
    let stored = h.runner.store().get(&list[0].id).await.unwrap().unwrap();
    assert_eq!(stored.messages.len(), 1);
    assert_eq!(stored.messages[0].role, Role::User);
}

#[tokio::test]
async fn test_streaming_tokens_then_discard_or_end() {
    let agent = ScriptedAgent {
        streaming: true,
        ..ScriptedAgent::new(&[
            "Checking.\nTOOL_CALL: {\"name\": \"search_email\", \"args\": {\"query\": \"x\"}}",
            "All clear.",
        ])
    };
    let h = harness(agent);
    let (outcome, events) = run_collect(&h, request("check mail"), None).await;
    outcome.unwrap();

    assert_eq!(
        names(&events),
        vec![
            "thinking",
            "token",
            "token",
            "stream_discard",
            "tool_call",
            "tool_result",
            "token",
            "stream_end",
            "message",
            "done"
        ]
    );
}

#[tokio::test]
async fn test_unknown_agent_is_an_error_event() {
    let h = harness(ScriptedAgent::new(&[]));
    let req = TurnRequest {
        agent: Some("nope".to_string()),
        ..request("hi")
    };
    let (outcome, events) = run_collect(&h, req, None).await;
    assert!(outcome.is_err());
    assert_eq!(names(&events), vec!["error"]);
}

#[tokio::test]
async fn test_failed_compaction_does_not_block_turn() {
    let agent = ScriptedAgent {
        summary: Some(Err("summarizer crashed".to_string())),
        ..ScriptedAgent::new(&["Still here."])
    };
    let h = harness(agent);
    let store = h.runner.store().clone();
    let mut conversation = store.create("mock").await.unwrap();
    for i in 0..31 {
        let m = if i % 2 == 0 {
            Message::user(format!("q{}", i))
        } else {
            Message::assistant(format!("a{}", i))
        };
        conversation = store.append_message(&conversation.id, m).await.unwrap();
    }

    let req = TurnRequest {
        conversation_id: Some(conversation.id.clone()),
        ..request("continue")
    };
    let (outcome, _) = run_collect(&h, req, None).await;
    assert_eq!(outcome.unwrap().reply, "Still here.");

    let stored = store.get(&conversation.id).await.unwrap().unwrap();
    assert_eq!(stored.message_count, 33);
    assert!(stored.summary.is_none());
}

#[tokio::test]
async fn test_compaction_runs_before_prompting() {
    let h = harness(ScriptedAgent::new(&["Done."]));
    let store = h.runner.store().clone();
    let mut conversation = store.create("mock").await.unwrap();
    for i in 0..30 {
        let m = if i % 2 == 0 {
            Message::user(format!("q{}", i))
        } else {
            Message::assistant(format!("a{}", i))
        };
        conversation = store.append_message(&conversation.id, m).await.unwrap();
    }

    let req = TurnRequest {
        conversation_id: Some(conversation.id.clone()),
        ..request("next")
    };
    run_collect(&h, req, None).await.0.unwrap();

    let stored = store.get(&conversation.id).await.unwrap().unwrap();
    assert_eq!(stored.summary.as_deref(), Some("Earlier chat."));
    // 15 kept (including "next") plus the new reply
    assert_eq!(stored.message_count, 16);
    let prompt = &h.agent.turn_prompts()[0];
    assert!(prompt.contains("Summary of the earlier conversation:\nEarlier chat."));
    assert!(!prompt.contains("User: q0\n"));
}

#[test]
fn test_clean_title_strips_decoration() {
    assert_eq!(clean_title("\n\"Quarterly report.\"\n").as_deref(), Some("Quarterly report"));
    assert_eq!(clean_title("Title: Team sync").as_deref(), Some("Team sync"));
    assert!(clean_title("  \n ").is_none());
}

#[test]
fn test_event_names_and_payloads() {
    let done = TurnEvent::Done {
        conversation_id: "c1".to_string(),
        title: None,
    };
    assert_eq!(done.name(), "done");
    assert_eq!(
        done.payload(),
        serde_json::json!({"conversation_id": "c1", "title": null})
    );
    assert_eq!(TurnEvent::StreamDiscard.name(), "stream_discard");
    assert_eq!(
        TurnEvent::Token {
            text: "hi".to_string()
        }
        .payload(),
        serde_json::json!({"text": "hi"})
    );
}
