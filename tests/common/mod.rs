// Shared test helpers: not all items used by every test binary.
#![allow(unused)]

use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use switchboard::agent::tools::ToolExecutor;
use switchboard::agent::tools::backends::{Email, EmailSummary, MailBackend, OutgoingEmail};
use switchboard::agent::{ApprovalStore, TurnRunner};
use switchboard::config::{ApprovalsConfig, TurnConfig};
use switchboard::providers::{Agent, AgentRegistry};
use switchboard::session::ConversationStore;
use tempfile::TempDir;

/// Agent that answers turn prompts from a script and records them.
pub struct MockAgent {
    replies: Mutex<VecDeque<String>>,
    pub prompts: Arc<Mutex<Vec<String>>>,
    pub default_reply: String,
}

impl MockAgent {
    pub fn with_replies(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(ToString::to_string).collect()),
            prompts: Arc::new(Mutex::new(Vec::new())),
            default_reply: "Mock response".to_string(),
        }
    }
}

#[async_trait]
impl Agent for MockAgent {
    fn name(&self) -> &str {
        "mock"
    }

    async fn run(&self, prompt: &str) -> anyhow::Result<String> {
        if prompt.starts_with("Write a title") {
            return Ok("Test conversation".to_string());
        }
        if prompt.starts_with("Summarize the following conversation") {
            return Ok("The user asked many questions.".to_string());
        }
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default_reply.clone()))
    }
}

/// Mailbox that records what would have been sent.
#[derive(Default)]
pub struct RecordingMail {
    pub sent: Mutex<Vec<OutgoingEmail>>,
}

#[async_trait]
impl MailBackend for RecordingMail {
    async fn search(&self, _query: &str, _limit: usize) -> anyhow::Result<Vec<EmailSummary>> {
        Ok(vec![EmailSummary {
            id: "m1".to_string(),
            from: "alice@example.com".to_string(),
            subject: "Lunch".to_string(),
            ..Default::default()
        }])
    }

    async fn read(&self, id: &str) -> anyhow::Result<Email> {
        Err(anyhow::anyhow!("message not found: {}", id))
    }

    async fn send(&self, email: &OutgoingEmail) -> anyhow::Result<String> {
        self.sent.lock().unwrap().push(email.clone());
        Ok("sent-1".to_string())
    }
}

pub struct TestRuntime {
    pub dir: TempDir,
    pub runner: Arc<TurnRunner>,
    pub agent: Arc<MockAgent>,
    pub mail: Arc<RecordingMail>,
}

pub fn runtime(agent: MockAgent, turn: TurnConfig) -> TestRuntime {
    let dir = TempDir::new().expect("create temp dir");
    let agent = Arc::new(agent);
    let mail = Arc::new(RecordingMail::default());
    let mut agents: HashMap<String, Arc<dyn Agent>> = HashMap::new();
    agents.insert("mock".to_string(), agent.clone());
    let runner = TurnRunner::new(
        Arc::new(ConversationStore::new(dir.path()).expect("open store")),
        Arc::new(AgentRegistry::new(agents, "mock").expect("build registry")),
        ToolExecutor::new().with_mail(mail.clone()),
        Arc::new(ApprovalStore::new(&ApprovalsConfig::default())),
        turn,
    );
    TestRuntime {
        dir,
        runner: Arc::new(runner),
        agent,
        mail,
    }
}

pub fn tool_call_line(name: &str, args: Value) -> String {
    format!("TOOL_CALL: {}", json!({"name": name, "args": args}))
}
