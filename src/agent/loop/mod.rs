mod events;

pub use events::TurnEvent;

use crate::agent::approval::{ApprovalStore, preview};
use crate::agent::compaction::{compact, needs_compaction};
use crate::agent::context::{CONTINUATION_CUE, build_prompt, title_prompt};
use crate::agent::tools::catalog::is_gated;
use crate::agent::tools::parser::{format_result, parse};
use crate::agent::tools::{ExecutionContext, ToolCall, ToolExecutor, ToolResult};
use crate::config::TurnConfig;
use crate::providers::{Agent, AgentRegistry};
use crate::session::{Conversation, ConversationStore, Message, Role};
use crate::utils::truncate_chars;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Final answer when the iteration budget runs out before the agent stops
/// calling tools.
pub const FALLBACK_MESSAGE: &str = "I couldn't finish that within the number of steps I'm \
allowed for one request. Try asking again with a narrower request.";

/// How long `done` waits for the first-exchange title.
const TITLE_WAIT: Duration = Duration::from_secs(5);
const TITLE_MAX_CHARS: usize = 60;

#[derive(Debug, Clone, Default)]
pub struct TurnRequest {
    pub message: String,
    pub conversation_id: Option<String>,
    /// Agent for this turn only; the active agent when `None`.
    pub agent: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub conversation_id: String,
    pub reply: String,
    pub title: Option<String>,
}

/// Drives one user turn: agent → parse → (approve) → execute → feed back,
/// until the agent answers without tool calls or the budget is spent.
pub struct TurnRunner {
    store: Arc<ConversationStore>,
    agents: Arc<AgentRegistry>,
    executor: ToolExecutor,
    approvals: Arc<ApprovalStore>,
    config: TurnConfig,
}

impl TurnRunner {
    pub fn new(
        store: Arc<ConversationStore>,
        agents: Arc<AgentRegistry>,
        executor: ToolExecutor,
        approvals: Arc<ApprovalStore>,
        config: TurnConfig,
    ) -> Self {
        Self {
            store,
            agents,
            executor,
            approvals,
            config,
        }
    }

    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    pub fn agents(&self) -> &Arc<AgentRegistry> {
        &self.agents
    }

    pub fn executor(&self) -> &ToolExecutor {
        &self.executor
    }

    pub fn approvals(&self) -> &Arc<ApprovalStore> {
        &self.approvals
    }

    /// Run a turn, reporting progress on `events`. Failures are reported as
    /// an `error` event and returned.
    ///
    /// A closed `events` receiver does not stop the turn; its results are
    /// still persisted.
    pub async fn run_turn(
        &self,
        request: TurnRequest,
        events: mpsc::Sender<TurnEvent>,
    ) -> Result<TurnOutcome> {
        match self.run_turn_inner(request, &events).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                error!("turn failed: {:#}", e);
                emit(
                    &events,
                    TurnEvent::Error {
                        error: format!("{:#}", e),
                    },
                )
                .await;
                Err(e)
            }
        }
    }

    async fn run_turn_inner(
        &self,
        request: TurnRequest,
        events: &mpsc::Sender<TurnEvent>,
    ) -> Result<TurnOutcome> {
        // The agent is read once; a concurrent switch only affects later turns.
        let (agent_name, agent) = self.agents.resolve(request.agent.as_deref())?;

        let mut conversation = self
            .store
            .append_or_create(
                request.conversation_id.as_deref(),
                &agent_name,
                Message::user(&request.message),
            )
            .await?;
        let first_exchange = conversation.dialogue_count() == 1 && conversation.title.is_empty();
        info!(
            "turn started: conversation={} agent={} messages={}",
            conversation.id, agent_name, conversation.message_count
        );

        if let Some(compacted) = self.maybe_compact(&conversation, agent.as_ref()).await {
            conversation = compacted;
        }

        emit(events, TurnEvent::Thinking).await;

        let deadline = Instant::now() + Duration::from_secs(self.config.timeout_secs);
        let ctx = ExecutionContext::new(conversation.id.clone(), deadline);

        // History without the message we just appended; it goes in as the new message.
        let mut history = conversation.clone();
        history.messages.pop();
        let mut prompt = build_prompt(&history, &request.message);

        let mut reply = None;
        for iteration in 1..=self.config.max_iterations {
            debug!("turn iteration {} for {}", iteration, conversation.id);
            let response = self
                .call_agent(agent.as_ref(), &prompt, events, deadline)
                .await?;
            let parsed = parse(&response);

            if agent.supports_streaming() {
                let ev = if parsed.calls.is_empty() {
                    TurnEvent::StreamEnd
                } else {
                    TurnEvent::StreamDiscard
                };
                emit(events, ev).await;
            }

            if parsed.calls.is_empty() {
                reply = Some(if parsed.text.is_empty() {
                    response.trim().to_string()
                } else {
                    parsed.text
                });
                break;
            }

            info!(
                "iteration {}: agent requested {} tool call(s)",
                iteration,
                parsed.calls.len()
            );
            let mut results = Vec::with_capacity(parsed.calls.len());
            for call in &parsed.calls {
                let result = self.handle_call(&ctx, call, events).await;
                self.persist_exchange(&conversation.id, call, &result).await?;
                results.push(format_result(&result));
            }

            prompt.push(' ');
            prompt.push_str(response.trim());
            prompt.push_str("\n\n");
            prompt.push_str(&results.join("\n"));
            prompt.push_str("\n\n");
            prompt.push_str(CONTINUATION_CUE);
        }

        let reply = reply.unwrap_or_else(|| {
            warn!(
                "turn for {} hit the {} iteration limit",
                conversation.id, self.config.max_iterations
            );
            FALLBACK_MESSAGE.to_string()
        });

        self.store
            .append_message(&conversation.id, Message::assistant(&reply))
            .await?;
        emit(
            events,
            TurnEvent::Message {
                content: reply.clone(),
            },
        )
        .await;

        let title = if first_exchange {
            self.generate_title(&conversation, agent, &request.message, &reply)
                .await
        } else {
            Some(conversation.title.clone()).filter(|t| !t.is_empty())
        };

        emit(
            events,
            TurnEvent::Done {
                conversation_id: conversation.id.clone(),
                title: title.clone(),
            },
        )
        .await;
        info!("turn finished: conversation={}", conversation.id);

        Ok(TurnOutcome {
            conversation_id: conversation.id,
            reply,
            title,
        })
    }

    /// Compact when over threshold. Failures are logged and the turn goes
    /// on with the uncompacted conversation.
    async fn maybe_compact(
        &self,
        conversation: &Conversation,
        agent: &dyn Agent,
    ) -> Option<Conversation> {
        let cfg = &self.config.compaction;
        if !cfg.enabled || !needs_compaction(conversation, cfg.threshold) {
            return None;
        }
        info!(
            "conversation {} has {} dialogue messages, compacting",
            conversation.id,
            conversation.dialogue_count()
        );
        let timeout = Duration::from_secs(cfg.timeout_secs);
        match tokio::time::timeout(
            timeout,
            compact(&self.store, agent, conversation, cfg.keep_recent),
        )
        .await
        {
            Ok(Ok(updated)) => updated,
            Ok(Err(e)) => {
                warn!("compaction of {} failed: {:#}", conversation.id, e);
                None
            }
            Err(_) => {
                warn!("compaction of {} timed out after {:?}", conversation.id, timeout);
                None
            }
        }
    }

    async fn call_agent(
        &self,
        agent: &dyn Agent,
        prompt: &str,
        events: &mpsc::Sender<TurnEvent>,
        deadline: Instant,
    ) -> Result<String> {
        if !agent.supports_streaming() {
            return tokio::time::timeout_at(deadline, agent.run(prompt))
                .await
                .with_context(|| format!("agent '{}' timed out", agent.name()))?;
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let forward_events = events.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(text) = rx.recv().await {
                emit(&forward_events, TurnEvent::Token { text }).await;
            }
        });

        let result = tokio::time::timeout_at(deadline, agent.run_streaming(prompt, tx))
            .await
            .with_context(|| format!("agent '{}' timed out", agent.name()));
        // All tokens are out before stream_end/stream_discard.
        if let Err(e) = forwarder.await {
            warn!("token forwarder failed: {}", e);
        }
        result?
    }

    async fn handle_call(
        &self,
        ctx: &ExecutionContext,
        call: &ToolCall,
        events: &mpsc::Sender<TurnEvent>,
    ) -> ToolResult {
        emit(
            events,
            TurnEvent::ToolCall {
                name: call.name.clone(),
                args: call.args.clone(),
            },
        )
        .await;

        let result = if is_gated(&call.name) {
            self.gated_call(ctx, call, events).await
        } else {
            self.executor.execute(ctx, call).await
        };

        emit(
            events,
            TurnEvent::ToolResult {
                name: result.tool.clone(),
                data: result.data.clone(),
                error: result.error.clone(),
            },
        )
        .await;
        result
    }

    async fn gated_call(
        &self,
        ctx: &ExecutionContext,
        call: &ToolCall,
        events: &mpsc::Sender<TurnEvent>,
    ) -> ToolResult {
        let ticket = self.approvals.create(call, preview(call));
        let approval_id = ticket.id().to_string();
        emit(
            events,
            TurnEvent::ApprovalRequired {
                approval_id: approval_id.clone(),
                tool: call.name.clone(),
                preview: ticket.approval.preview.clone(),
            },
        )
        .await;

        let (decision, explicit) = self.approvals.wait(ticket).await;
        emit(
            events,
            TurnEvent::ApprovalResolved {
                approval_id,
                approved: decision.approved,
                reason: decision.reason.clone(),
            },
        )
        .await;

        if decision.approved {
            return self.executor.execute(ctx, call).await;
        }
        let message = match (explicit, decision.reason.as_deref().map(str::trim)) {
            (true, Some(reason)) if !reason.is_empty() => {
                format!("the user rejected this action: {}", reason)
            }
            (true, _) => "the user rejected this action".to_string(),
            (false, reason) => format!(
                "no approval was given ({}); the action was not performed",
                reason.unwrap_or("timed out")
            ),
        };
        ToolResult::error(&call.name, message)
    }

    async fn persist_exchange(&self, id: &str, call: &ToolCall, result: &ToolResult) -> Result<()> {
        let call_json = serde_json::to_string(call)?;
        let result_json = serde_json::to_string(result)?;
        self.store
            .append_message(id, Message::tool(Role::ToolCall, &call.name, call_json))
            .await?;
        self.store
            .append_message(id, Message::tool(Role::ToolResult, &call.name, result_json))
            .await?;
        Ok(())
    }

    /// Ask for a short title in the background; `done` waits for it only
    /// briefly, after which the task finishes on its own.
    async fn generate_title(
        &self,
        conversation: &Conversation,
        agent: Arc<dyn Agent>,
        user_message: &str,
        reply: &str,
    ) -> Option<String> {
        let store = self.store.clone();
        let id = conversation.id.clone();
        let prompt = title_prompt(user_message, reply);
        let handle = tokio::spawn(async move {
            let raw = match agent.run(&prompt).await {
                Ok(raw) => raw,
                Err(e) => {
                    warn!("title generation for {} failed: {:#}", id, e);
                    return None;
                }
            };
            let title = clean_title(&raw)?;
            if let Err(e) = store.set_title(&id, &title).await {
                warn!("failed to save title for {}: {:#}", id, e);
                return None;
            }
            debug!("titled conversation {}: {}", id, title);
            Some(title)
        });

        match tokio::time::timeout(TITLE_WAIT, handle).await {
            Ok(Ok(title)) => title,
            Ok(Err(e)) => {
                warn!("title task failed: {}", e);
                None
            }
            Err(_) => {
                debug!("title for {} not ready in time", conversation.id);
                None
            }
        }
    }
}

/// First non-empty line, unquoted and bounded.
fn clean_title(raw: &str) -> Option<String> {
    let line = raw.lines().map(str::trim).find(|l| !l.is_empty())?;
    let line = line
        .trim_start_matches("Title:")
        .trim()
        .trim_matches(|c| c == '"' || c == '\'' || c == '*')
        .trim_end_matches('.')
        .trim();
    if line.is_empty() {
        return None;
    }
    Some(truncate_chars(line, TITLE_MAX_CHARS, "..."))
}

async fn emit(events: &mpsc::Sender<TurnEvent>, event: TurnEvent) {
    if events.send(event).await.is_err() {
        debug!("event receiver gone, continuing turn without streaming");
    }
}

#[cfg(test)]
mod tests;
