//! Human-in-the-loop gate for side-effecting tool calls.
//!
//! A gated call gets a pending entry with a one-shot decision slot. The turn
//! blocks in [`ApprovalStore::wait`] until someone resolves the id or the
//! approval timeout elapses. A timed-out entry stays in the live set unless
//! `removeOnTimeout` is configured, so a late decision is still accepted
//! (and ignored).

use crate::agent::tools::ToolCall;
use crate::agent::tools::catalog::{CREATE_EVENT, SEND_EMAIL, SEND_MESSAGE};
use crate::config::ApprovalsConfig;
use crate::utils::truncate_chars;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Longest free-text field shown in a preview.
pub const PREVIEW_TEXT_MAX_CHARS: usize = 200;
pub const TIMEOUT_REASON: &str = "approval timed out";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalDecision {
    pub approved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ApprovalDecision {
    pub fn approve(reason: Option<String>) -> Self {
        Self {
            approved: true,
            reason,
        }
    }

    pub fn reject(reason: Option<String>) -> Self {
        Self {
            approved: false,
            reason,
        }
    }
}

/// A gated call waiting for a decision.
#[derive(Debug, Clone, Serialize)]
pub struct PendingApproval {
    pub id: String,
    pub tool: String,
    pub args: Map<String, Value>,
    pub preview: Map<String, Value>,
    pub created_at: DateTime<Utc>,
}

/// Handed to the waiting turn; owns the receiving end of the decision slot.
#[derive(Debug)]
pub struct ApprovalTicket {
    pub approval: PendingApproval,
    decision: oneshot::Receiver<ApprovalDecision>,
}

impl ApprovalTicket {
    pub fn id(&self) -> &str {
        &self.approval.id
    }
}

struct Entry {
    approval: PendingApproval,
    decision: oneshot::Sender<ApprovalDecision>,
}

pub struct ApprovalStore {
    next_id: AtomicU64,
    pending: Mutex<HashMap<String, Entry>>,
    timeout: Duration,
    remove_on_timeout: bool,
}

impl ApprovalStore {
    pub fn new(config: &ApprovalsConfig) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
            timeout: Duration::from_secs(config.timeout_secs),
            remove_on_timeout: config.remove_on_timeout,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Register a pending approval for `call`. Ids are `approval_<n>`,
    /// starting at 1 and strictly increasing for this store.
    pub fn create(&self, call: &ToolCall, preview: Map<String, Value>) -> ApprovalTicket {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        let approval = PendingApproval {
            id: format!("approval_{}", n),
            tool: call.name.clone(),
            args: call.args.clone(),
            preview,
            created_at: Utc::now(),
        };
        let (tx, rx) = oneshot::channel();
        self.lock().insert(
            approval.id.clone(),
            Entry {
                approval: approval.clone(),
                decision: tx,
            },
        );
        info!("approval {} requested for tool '{}'", approval.id, approval.tool);
        ApprovalTicket {
            approval,
            decision: rx,
        }
    }

    /// Deliver a decision. Returns false if the id is unknown or was
    /// already resolved. Never blocks.
    pub fn resolve(&self, id: &str, decision: ApprovalDecision) -> bool {
        let Some(entry) = self.lock().remove(id) else {
            debug!("resolve for unknown approval {}", id);
            return false;
        };
        info!(
            "approval {} {}",
            id,
            if decision.approved { "approved" } else { "rejected" }
        );
        if entry.decision.send(decision).is_err() {
            debug!("approval {} resolved after its waiter gave up", id);
        }
        true
    }

    /// Block until the ticket is resolved or the timeout elapses.
    ///
    /// Returns the decision and whether it was explicit. On timeout the
    /// decision is a synthetic rejection.
    pub async fn wait(&self, ticket: ApprovalTicket) -> (ApprovalDecision, bool) {
        let id = ticket.approval.id;
        match tokio::time::timeout(self.timeout, ticket.decision).await {
            Ok(Ok(decision)) => (decision, true),
            Ok(Err(_)) => {
                // sender dropped without a decision, treat like a timeout
                warn!("approval {} was dropped without a decision", id);
                (ApprovalDecision::reject(Some(TIMEOUT_REASON.to_string())), false)
            }
            Err(_) => {
                warn!("approval {} timed out after {:?}", id, self.timeout);
                if self.remove_on_timeout {
                    self.lock().remove(&id);
                }
                (ApprovalDecision::reject(Some(TIMEOUT_REASON.to_string())), false)
            }
        }
    }

    /// Live approvals, oldest first.
    pub fn pending(&self) -> Vec<PendingApproval> {
        let mut out: Vec<PendingApproval> =
            self.lock().values().map(|e| e.approval.clone()).collect();
        out.sort_by_key(|a| approval_number(&a.id));
        out
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn approval_number(id: &str) -> u64 {
    id.strip_prefix("approval_")
        .and_then(|n| n.parse().ok())
        .unwrap_or(u64::MAX)
}

/// The subset of a gated call's arguments shown to the approver.
pub fn preview(call: &ToolCall) -> Map<String, Value> {
    let fields: &[(&str, bool)] = match call.name.as_str() {
        SEND_EMAIL => &[("to", false), ("subject", false), ("body", true)],
        CREATE_EVENT => &[("title", false), ("start", false), ("end", false)],
        SEND_MESSAGE => &[("channel", false), ("text", true)],
        _ => &[],
    };
    let mut out = Map::new();
    for &(key, long_text) in fields {
        let Some(value) = call.str_arg(key) else {
            continue;
        };
        let value = if long_text {
            truncate_chars(value, PREVIEW_TEXT_MAX_CHARS, "...")
        } else {
            value.to_string()
        };
        out.insert(key.to_string(), Value::String(value));
    }
    out
}
