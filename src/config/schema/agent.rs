use serde::{Deserialize, Serialize};
use std::collections::HashMap;

fn default_agent_name() -> String {
    "claude".to_string()
}

fn default_definitions() -> HashMap<String, AgentDefinition> {
    let mut map = HashMap::new();
    map.insert(
        "claude".to_string(),
        AgentDefinition {
            command: "claude".to_string(),
            args: vec!["-p".to_string()],
            streaming: false,
            env_passthrough: Vec::new(),
        },
    );
    map
}

/// Agents the switchboard can route turns to, keyed by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentsConfig {
    /// Agent selected at startup.
    #[serde(default = "default_agent_name")]
    pub default: String,
    #[serde(default = "default_definitions")]
    pub definitions: HashMap<String, AgentDefinition>,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            default: default_agent_name(),
            definitions: default_definitions(),
        }
    }
}

/// A command-line agent: the prompt goes to stdin, the answer comes from stdout.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AgentDefinition {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Forward stdout line by line as it arrives.
    #[serde(default)]
    pub streaming: bool,
    /// Extra environment variables the agent process may see (e.g. its API key).
    #[serde(default, rename = "envPassthrough")]
    pub env_passthrough: Vec<String>,
}

fn default_max_iterations() -> usize {
    5
}

fn default_turn_timeout() -> u64 {
    300
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnConfig {
    /// Maximum agent invocations per turn.
    #[serde(default = "default_max_iterations", rename = "maxIterations")]
    pub max_iterations: usize,
    /// Deadline applied to every agent and backend call inside a turn.
    #[serde(default = "default_turn_timeout", rename = "timeoutSecs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub compaction: CompactionConfig,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            timeout_secs: default_turn_timeout(),
            compaction: CompactionConfig::default(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_compaction_threshold() -> usize {
    30
}

fn default_keep_recent() -> usize {
    15
}

fn default_compaction_timeout() -> u64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Compact once user+assistant messages exceed this count.
    #[serde(default = "default_compaction_threshold")]
    pub threshold: usize,
    /// User+assistant messages kept verbatim after compaction.
    #[serde(default = "default_keep_recent", rename = "keepRecent")]
    pub keep_recent: usize,
    #[serde(default = "default_compaction_timeout", rename = "timeoutSecs")]
    pub timeout_secs: u64,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: default_compaction_threshold(),
            keep_recent: default_keep_recent(),
            timeout_secs: default_compaction_timeout(),
        }
    }
}

fn default_approval_timeout() -> u64 {
    600
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalsConfig {
    /// How long a gated call waits for a human before it is treated as rejected.
    #[serde(default = "default_approval_timeout", rename = "timeoutSecs")]
    pub timeout_secs: u64,
    /// Drop the pending entry when the wait times out. Off by default so a late
    /// decision still finds its entry.
    #[serde(default, rename = "removeOnTimeout")]
    pub remove_on_timeout: bool,
}

impl Default for ApprovalsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_approval_timeout(),
            remove_on_timeout: false,
        }
    }
}
