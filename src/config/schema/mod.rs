use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Generate a `Debug` impl that redacts sensitive fields.
///
/// Usage:
/// ```ignore
/// redact_debug!(MyStruct,
///     plain_field,
///     redact(secret_field),
/// );
/// ```
macro_rules! redact_debug {
    // Internal: emit a single .field() call
    (@field $builder:ident, $self:ident, redact($field:ident)) => {
        $builder.field(
            stringify!($field),
            &if $self.$field.is_empty() {
                "[empty]"
            } else {
                "[REDACTED]"
            },
        );
    };
    (@field $builder:ident, $self:ident, $field:ident) => {
        $builder.field(stringify!($field), &$self.$field);
    };

    // Internal: recursive TT muncher
    (@fields $builder:ident, $self:ident,) => {};
    (@fields $builder:ident, $self:ident, redact($field:ident), $($rest:tt)*) => {
        redact_debug!(@field $builder, $self, redact($field));
        redact_debug!(@fields $builder, $self, $($rest)*);
    };
    (@fields $builder:ident, $self:ident, $field:ident, $($rest:tt)*) => {
        redact_debug!(@field $builder, $self, $field);
        redact_debug!(@fields $builder, $self, $($rest)*);
    };

    // Entry point
    ($struct_name:ident, $($fields:tt)*) => {
        impl std::fmt::Debug for $struct_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let mut builder = f.debug_struct(stringify!($struct_name));
                redact_debug!(@fields builder, self, $($fields)*);
                builder.finish()
            }
        }
    };
}

// Submodules: declared after the macro so they can use `redact_debug!`
mod agent;
mod tools;

pub use agent::*;
pub use tools::*;


// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    18790
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Where conversation records live. Empty means `<home>/conversations`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    #[serde(default, rename = "conversationsDir")]
    pub conversations_dir: String,
}

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub agents: AgentsConfig,
    #[serde(default)]
    pub turn: TurnConfig,
    #[serde(default)]
    pub approvals: ApprovalsConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Config {
    /// Resolve the conversations directory, falling back to the home dir.
    pub fn conversations_dir(&self) -> anyhow::Result<PathBuf> {
        if self.storage.conversations_dir.is_empty() {
            Ok(crate::utils::get_switchboard_home()?.join("conversations"))
        } else {
            Ok(crate::utils::expand_home(&self.storage.conversations_dir))
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), crate::errors::SwitchboardError> {
        self.validate_agents()?;
        self.validate_turn()?;
        self.validate_approvals()?;
        self.validate_tools()?;
        Ok(())
    }

    fn validate_agents(&self) -> Result<(), crate::errors::SwitchboardError> {
        use crate::errors::SwitchboardError;

        if self.agents.definitions.is_empty() {
            return Err(SwitchboardError::Config(
                "agents.definitions must contain at least one agent".into(),
            ));
        }
        if !self.agents.definitions.contains_key(&self.agents.default) {
            return Err(SwitchboardError::Config(format!(
                "agents.default '{}' is not defined in agents.definitions",
                self.agents.default
            )));
        }
        for (name, def) in &self.agents.definitions {
            if def.command.trim().is_empty() {
                return Err(SwitchboardError::Config(format!(
                    "agents.definitions.{name}.command must not be empty"
                )));
            }
        }
        Ok(())
    }

    fn validate_turn(&self) -> Result<(), crate::errors::SwitchboardError> {
        use crate::errors::SwitchboardError;
        let t = &self.turn;

        if t.max_iterations == 0 {
            return Err(SwitchboardError::Config(
                "turn.maxIterations must be > 0".into(),
            ));
        }
        if t.max_iterations > 50 {
            return Err(SwitchboardError::Config(
                "turn.maxIterations is unreasonably large (> 50)".into(),
            ));
        }
        if t.timeout_secs == 0 {
            return Err(SwitchboardError::Config(
                "turn.timeoutSecs must be > 0".into(),
            ));
        }
        let c = &t.compaction;
        if c.enabled {
            if c.keep_recent == 0 {
                return Err(SwitchboardError::Config(
                    "turn.compaction.keepRecent must be > 0".into(),
                ));
            }
            if c.keep_recent >= c.threshold {
                return Err(SwitchboardError::Config(format!(
                    "turn.compaction.keepRecent ({}) must be less than threshold ({})",
                    c.keep_recent, c.threshold
                )));
            }
            if c.timeout_secs == 0 {
                return Err(SwitchboardError::Config(
                    "turn.compaction.timeoutSecs must be > 0".into(),
                ));
            }
        }
        Ok(())
    }

    fn validate_approvals(&self) -> Result<(), crate::errors::SwitchboardError> {
        if self.approvals.timeout_secs == 0 {
            return Err(crate::errors::SwitchboardError::Config(
                "approvals.timeoutSecs must be > 0".into(),
            ));
        }
        Ok(())
    }

    fn validate_tools(&self) -> Result<(), crate::errors::SwitchboardError> {
        use crate::errors::SwitchboardError;
        let g = &self.tools.google;
        if g.enabled
            && (g.client_id.is_empty() || g.client_secret.is_empty() || g.refresh_token.is_empty())
        {
            return Err(SwitchboardError::Config(
                "tools.google is enabled but clientId, clientSecret and refreshToken are not all set"
                    .into(),
            ));
        }
        if self.tools.slack.enabled && self.tools.slack.user_token.is_empty() {
            return Err(SwitchboardError::Config(
                "tools.slack is enabled but userToken is empty".into(),
            ));
        }
        Ok(())
    }
}
