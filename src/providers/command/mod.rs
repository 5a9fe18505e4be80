use crate::config::AgentDefinition;
use crate::errors::SwitchboardError;
use crate::providers::base::{Agent, TokenSender};
use crate::utils::subprocess::agent_command;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::Child;
use tracing::{debug, warn};

/// Max stderr kept for error messages.
const STDERR_SNIPPET_CHARS: usize = 500;

/// Runs an external command per prompt: prompt on stdin, answer on stdout.
pub struct CommandAgent {
    name: String,
    definition: AgentDefinition,
}

impl CommandAgent {
    pub fn new(name: impl Into<String>, definition: AgentDefinition) -> Self {
        Self {
            name: name.into(),
            definition,
        }
    }

    fn spawn(&self) -> Result<Child> {
        agent_command(&self.definition.command, &self.definition.env_passthrough)
            .args(&self.definition.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to start agent '{}'", self.definition.command))
    }

    async fn write_prompt(child: &mut Child, prompt: &str) -> Result<()> {
        let mut stdin = child
            .stdin
            .take()
            .context("Agent process has no stdin")?;
        let written = match stdin.write_all(prompt.as_bytes()).await {
            Ok(()) => stdin.shutdown().await,
            Err(e) => Err(e),
        };
        match written {
            Ok(()) => Ok(()),
            // Agent exited without reading; its exit status tells the story
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                debug!("agent closed stdin before reading the full prompt");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn check_status(&self, status: ExitStatus, stderr: &str) -> Result<()> {
        if status.success() {
            return Ok(());
        }
        let snippet: String = stderr.trim().chars().take(STDERR_SNIPPET_CHARS).collect();
        warn!("agent '{}' exited with {}: {}", self.name, status, snippet);
        let message = if snippet.is_empty() {
            format!("agent '{}' exited with {}", self.name, status)
        } else {
            format!("agent '{}' exited with {}: {}", self.name, status, snippet)
        };
        Err(SwitchboardError::Agent {
            message,
            // killed by a signal rather than a clean non-zero exit
            retryable: status.code().is_none(),
        }
        .into())
    }
}

#[async_trait]
impl Agent for CommandAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, prompt: &str) -> Result<String> {
        debug!("agent '{}': running with {} byte prompt", self.name, prompt.len());
        let mut child = self.spawn()?;
        Self::write_prompt(&mut child, prompt).await?;
        let output = child.wait_with_output().await?;
        let stderr = String::from_utf8_lossy(&output.stderr);
        self.check_status(output.status, &stderr)?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn supports_streaming(&self) -> bool {
        self.definition.streaming
    }

    async fn run_streaming(&self, prompt: &str, tokens: TokenSender) -> Result<String> {
        if !self.definition.streaming {
            drop(tokens);
            return self.run(prompt).await;
        }

        debug!("agent '{}': streaming with {} byte prompt", self.name, prompt.len());
        let mut child = self.spawn()?;
        Self::write_prompt(&mut child, prompt).await?;

        let stdout = child.stdout.take().context("Agent process has no stdout")?;
        let mut stderr = child.stderr.take().context("Agent process has no stderr")?;
        // Drain stderr concurrently so a chatty agent cannot block on a full pipe
        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf).await;
            buf
        });

        let mut full = String::new();
        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines.next_line().await? {
            let fragment = format!("{}\n", line);
            full.push_str(&fragment);
            // Receiver gone means nobody is listening; keep collecting
            let _ = tokens.send(fragment);
        }

        let status = child.wait().await?;
        let stderr = stderr_task.await.unwrap_or_default();
        self.check_status(status, &stderr)?;
        Ok(full.trim().to_string())
    }
}
