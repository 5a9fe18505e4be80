use async_trait::async_trait;
use tokio::sync::mpsc;

/// Receives streamed text fragments from an agent while it generates.
pub type TokenSender = mpsc::UnboundedSender<String>;

/// A text-generating agent. It knows nothing about tools: it receives a
/// fully rendered prompt and returns free text that may contain
/// `TOOL_CALL:` lines.
#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, prompt: &str) -> anyhow::Result<String>;

    /// Whether `run_streaming` emits fragments before returning.
    fn supports_streaming(&self) -> bool {
        false
    }

    /// Generate while forwarding fragments to `tokens`. The returned string is
    /// the full response. Default falls back to `run` without streaming.
    async fn run_streaming(&self, prompt: &str, tokens: TokenSender) -> anyhow::Result<String> {
        drop(tokens);
        self.run(prompt).await
    }
}
