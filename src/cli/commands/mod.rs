mod subcommands;


use crate::agent::tools::build_executor;
use crate::agent::{ApprovalStore, TurnRunner};
use crate::config::{Config, load_config};
use crate::gateway::{self, GatewayState};
use crate::providers::AgentRegistry;
use crate::session::ConversationStore;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "switchboard")]
#[command(about = "Connects a text agent to email, calendar, contacts and Slack")]
#[command(version)]
pub struct Cli {
    /// Config file (defaults to $SWITCHBOARD_HOME/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config and create the data directories
    Init {
        /// Overwrite an existing config without asking
        #[arg(long)]
        force: bool,
    },
    /// Run the HTTP gateway
    Gateway {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Run a single turn from the terminal
    Ask {
        message: String,
        /// Continue an existing conversation
        #[arg(short, long)]
        conversation: Option<String>,
        /// Use this agent for the turn instead of the default
        #[arg(long)]
        agent: Option<String>,
        /// Approve every gated action without prompting
        #[arg(short, long)]
        yes: bool,
    },
    /// Inspect stored conversations
    Conversations {
        #[command(subcommand)]
        cmd: ConversationCommands,
    },
    /// Show configuration and backend status
    Status,
}

#[derive(Subcommand)]
enum ConversationCommands {
    /// List conversations, most recent first
    List,
    /// Print a conversation transcript
    Show { id: String },
    /// Delete a conversation
    Delete { id: String },
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Init { force } => {
            init(config_path, force)?;
        }
        Commands::Gateway { host, port } => {
            let config = load_config(config_path)?;
            let host = host.unwrap_or_else(|| config.gateway.host.clone());
            let port = port.unwrap_or(config.gateway.port);
            run_gateway(&config, &host, port).await?;
        }
        Commands::Ask {
            message,
            conversation,
            agent,
            yes,
        } => {
            let config = load_config(config_path)?;
            subcommands::ask(&config, message, conversation, agent, yes).await?;
        }
        Commands::Conversations { cmd } => {
            let config = load_config(config_path)?;
            subcommands::conversations_command(&config, cmd).await?;
        }
        Commands::Status => {
            let config = load_config(config_path)?;
            subcommands::status_command(&config, config_path).await?;
        }
    }

    Ok(())
}

/// Wire the store, agents, executor and approval gate from config.
pub fn build_runner(config: &Config) -> Result<Arc<TurnRunner>> {
    let store = ConversationStore::new(config.conversations_dir()?)
        .context("Failed to open conversation store")?;
    let agents = AgentRegistry::from_config(&config.agents)?;
    let executor = build_executor(&config.tools);
    let backends = executor.configured_backends();
    if backends.is_empty() {
        warn!("no tool backends configured; the agent can only chat");
    } else {
        info!("tool backends: {}", backends.join(", "));
    }
    Ok(Arc::new(TurnRunner::new(
        Arc::new(store),
        Arc::new(agents),
        executor,
        Arc::new(ApprovalStore::new(&config.approvals)),
        config.turn.clone(),
    )))
}

async fn run_gateway(config: &Config, host: &str, port: u16) -> Result<()> {
    let runner = build_runner(config)?;
    info!(
        "starting gateway with agent '{}' ({} available)",
        runner.agents().active_name(),
        runner.agents().names().len()
    );
    let mut handle = gateway::start(host, port, GatewayState::new(runner)).await?;
    println!("\u{1f500} switchboard gateway listening on http://{}:{}", host, port);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down gateway");
            handle.abort();
        }
        res = &mut handle => {
            if let Err(e) = res {
                warn!("gateway task ended: {}", e);
            }
        }
    }
    Ok(())
}

fn init(config_path: Option<&std::path::Path>, force: bool) -> Result<()> {
    println!("\u{1f500} Initializing switchboard...");

    let config_path = match config_path {
        Some(p) => p.to_path_buf(),
        None => crate::config::get_config_path()?,
    };
    if config_path.exists() && !force {
        println!(
            "\u{26a0}\u{fe0f}  Config already exists at {}",
            config_path.display()
        );
        println!("Overwrite? (y/N): ");
        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;
        if !input.trim().eq_ignore_ascii_case("y") {
            return Ok(());
        }
    }

    let config = Config::default();
    crate::config::save_config(&config, Some(config_path.as_path()))?;
    println!("\u{2713} Created config at {}", config_path.display());

    let conversations = config.conversations_dir()?;
    crate::utils::ensure_dir(&conversations)?;
    println!("\u{2713} Created {}", conversations.display());

    println!("\n\u{1f500} switchboard is ready!");
    println!("\nNext steps:");
    println!("  1. Point agents.definitions at your agent command in {}", config_path.display());
    println!("  2. Add Google and Slack credentials under tools, or set SWITCHBOARD_* env vars");
    println!("  3. Try it: switchboard ask \"What's on my calendar today?\"");

    Ok(())
}
