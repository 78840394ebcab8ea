use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use parley_core::{AgentFactory, ChannelType, LocalAgentFactory, RemoteAgentFactory};
use parley_gateway::GatewayServer;

mod config;

use config::{AgentBackend, ParleyConfig};

#[derive(Parser)]
#[command(name = "parley")]
#[command(version)]
#[command(about = "Parley: route voice, chat, email and text input to an agent")]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway
    Start,

    /// Send one message through the configured agent, without HTTP
    Ask {
        /// Channel to deliver the message on (voice, chat, email, text)
        #[arg(long, default_value = "text")]
        channel: ChannelType,

        /// The message to send
        message: String,
    },

    /// Write the default config file
    Init,

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Init => cmd_init().await,
        Commands::Config => cmd_config(&cli.config).await,
        Commands::Start => cmd_start(&cli.config).await,
        Commands::Ask { channel, message } => cmd_ask(&cli.config, channel, &message).await,
    }
}

async fn cmd_init() -> Result<()> {
    let config_dir = config::config_dir();
    tokio::fs::create_dir_all(&config_dir)
        .await
        .with_context(|| format!("Failed to create config dir: {}", config_dir.display()))?;

    let config_path = config::default_config_path();
    if config_path.exists() {
        warn!("Config already exists at {}", config_path.display());
        return Ok(());
    }

    let default_config = include_str!("../../../config/default.toml");
    tokio::fs::write(&config_path, default_config).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(&config_path, std::fs::Permissions::from_mode(0o600)).await?;
    }

    info!("Created default config at {}", config_path.display());
    println!("Parley initialized at {}", config_dir.display());
    println!("Edit {} to choose an agent backend.", config_path.display());
    Ok(())
}

async fn cmd_config(config_path: &Option<PathBuf>) -> Result<()> {
    let cfg = ParleyConfig::load(config_path)?;
    println!("{}", toml::to_string_pretty(&cfg)?);
    Ok(())
}

async fn cmd_start(config_path: &Option<PathBuf>) -> Result<()> {
    let cfg = ParleyConfig::load(config_path)?;
    info!("Starting Parley gateway...");

    let factory = build_factory(&cfg)?;
    let bind = cfg.server.socket_addr()?;
    let server = GatewayServer::new(bind, factory).with_max_body_bytes(cfg.server.max_body_bytes);

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
        shutdown.cancel();
    });

    server.run(cancel).await
}

async fn cmd_ask(config_path: &Option<PathBuf>, channel: ChannelType, message: &str) -> Result<()> {
    let cfg = ParleyConfig::load(config_path)?;
    let factory = build_factory(&cfg)?;

    let mut agent = factory.create();
    agent
        .process(channel, message)
        .await
        .with_context(|| format!("Agent failed to process {} input", channel))?;
    let response = agent
        .generate_response()
        .await
        .context("Agent failed to generate a response")?;

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn build_factory(cfg: &ParleyConfig) -> Result<Arc<dyn AgentFactory>> {
    match cfg.agent.backend {
        AgentBackend::Local => {
            info!("Using local agent");
            Ok(Arc::new(LocalAgentFactory))
        }
        AgentBackend::Remote => {
            let remote = &cfg.agent.remote;
            let endpoint = remote.endpoint_url()?;
            info!("Using remote agent at {}", endpoint);
            let factory = RemoteAgentFactory::new(
                endpoint,
                remote.api_key.clone(),
                Duration::from_secs(remote.timeout_secs),
            )
            .context("Failed to build remote agent client")?;
            Ok(Arc::new(factory))
        }
    }
}
