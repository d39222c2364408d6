//! tabrelay - MCP server that relays browser tab tools to extensions
//!
//! Subcommands:
//! - `tabrelay mcp` (default) - Serve MCP over stdio, accept extensions over WebSocket
//! - `tabrelay config` - Print the effective configuration

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tabconf::TabConfig;
use tabrelay::{listener, stdio, telemetry, Relay};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "tabrelay")]
#[command(about = "Relay MCP browser tools to connected browser extensions")]
#[command(version)]
struct Cli {
    /// Config file, loaded after system and user config
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve MCP over stdio and accept browser extensions over WebSocket
    Mcp(McpArgs),

    /// Print the effective configuration as TOML
    Config,
}

#[derive(Args, Default)]
struct McpArgs {
    /// WebSocket port the extension connects to
    #[arg(short, long)]
    port: Option<u16>,

    /// Address to bind the WebSocket listener on
    #[arg(long)]
    host: Option<String>,

    /// How long to wait for a browser to answer, in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,
}

impl McpArgs {
    fn apply(self, config: &mut TabConfig) {
        if let Some(port) = self.port {
            config.listener.port = port;
        }
        if let Some(host) = self.host {
            config.listener.host = host;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.relay.timeout_ms = timeout_ms;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mut config, sources) = TabConfig::load_with_sources_from(cli.config.as_deref())
        .context("Failed to load configuration")?;

    match cli.command.unwrap_or(Commands::Mcp(McpArgs::default())) {
        Commands::Config => {
            for path in &sources.files {
                println!("# loaded: {}", path.display());
            }
            for var in &sources.env_overrides {
                println!("# env: {}", var);
            }
            print!("{}", config.to_toml());
            Ok(())
        }
        Commands::Mcp(args) => {
            args.apply(&mut config);
            run_mcp(config).await
        }
    }
}

async fn run_mcp(config: TabConfig) -> Result<()> {
    let telemetry = telemetry::init(&config.telemetry)?;

    info!(
        listener = %config.listener.bind_addr(),
        timeout_ms = config.relay.timeout_ms,
        "tabrelay starting"
    );

    let relay = Arc::new(Relay::new(&config.relay));
    let socket = listener::bind(&config.listener.bind_addr()).await?;

    let shutdown = CancellationToken::new();
    let listener_task = tokio::spawn(listener::serve(
        socket,
        Arc::clone(&relay),
        shutdown.clone(),
    ));

    let served = stdio::run(Arc::clone(&relay)).await;

    shutdown.cancel();
    relay.shutdown();
    match tokio::time::timeout(Duration::from_secs(2), listener_task).await {
        Ok(Ok(Err(e))) => warn!(error = %e, "Listener exited with error"),
        Ok(Err(e)) => warn!(error = %e, "Listener task panicked"),
        Err(_) => warn!("Listener did not stop within 2s"),
        Ok(Ok(Ok(()))) => {}
    }

    telemetry.shutdown();
    served
}
