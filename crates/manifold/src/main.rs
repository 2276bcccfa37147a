//! Gateway entrypoint.
//!
//! `manifold serve [--config path]` loads the configuration, starts the
//! HTTP surface, and drains gracefully on SIGINT/SIGTERM. Exit code 0 on
//! clean shutdown, 1 on fatal init or runtime error.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use manifold_server::{GatewayConfig, GatewayServer};

#[derive(Parser)]
#[command(name = "manifold", about = "Unified LLM gateway", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the gateway server.
    Serve {
        /// Path to the JSON configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn init_tracing(config: &GatewayConfig) {
    if !config.logging.enabled {
        return;
    }
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.logging.level.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn serve(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let config = match &config_path {
        Some(path) => GatewayConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => GatewayConfig::default(),
    };

    init_tracing(&config);

    let server = GatewayServer::new(config).context("initializing gateway")?;
    let (addr, handle) = server.listen().await.context("binding listener")?;
    info!(%addr, "manifold gateway up");

    let shutdown = server.shutdown().clone();
    let _ = tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            let mut term =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("installing SIGTERM handler");
            tokio::select! {
                _ = ctrl_c => {}
                _ = term.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
        }
        info!("shutdown signal received, draining");
        shutdown.drain(None).await;
    });

    handle.await.context("server task failed")?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Serve { config } => serve(config).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("fatal: {e:#}");
            eprintln!("manifold: {e:#}");
            ExitCode::FAILURE
        }
    }
}
