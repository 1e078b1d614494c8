//! deskhand CLI — user-facing binary for the deskhand remote desktop server.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use deskhand_input::LogInjector;
use deskhand_screen::HeadlessScreen;
use deskhand_server::{load_config, Config, Server};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "deskhand",
    about = "Remote desktop server: file transfer, shell commands and screen sessions",
    version,
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the deskhand server.
    Serve {
        /// Path to configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the configured control port.
        #[arg(short, long)]
        port: Option<u16>,

        /// Override the configured bind address.
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Print the default configuration as TOML.
    DefaultConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, port, bind } => serve(config, port, bind).await?,
        Commands::DefaultConfig => {
            print!("{}", toml::to_string_pretty(&Config::default())?);
        }
    }

    Ok(())
}

async fn serve(
    path: Option<PathBuf>,
    port: Option<u16>,
    bind: Option<String>,
) -> anyhow::Result<()> {
    let mut config = load_config(path.as_deref())?;
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(bind) = bind {
        config.server.bind = bind;
    }

    // RUST_LOG wins over the configured level when set.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.server.log_level.clone())),
        )
        .init();

    let server = Server::bind(
        config,
        Arc::new(HeadlessScreen::default()),
        Arc::new(LogInjector),
    )
    .await?;

    let shutdown = server.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, shutting down");
        }
        shutdown.cancel();
    });

    server.run().await?;
    Ok(())
}
