//! webpush-relay binary entry point.
//!
//! `serve` (the default) runs the HTTP relay; `generate-keys` prints a fresh
//! VAPID keypair and exits.

use std::path::Path;

use anyhow::Result;
use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use webpush_relay::{commands, config, server, Config};

/// Global allocator configured per M-MIMALLOC-APPS guideline.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser)]
#[command(name = "webpush-relay")]
#[command(version)]
#[command(about = "Web push relay: register browser subscriptions and broadcast to them")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP relay (default)
    Serve {
        /// Listen port (overrides PORT)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Generate a VAPID keypair and print it
    GenerateKeys,
}

fn init_logging() -> Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    builder.format_timestamp_secs();

    if let Ok(path) = std::env::var("WEBPUSH_RELAY_LOG_FILE") {
        let log_file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| anyhow::anyhow!("Failed to open log file {path}: {e}"))?;
        builder.target(env_logger::Target::Pipe(Box::new(log_file)));
    }

    builder.init();
    Ok(())
}

/// Seed the environment from `./.env` when present.
fn load_dotenv() -> Result<()> {
    let path = Path::new(".env");
    if config::load_dotenv(path)? {
        log::info!("Loaded environment from {}", path.display());
    } else {
        log::debug!("No .env file found, using the process environment");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve { port: None }) {
        Commands::GenerateKeys => {
            commands::keygen::run();
        }
        Commands::Serve { port } => {
            init_logging()?;
            load_dotenv()?;

            let mut config = Config::from_env()?;
            if let Some(port) = port {
                config.port = port;
            }

            log::info!(
                "webpush-relay v{} starting (state file {})",
                env!("CARGO_PKG_VERSION"),
                config.subscriptions_file.display()
            );
            server::serve(config).await?;
        }
    }

    Ok(())
}
