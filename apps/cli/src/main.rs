//! fivecut command-line uploader.

mod commands;
mod config;
mod display;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use fivecut_coordinator::CoordinatorClient;
use tracing_subscriber::EnvFilter;

use config::Config;

/// Upload large videos through the fivecut coordination service
#[derive(Parser)]
#[command(name = "fivecut")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file path [default: platform config dir]
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Coordination service base URL (overrides config)
    #[arg(long, global = true)]
    api_base: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a file
    Upload {
        file: PathBuf,

        /// Part size in bytes
        #[arg(long)]
        chunk_size: Option<u64>,

        /// Parts uploaded at once
        #[arg(short = 'j', long)]
        concurrency: Option<usize>,

        /// Content type (inferred from the extension by default)
        #[arg(long)]
        content_type: Option<String>,
    },

    /// List recent uploads
    Recent {
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: u32,
    },

    /// Delete an uploaded object
    Delete { key: String },

    /// Check the coordination service
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(api_base) = cli.api_base {
        config.api_base = api_base;
    }
    tracing::debug!(api_base = %config.api_base, "configuration loaded");

    let client = CoordinatorClient::new(&config.api_base, config.credentials())?;

    match cli.command {
        Commands::Upload {
            file,
            chunk_size,
            concurrency,
            content_type,
        } => {
            if let Some(chunk_size) = chunk_size {
                config.chunk_size = chunk_size;
            }
            if let Some(concurrency) = concurrency {
                config.concurrency = concurrency;
            }
            commands::upload(client, &file, config.upload_options(), content_type).await?;
        }
        Commands::Recent { limit } => commands::recent(&client, limit).await?,
        Commands::Delete { key } => commands::delete(&client, &key).await?,
        Commands::Health => commands::health(&client).await?,
    }

    Ok(())
}
