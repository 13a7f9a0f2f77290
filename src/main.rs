//! Knotwork CLI entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "knotwork")]
#[command(about = "Merge extracted facts into a ranked, analyzed knowledge graph", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Engine config file (defaults to ./knotwork.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "7890")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Directory for graph snapshots
        #[arg(long, default_value = ".knotwork")]
        data_dir: PathBuf,
    },
    /// Merge candidate files into one graph view and print or save it
    Build {
        /// JSON candidate files, each `{ "nodes": [...], "links": [...] }`
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Write the response here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Node ids that must stay visible
        #[arg(long = "pin")]
        pinned: Vec<String>,

        #[arg(long)]
        node_limit: Option<i64>,

        #[arg(long)]
        link_limit: Option<i64>,
    },
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    // A missing .env is normal.
    let _ = dotenvy::dotenv();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!("knotwork={}", log_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Knotwork v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Serve { port, host, data_dir } => {
            commands::serve(cli.config, host, port, data_dir).await
        }
        Commands::Build {
            inputs,
            output,
            pinned,
            node_limit,
            link_limit,
        } => {
            let request = commands::BuildRequest {
                inputs,
                output,
                pinned,
                node_limit,
                link_limit,
            };
            commands::build(cli.config, request).await
        }
        Commands::Version => {
            println!("Knotwork v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
