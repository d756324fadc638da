//! Kino CLI - Headless playback engine tool
//!
//! Features:
//! - Source capability probing (adapter and DRM negotiation)
//! - Playback session simulation against an in-memory sink
//! - Rendition switch verification

use clap::{Parser, Subcommand};

mod commands;
mod output;

/// Kino CLI - Playback engine toolkit
#[derive(Parser)]
#[command(name = "kino-cli")]
#[command(author = "Purple Squirrel Media")]
#[command(version)]
#[command(about = "Probe sources and simulate playback sessions", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(short, long, global = true, default_value = "text")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report which sources can be played and with which DRM protocol
    Probe {
        /// Path or http(s) URL of a media config (JSON)
        config: String,
    },

    /// Run a playback session against an in-memory sink
    Simulate {
        /// Path or http(s) URL of a media config (JSON)
        config: String,

        /// Start position in seconds
        #[arg(short, long)]
        start: Option<f64>,

        /// Video track index to switch to after loading
        #[arg(long)]
        switch_to: Option<usize>,

        /// Seek here before switching
        #[arg(short, long)]
        position: Option<f64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "info" };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(level)
        .with_writer(std::io::stderr);
    if output::OutputFormat::from(cli.format.as_str()) == output::OutputFormat::Json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    kino_engine::init();

    match cli.command {
        Commands::Probe { config } => {
            commands::probe(&config, &cli.format).await?;
        }
        Commands::Simulate { config, start, switch_to, position } => {
            commands::simulate(&config, start, switch_to, position, &cli.format).await?;
        }
    }

    Ok(())
}
