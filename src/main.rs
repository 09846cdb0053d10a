use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use coursebell::config::Config;

mod commands;

#[derive(Parser)]
#[command(
    name = "coursebell",
    version,
    about = "Calendar-driven class reminders and daily digests over LINE",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (optional; environment variables override it)
    #[arg(short, long, global = true, default_value = "coursebell.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the lookahead scan and the daily digest until Ctrl-C
    Run,

    /// Run one lookahead scan now
    Scan,

    /// Send today's digest now
    Digest,

    /// Parse an event description and print the result
    Parse {
        /// Description text
        text: String,
    },

    /// Resolve a name against the roster
    Resolve {
        /// Name as written in a description
        name: String,
    },

    /// Check the calendar store, the roster and the messaging transport
    Check,

    /// Send one test message
    Notify {
        /// Recipient address (LINE user id)
        address: String,

        /// Message text
        text: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(&cli.config)?;
    let log_format = cli.log_format.as_deref().unwrap_or(&config.logging.format);

    // Initialize tracing/logging
    setup_tracing(log_format, &config.logging.level, cli.verbose)?;

    tracing::debug!(config = %cli.config.display(), "Configuration loaded");

    match cli.command {
        Commands::Run => commands::run(config).await?,
        Commands::Scan => commands::scan(config).await?,
        Commands::Digest => commands::digest(config).await?,
        Commands::Parse { text } => commands::parse(config, text).await?,
        Commands::Resolve { name } => {
            tracing::info!(name = %name, "Starting resolve command");
            commands::resolve(config, name).await?
        }
        Commands::Check => commands::check(config).await?,
        Commands::Notify { address, text } => {
            tracing::info!(recipient = %address, "Starting notify command");
            commands::notify(config, address, text).await?
        }
    }

    Ok(())
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("coursebell=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("coursebell={level},warn")))
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}
