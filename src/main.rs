use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use herald::commands::{self, CommandError};
use herald::config::Config;
use herald::engine::CycleOptions;
use herald::notify::Notifier;
use herald::scheduler;
use herald::storage::{Database, DatabaseError};
use herald::util::validate_url;

/// Get the config directory path (~/.config/herald/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    let config_dir = PathBuf::from(home).join(".config").join("herald");
    Ok(config_dir)
}

#[derive(Parser, Debug)]
#[command(
    name = "herald",
    about = "Feed watcher that announces new RSS/Atom articles to chat channels"
)]
struct Args {
    /// Path to the config file (defaults to ~/.config/herald/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the polling daemon
    Run,
    /// Subscribe a channel to a feed URL
    Add {
        /// Feed URL (http/https)
        url: String,
        /// Channel to announce new articles in
        #[arg(long)]
        channel: String,
    },
    /// Unsubscribe a channel from a feed URL
    Remove {
        /// Feed URL previously added
        url: String,
        /// Channel to stop announcing in
        #[arg(long)]
        channel: String,
    },
    /// List the feeds a channel is subscribed to
    List {
        /// Channel to list
        #[arg(long)]
        channel: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing for debug logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    // Set up config directory
    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
    }

    let config_path = args
        .config
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let db_path = config
        .database_path
        .clone()
        .unwrap_or_else(|| config_dir.join("herald.db").to_string_lossy().into_owned());

    let db = match Database::open(&db_path).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!(
                "Error: Another instance of herald appears to be running. Please close it and try again."
            );
            std::process::exit(1);
        }
        Err(e) => {
            return Err(anyhow::anyhow!("Failed to open database: {}", e));
        }
    };

    let client = reqwest::Client::new();
    let fetch_timeout = Duration::from_secs(config.fetch_timeout_secs);

    match args.command {
        Command::Run => {
            let token = config.bot_token().context(
                "No bot token configured: set HERALD_BOT_TOKEN or bot_token in config.toml",
            )?;
            let notifier = Notifier::new(client.clone(), config.api_base.clone(), token);
            let opts = CycleOptions {
                fetch_timeout,
                max_concurrent_fetches: config.max_concurrent_fetches,
            };

            let handle = scheduler::spawn_scheduler(
                db,
                client,
                notifier,
                Duration::from_secs(config.poll_interval_secs),
                opts,
            );

            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for shutdown signal")?;
            println!("Shutting down...");
            handle
                .stop()
                .await
                .map_err(|e| anyhow::anyhow!("Scheduler task failed: {}", e))?;
        }
        Command::Add { url, channel } => {
            validate_url(&url).with_context(|| format!("Refusing to add {}", url))?;
            let reply = commands::add_feed(&db, &client, fetch_timeout, &channel, &url).await?;
            println!("{}", reply);
        }
        Command::Remove { url, channel } => {
            match commands::remove_feed(&db, &channel, &url).await {
                Ok(reply) => println!("{}", reply),
                Err(e @ CommandError::UnknownSite(_)) => {
                    eprintln!("{}", e);
                    std::process::exit(1);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Command::List { channel } => {
            let reply = commands::list_feeds(&db, &channel).await?;
            println!("{}", reply);
        }
    }

    Ok(())
}
