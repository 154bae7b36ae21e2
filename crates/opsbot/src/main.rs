//! opsbot: operations assistant.
//!
//! Runs WHOIS and HTTP response-header lookups for user-supplied hosts.
//! Every lookup passes an admission gate first: a sliding-window rate limit
//! per requester and globally, then a host policy check.

mod assistant;
mod commands;
mod config;
mod lookup;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use opsbot_core::Gate;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use assistant::Assistant;
use config::{Overrides, Source, DEFAULT_CONFIG_PATH};
use lookup::{HeaderFetcher, SystemLookup, WhoisRunner};

/// opsbot: operations assistant
#[derive(Parser, Debug)]
#[command(name = "opsbot", version, about = "WHOIS and HTTP header lookups behind an admission gate")]
struct Cli {
    /// Config file path
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Debug mode (same as --log-level debug)
    #[arg(short, long, global = true)]
    debug: bool,

    /// Maximum requests in the window, all requesters combined
    #[arg(long, global = true)]
    max_total: Option<usize>,

    /// Maximum requests in the window per requester (0 disables lookups)
    #[arg(long, global = true)]
    max_per_id: Option<usize>,

    /// Rate-limit window in seconds
    #[arg(long, global = true)]
    window: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check addresses against the host policy without any lookup
    Check {
        /// Print JSON lines instead of text
        #[arg(long)]
        json: bool,
        /// Hostnames or IP addresses
        #[arg(required = true)]
        addresses: Vec<String>,
    },

    /// Show WHOIS information for hosts
    Whois {
        #[arg(required = true)]
        hosts: Vec<String>,
    },

    /// Show HTTP response headers of sites ([http[s]://]host[:port][/])
    Headers {
        #[arg(required = true)]
        sites: Vec<String>,
    },

    /// Read messages from stdin as a chat requester
    Shell {
        /// Requester identity
        #[arg(long = "as", default_value = "local")]
        requester: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let overrides = Overrides {
        max_total: cli.max_total,
        max_per_id: cli.max_per_id,
        window: cli.window,
        debug: cli.debug,
    };
    let (config, source) = match config::load(&cli.config, &overrides) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("opsbot: {e:#}");
            std::process::exit(1);
        }
    };

    // Initialize tracing
    let level = if config.bot.debug { "debug" } else { cli.log_level.as_str() };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match &source {
        Source::File(path) => info!(path = %path.display(), "loaded config file"),
        Source::Defaults(path) => {
            info!(path = %path.display(), "config file not found, using defaults")
        }
    }
    debug!(limits = ?config.limits, "rate limits");

    let (gate, rejected) = Gate::from_config(&config);
    if !rejected.is_empty() {
        warn!(count = rejected.len(), "some restricted networks were ignored");
    }
    let gate = Arc::new(gate);

    match run(cli.command, &config, gate).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(2),
        Err(e) => {
            error!("{:#}", e);
            eprintln!("opsbot: {e:#}");
            std::process::exit(1);
        }
    }
}

/// Run a subcommand. `Ok(false)` means the command completed but reported a
/// negative result (an address that is not ok).
async fn run(command: Command, config: &opsbot_core::Config, gate: Arc<Gate<String>>) -> Result<bool> {
    match command {
        Command::Check { json, addresses } => commands::check::run(&gate, &addresses, json),
        Command::Whois { hosts } => {
            let assistant = build_assistant(config, gate)?;
            commands::lookup::run_whois(&assistant, &hosts).await?;
            Ok(true)
        }
        Command::Headers { sites } => {
            let assistant = build_assistant(config, gate)?;
            commands::lookup::run_headers(&assistant, &sites).await?;
            Ok(true)
        }
        Command::Shell { requester } => {
            let assistant = build_assistant(config, gate)?;
            commands::shell::run(&assistant, &requester).await?;
            Ok(true)
        }
    }
}

fn build_assistant(config: &opsbot_core::Config, gate: Arc<Gate<String>>) -> Result<Assistant<SystemLookup>> {
    let bot = &config.bot;
    let whois = WhoisRunner::new(bot.whois_command.clone(), bot.max_response_bytes);
    let headers = HeaderFetcher::new(Duration::from_secs(bot.http_timeout_secs), bot.max_header_bytes)
        .context("failed to set up HTTP client")?;
    Ok(Assistant::new(gate, SystemLookup::new(whois, headers)))
}
