//! Rally Host - pickleball scheduling host agent
//!
//! Entry point for the `rally-host` binary.

use std::io::Write;

use clap::Parser;
use futures_util::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use rally_host::cli::{Cli, Commands, ConfigSubcommand};
use rally_host::config::{self, HostConfig};
use rally_host::error::{Error, Result};
use rally_host::host::{build_registry, HostAgent, StreamUpdate};
use rally_host::{logging, version};

fn main() -> Result<()> {
    // Parse CLI arguments first (before logging, so we know verbosity)
    let cli = Cli::parse();

    // Commands that don't need the agent use simple setup
    match &cli.command {
        Commands::Version => {
            version::print_version();
            return Ok(());
        }
        Commands::Config { subcommand } => {
            logging::init_simple(tracing::Level::WARN)?;
            if let Err(e) = handle_config_command(subcommand.clone()) {
                eprint!("{}", e.format_for_terminal());
                std::process::exit(e.exit_code());
            }
            return Ok(());
        }
        _ => {}
    }

    let config_path = match &cli.command {
        Commands::Chat { config, .. } | Commands::Ask { config, .. } | Commands::Peers { config } => {
            config.clone()
        }
        _ => None,
    };

    let config = match HostConfig::load(config_path.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprint!("{}", e.format_for_terminal());
            std::process::exit(e.exit_code());
        }
    };

    // The guards must be kept alive for the lifetime of the program
    let _log_guards = logging::init_logging(&config.logging, cli.verbose, cli.quiet)?;

    let build = version::build_info();
    info!(
        version = %build.full_version(),
        target = %build.target,
        profile = %build.profile,
        "Starting Rally Host"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("rally-host")
        .build()
        .map_err(|e| Error::Internal(format!("Failed to create async runtime: {}", e)))?;

    let result = runtime.block_on(async move {
        match cli.command {
            Commands::Chat { session, .. } => run_chat(config, session, cli.quiet).await,
            Commands::Ask { query, session, json, .. } => run_ask(config, query, session, json).await,
            Commands::Peers { .. } => list_peers(config).await,
            Commands::Version | Commands::Config { .. } => Ok(()),
        }
    });

    if let Err(e) = result {
        eprint!("{}", e.format_for_terminal());
        std::process::exit(e.exit_code());
    }

    Ok(())
}

fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Interactive loop: one line in, one answer out
async fn run_chat(config: HostConfig, session: Option<String>, quiet: bool) -> Result<()> {
    let agent = HostAgent::create(&config).await?;
    let session_id = session.unwrap_or_else(new_session_id);
    info!(session_id = %session_id, peers = agent.registry().len(), "Chat session started");

    if !quiet {
        println!("Rally host ready. Friends online: {}", friends_line(&agent));
        println!("Session {}. Type 'exit' to leave.", session_id);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                None
            }
        };
        let Some(line) = line else { break };
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if matches!(query, "exit" | "quit") {
            break;
        }

        let mut updates = agent.stream(query, &session_id);
        let mut announced = false;
        while let Some(update) = updates.next().await {
            match update {
                StreamUpdate::Working { updates } => {
                    if !quiet && !announced {
                        eprintln!("{}", updates);
                        announced = true;
                    }
                }
                StreamUpdate::Complete { content } => println!("{}\n", content),
            }
        }
    }

    info!(session_id = %session_id, "Chat session ended");
    Ok(())
}

async fn run_ask(config: HostConfig, query: String, session: Option<String>, json: bool) -> Result<()> {
    let agent = HostAgent::create(&config).await?;
    let session_id = session.unwrap_or_else(new_session_id);

    let mut updates = agent.stream(&query, &session_id);
    while let Some(update) = updates.next().await {
        if json {
            println!("{}", serde_json::to_string(&update)?);
        } else if let StreamUpdate::Complete { content } = update {
            println!("{}", content);
        }
    }
    Ok(())
}

async fn list_peers(config: HostConfig) -> Result<()> {
    let registry = build_registry(&config.peers).await?;

    if registry.is_empty() {
        warn!(addresses = config.peers.addresses.len(), "No peers registered");
        println!("No friend agents answered ({} addresses tried).", config.peers.addresses.len());
        return Ok(());
    }

    println!("Registered friend agents ({}):", registry.len());
    for name in registry.names() {
        if let Some(connection) = registry.get(name) {
            println!("  {:<20} {}", name, connection.address());
            if !connection.card().description.is_empty() {
                println!("  {:<20} {}", "", connection.card().description);
            }
        }
    }
    Ok(())
}

fn friends_line(agent: &HostAgent) -> String {
    let names: Vec<&str> = agent.registry().names().collect();
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(", ")
    }
}

/// Handle configuration subcommands
fn handle_config_command(subcommand: ConfigSubcommand) -> Result<()> {
    match subcommand {
        ConfigSubcommand::Show { config } => {
            let cfg = HostConfig::load(config.as_deref())?;
            println!("{}", toml::to_string_pretty(&cfg)?);
        }
        ConfigSubcommand::Init { path, force } => {
            let written = config::init_config(path.as_deref(), force)?;
            println!("Configuration written to {}", written.display());
        }
        ConfigSubcommand::Validate { config } => {
            HostConfig::load(config.as_deref())?;
            println!("Configuration is valid.");
        }
    }

    Ok(())
}
