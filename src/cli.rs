//! CLI argument parsing using clap v4

use clap::{Parser, Subcommand};

/// Rally Host - pickleball scheduling host agent
///
/// Delegates availability questions to friend agents, collects their replies
/// and books a court once everyone agrees on a time.
#[derive(Parser, Debug)]
#[command(name = "rally-host")]
#[command(author, version, long_about = None)]
#[command(about = "Rally Host - pickleball scheduling host agent")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start an interactive conversation with the host agent
    Chat {
        /// Path to configuration file
        #[arg(short, long, env = "RALLY_CONFIG")]
        config: Option<String>,

        /// Session to continue (a new one is created when omitted)
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Send a single query and print the answer
    Ask {
        /// What to ask the host agent
        query: String,

        /// Path to configuration file
        #[arg(short, long, env = "RALLY_CONFIG")]
        config: Option<String>,

        /// Session to continue (a new one is created when omitted)
        #[arg(short, long)]
        session: Option<String>,

        /// Print every update as a JSON line
        #[arg(long)]
        json: bool,
    },

    /// Resolve the configured friend agents and list those that answered
    Peers {
        /// Path to configuration file
        #[arg(short, long, env = "RALLY_CONFIG")]
        config: Option<String>,
    },

    /// Display version and build information
    Version,

    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

/// Configuration subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigSubcommand {
    /// Display the current configuration
    Show {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Initialize a new configuration file
    Init {
        /// Path where to create the config file
        #[arg(short, long)]
        path: Option<String>,

        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Validate a configuration file
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        config: Option<String>,
    },
}
