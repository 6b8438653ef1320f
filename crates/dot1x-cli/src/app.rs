//! CLI application definition using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// dot1x - IEEE 802.1X port access control
#[derive(Parser, Debug)]
#[command(
    name = "dot1x",
    author,
    version,
    about = "IEEE 802.1X port-based network access control",
    long_about = "Runs an 802.1X authenticator between switch ports and a RADIUS server,\n\
                  or a supplicant on a client interface. EAP methods: Identity,\n\
                  MD5-Challenge and EAP-TLS."
)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the authenticator
    Auth(RunArgs),

    /// Run the supplicant
    Supplicant(RunArgs),

    /// Configuration management
    Config(ConfigArgs),
}

/// Arguments shared by the two daemon roles
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write a default configuration file
    Init {
        /// Destination path
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Validate a configuration file
    Validate {
        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Print the effective configuration
    Show {
        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Output format
        #[arg(long, value_enum, default_value = "toml")]
        format: ConfigFormat,
    },
}

/// Output format for `config show`
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum ConfigFormat {
    /// TOML, as the file is written
    #[default]
    Toml,
    /// JSON
    Json,
}
