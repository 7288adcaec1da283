//! Command line interface definition

use clap::{Parser, Subcommand};
use sideload_types::ColorChoice;
use std::path::PathBuf;

/// sideload - install and refresh apps through a companion helper
#[derive(Parser)]
#[command(name = "sideload")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Install and refresh sideloaded apps through a companion helper")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Global arguments available for all commands
#[derive(Parser)]
pub struct GlobalArgs {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Write structured debug logs to the data directory
    #[arg(long, global = true)]
    pub debug: bool,

    /// Color output control
    #[arg(long, global = true, value_enum)]
    pub color: Option<ColorChoice>,

    /// Use alternate config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Helper to use instead of the configured ones (host[:port])
    #[arg(long, global = true, value_name = "ADDR")]
    pub helper: Option<String>,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// List the apps offered by the catalog
    Apps,

    /// Install an app from the catalog
    #[command(alias = "i")]
    Install {
        /// Bundle identifier of the catalog app
        identifier: String,
    },

    /// Re-sign and reinstall installed apps before their profiles expire
    #[command(alias = "r")]
    Refresh {
        /// Apps to refresh (empty = every installed app)
        identifiers: Vec<String>,
    },

    /// List installed apps and their expiration dates
    #[command(alias = "ls")]
    Installed,

    /// Sign in with the developer account used for signing
    SignIn {
        /// Forget the stored account instead of signing in
        #[arg(long)]
        reset: bool,
    },

    /// Drop records of apps that are no longer on the device
    Update,
}
