//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::cli::commands::{
    check::CheckArgs, replay::ReplayArgs, resolve::ResolveArgs, watch::WatchArgs,
};

/// Top-level command line.
#[derive(Parser)]
#[command(name = "stagegate")]
#[command(about = "Stagegate - keeps engagement clients on the route their quotes allow", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Load configuration from this file instead of .stagegate/
    #[arg(short, long, global = true, env = "STAGEGATE_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Compute the stage and route for a quote set, offline
    Resolve(ResolveArgs),

    /// Fetch an engagement's baseline and validate a route against it
    Check(CheckArgs),

    /// Run a baseline and an ordered event list through a live guard
    Replay(ReplayArgs),

    /// Guard a route against the canonical service until interrupted
    Watch(WatchArgs),
}
