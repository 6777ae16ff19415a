//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "repocache",
    version,
    about = "Session-scoped git repository cache with hint-driven prefetch",
    long_about = "repocache fetches git repositories through build sessions: within a \
                  session each repository is fetched once, and identifiers recorded \
                  against the repositories they needed let later sessions prefetch them."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (defaults to ~/.repocache/config.toml)
    #[arg(long, global = true, env = "REPOCACHE_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch repositories in one build session
    Fetch {
        /// Repository URLs
        #[arg(required = true)]
        urls: Vec<String>,
        /// Identifier whose recorded hints are prefetched, and which is
        /// associated with the fetched URLs afterwards
        #[arg(short, long = "seed")]
        seeds: Vec<String>,
        /// Do not save hints when the session closes
        #[arg(long)]
        no_save: bool,
    },

    /// Inspect the hint store
    Hints {
        #[command(subcommand)]
        action: HintsAction,
    },

    /// Manage the working-tree cache and snapshots
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum HintsAction {
    /// Show the repositories predicted for identifiers
    Show {
        #[arg(required = true)]
        identifiers: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Show working-tree and snapshot sizes
    Stats,
    /// Remove all working trees and snapshots
    Clean,
}

pub fn parse() -> Cli {
    Cli::parse()
}
