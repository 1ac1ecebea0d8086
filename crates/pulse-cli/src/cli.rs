//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Coding activity tracker.
///
/// Classifies editor changes as typed, pasted, or AI-inserted and reports
/// where your characters and focus time went.
#[derive(Debug, Parser)]
#[command(name = "pulse", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show what has been recorded so far.
    Status,

    /// Feed editor events (JSON lines) through the engine.
    Ingest {
        /// Read events from this file instead of stdin.
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Show activity windows, streaks, and heatmaps.
    Report {
        /// Output as JSON.
        #[arg(long)]
        json: bool,

        /// Report as of this instant (ISO 8601 or e.g. '2 hours ago').
        #[arg(long)]
        now: Option<String>,
    },
}
