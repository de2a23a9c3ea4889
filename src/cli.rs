//! CLI argument parsing.
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::DEFAULT_CONFIG_FILE;

/// Global CLI arguments.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[arg(long, default_value = DEFAULT_CONFIG_FILE, global = true)]
    /// Detector configuration file. Defaults apply when it does not exist.
    pub config: PathBuf,

    #[arg(long, default_value_t = false, global = true)]
    /// Enable debug logging.
    pub debug: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Output rendering for detection results.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human readable report.
    #[default]
    Text,
    /// Detection result as pretty JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one detection pass against a page snapshot.
    Detect {
        #[arg(long)]
        /// Page snapshot (JSON) to inspect.
        snapshot: PathBuf,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        /// Output format.
        format: OutputFormat,

        #[arg(long)]
        /// Write the report to this file instead of stdout.
        out_file: Option<PathBuf>,
    },

    /// Replay a mutation script against a snapshot and print every monitor
    /// event as a JSON line.
    Watch {
        #[arg(long)]
        /// Page snapshot (JSON) to start from.
        snapshot: PathBuf,

        #[arg(long)]
        /// Mutation script (JSON) to replay.
        script: PathBuf,
    },
}
