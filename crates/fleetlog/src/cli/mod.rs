//! Command-line interface for fleetlog.
//!
//! This module provides the CLI structure and command handlers for the
//! `fleetlog` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    ArriveCommand, ConfigCommand, DepartCommand, HistoryCommand, StatusCommand, SyncCommand,
    TrackCommand,
};

/// fleetlog - Track vehicle trips from departure to arrival
///
/// Records one trip at a time per operator, samples the vehicle's position
/// into the trip's trail while it is open, and tracks which trips still
/// need delivery to the remote system of record.
#[derive(Debug, Parser)]
#[command(name = "fleetlog")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Open a new trip for an operator
    Depart(DepartCommand),

    /// Close an open trip with its arrival position
    Arrive(ArriveCommand),

    /// Show the open trip and store totals
    Status(StatusCommand),

    /// List an operator's trips, newest first
    History(HistoryCommand),

    /// Sample the open trip's route in the foreground until it closes
    Track(TrackCommand),

    /// Inspect and confirm sync state
    #[command(subcommand)]
    Sync(SyncCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}
