//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::trip::TripId;

/// Depart command arguments.
#[derive(Debug, Args)]
pub struct DepartCommand {
    /// Operator id opening the trip
    #[arg(short, long)]
    pub operator: String,

    /// Operator display name
    #[arg(short, long)]
    pub name: String,

    /// Vehicle license plate (any case, e.g. abc1234 or BRA2E19)
    #[arg(short, long)]
    pub plate: String,

    /// Reason for the trip
    #[arg(short, long)]
    pub reason: String,

    /// Departure latitude; omit to acquire a fix from the simulated provider
    #[arg(long, allow_hyphen_values = true, requires = "lon")]
    pub lat: Option<f64>,

    /// Departure longitude
    #[arg(long, allow_hyphen_values = true, requires = "lat")]
    pub lon: Option<f64>,
}

/// Arrive command arguments.
#[derive(Debug, Args)]
pub struct ArriveCommand {
    /// Trip to close (defaults to the operator's open trip)
    #[arg(short, long)]
    pub trip: Option<TripId>,

    /// Operator whose open trip to close when --trip is not given
    #[arg(short, long, required_unless_present = "trip")]
    pub operator: Option<String>,

    /// Arrival latitude; omit to acquire a fix from the simulated provider
    #[arg(long, allow_hyphen_values = true, requires = "lon")]
    pub lat: Option<f64>,

    /// Arrival longitude
    #[arg(long, allow_hyphen_values = true, requires = "lat")]
    pub lon: Option<f64>,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Operator to report on (shows their open trip, if any)
    #[arg(short, long)]
    pub operator: Option<String>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// History command arguments.
#[derive(Debug, Args)]
pub struct HistoryCommand {
    /// Operator whose trips to list
    #[arg(short, long)]
    pub operator: String,

    /// Maximum number of trips to show
    #[arg(short, long, default_value = "20")]
    pub limit: usize,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Track command arguments.
#[derive(Debug, Args)]
pub struct TrackCommand {
    /// Operator whose open trip to sample
    #[arg(short, long)]
    pub operator: String,

    /// Override the sampling interval in milliseconds
    #[arg(long)]
    pub interval_ms: Option<u64>,
}

/// Sync commands.
#[derive(Debug, Subcommand)]
pub enum SyncCommand {
    /// List trips whose latest state has not been delivered yet
    Pending {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Confirm a trip was delivered at the given version
    Complete {
        /// Trip that was delivered
        #[arg(short, long)]
        trip: TripId,

        /// Version echoed from the delivered snapshot
        #[arg(long)]
        version: i64,
    },
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}
