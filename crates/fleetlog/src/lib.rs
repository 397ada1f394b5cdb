//! `fleetlog` - local-first vehicle trip tracking
//!
//! This library provides the core functionality for recording vehicle trips
//! per operator: the departure/arrival lifecycle, periodic location sampling
//! into each open trip's route trail, and reconciliation of which trips
//! still need delivery to the remote system of record.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod provider;
pub mod sampler;
pub mod service;
pub mod store;
pub mod sync;
pub mod trip;
pub mod validate;

pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use provider::{GeoSimProvider, PositionProvider};
pub use sampler::{LocationSampler, SamplerHandle, SamplerStatus};
pub use service::{ArrivalRequest, DepartureRequest, TripService};
pub use store::{StoreStats, TripStore};
pub use sync::SyncReconciler;
pub use trip::{Fix, SyncState, Trip, TripId, TripStatus};
