//! Position acquisition.
//!
//! This module defines the contract for anything that can answer "where is
//! the vehicle right now", plus the simulated implementation backed by
//! [`fleetlog_geosim`]. Real receivers fail in mundane ways, so the
//! contract treats acquisition errors as routine: callers retry, they do
//! not abort.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use fleetlog_geosim::RouteWalker;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::error::{Error, Result};
use crate::trip::Fix;

/// Source of position fixes.
///
/// Implementors provide the actual acquisition mechanism, whether a real
/// receiver or the deterministic simulator.
#[async_trait]
pub trait PositionProvider: Send + Sync {
    /// The name of this provider (for logging/debugging).
    fn name(&self) -> &'static str;

    /// Acquire a single fix.
    ///
    /// # Errors
    ///
    /// Returns an acquisition error when no fix can be produced right now.
    /// Such errors are transient; the caller decides whether to retry.
    async fn current_fix(&self) -> Result<Fix>;

    /// Stream fixes into `sender` at the given cadence until the receiving
    /// side hangs up.
    ///
    /// Failed acquisitions are skipped, not fatal.
    ///
    /// # Errors
    ///
    /// Returns an error only when the provider breaks in a way a retry will
    /// not fix; the default implementation never does.
    async fn watch(&self, interval: Duration, sender: mpsc::Sender<Fix>) -> Result<()> {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let fix = match self.current_fix().await {
                Ok(fix) => fix,
                Err(err) => {
                    debug!("Skipping fix from {}: {}", self.name(), err);
                    continue;
                }
            };
            if sender.send(fix).await.is_err() {
                return Ok(());
            }
        }
    }
}

/// Simulated provider that walks a deterministic route.
///
/// Each acquisition advances the walker by `step`, the simulated driving
/// time between fixes. Signal loss configured on the walker surfaces as an
/// acquisition error, which is exactly how a flaky receiver looks to
/// callers.
#[derive(Debug)]
pub struct GeoSimProvider {
    walker: Mutex<RouteWalker>,
    step_secs: f64,
}

impl GeoSimProvider {
    /// Wrap a route walker, advancing it by `step` per acquisition.
    #[must_use]
    pub fn new(walker: RouteWalker, step: Duration) -> Self {
        Self {
            walker: Mutex::new(walker),
            step_secs: step.as_secs_f64(),
        }
    }

    /// Build a provider whose route starts at the given fix.
    #[must_use]
    pub fn from_fix(fix: Fix, step: Duration) -> Self {
        Self::new(RouteWalker::starting_at(fix.lat, fix.lon), step)
    }
}

#[async_trait]
impl PositionProvider for GeoSimProvider {
    fn name(&self) -> &'static str {
        "geosim"
    }

    async fn current_fix(&self) -> Result<Fix> {
        let position = {
            let mut walker = self.walker.lock().unwrap_or_else(PoisonError::into_inner);
            walker.advance(self.step_secs)
        };

        match position {
            Some(position) => Ok(Fix::new(position.lat, position.lon)),
            None => Err(Error::fix_unavailable("simulated signal loss")),
        }
    }
}
