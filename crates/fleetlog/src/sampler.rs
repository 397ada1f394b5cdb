//! Background location sampling.
//!
//! While a trip is open, the sampler wakes at a fixed cadence, acquires a
//! fix from the configured [`PositionProvider`], and appends it to the
//! trip's trail. Acquisition hiccups are absorbed and retried on the next
//! cycle; only the trip leaving its open state, or an explicit disarm,
//! stops the loop.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::{timeout, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::provider::PositionProvider;
use crate::store::TripStore;
use crate::trip::TripId;

/// Periodic sampler that records a trip's route while it is open.
pub struct LocationSampler {
    store: Arc<TripStore>,
    provider: Arc<dyn PositionProvider>,
    interval: Duration,
    fix_timeout: Duration,
    armed: Arc<AtomicBool>,
    cancel: Arc<Notify>,
    samples: Arc<AtomicU64>,
    current_trip: Arc<Mutex<Option<TripId>>>,
}

impl std::fmt::Debug for LocationSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationSampler")
            .field("provider", &self.provider.name())
            .field("interval", &self.interval)
            .field("fix_timeout", &self.fix_timeout)
            .field("armed", &self.armed.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl LocationSampler {
    /// Create a sampler over the given store and provider.
    ///
    /// `interval` is the cadence between samples; `fix_timeout` bounds how
    /// long a single acquisition may take before it counts as failed.
    #[must_use]
    pub fn new(
        store: Arc<TripStore>,
        provider: Arc<dyn PositionProvider>,
        interval: Duration,
        fix_timeout: Duration,
    ) -> Self {
        Self {
            store,
            provider,
            interval,
            fix_timeout,
            armed: Arc::new(AtomicBool::new(false)),
            cancel: Arc::new(Notify::new()),
            samples: Arc::new(AtomicU64::new(0)),
            current_trip: Arc::new(Mutex::new(None)),
        }
    }

    /// Get a cloneable handle for controlling this sampler from other tasks.
    #[must_use]
    pub fn handle(&self) -> SamplerHandle {
        SamplerHandle {
            armed: Arc::clone(&self.armed),
            cancel: Arc::clone(&self.cancel),
            samples: Arc::clone(&self.samples),
            current_trip: Arc::clone(&self.current_trip),
        }
    }

    /// Get the current status of the sampler.
    #[must_use]
    pub fn status(&self) -> SamplerStatus {
        let trip_id = *lock_slot(&self.current_trip);
        match trip_id {
            Some(trip_id) if self.armed.load(Ordering::SeqCst) => {
                SamplerStatus::armed(trip_id, self.samples.load(Ordering::SeqCst))
            }
            _ => SamplerStatus::disarmed(),
        }
    }

    /// Sample the given trip until it closes or the sampler is disarmed.
    ///
    /// Runs until completion; callers normally spawn it. The loop exits on
    /// its own when an append reports the trip missing or no longer open,
    /// which is how an arrival registered elsewhere reaches the sampler.
    /// A disarm between scheduling and an in-flight acquisition discards
    /// the acquired fix instead of appending it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SamplerAlreadyArmed`] if a sampling loop is already
    /// active on this sampler.
    pub async fn run(&self, trip_id: TripId) -> Result<()> {
        if self.armed.swap(true, Ordering::SeqCst) {
            return Err(Error::SamplerAlreadyArmed);
        }
        *lock_slot(&self.current_trip) = Some(trip_id);
        self.samples.store(0, Ordering::SeqCst);
        info!(
            "Location sampler armed for trip {} every {:?}",
            trip_id, self.interval
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first interval tick completes immediately; the departure fix
        // already covers the trip start, so consume it before the loop.
        ticker.tick().await;

        while self.armed.load(Ordering::SeqCst) {
            tokio::select! {
                _ = ticker.tick() => {}
                () = self.cancel.notified() => break,
            }
            if !self.armed.load(Ordering::SeqCst) {
                break;
            }

            let fix = match timeout(self.fix_timeout, self.provider.current_fix()).await {
                Ok(Ok(fix)) => fix,
                Ok(Err(err)) => {
                    warn!("Fix acquisition failed, retrying next cycle: {}", err);
                    continue;
                }
                Err(_) => {
                    let err = Error::FixTimeout {
                        timeout_ms: u64::try_from(self.fix_timeout.as_millis())
                            .unwrap_or(u64::MAX),
                    };
                    warn!("Fix acquisition failed, retrying next cycle: {}", err);
                    continue;
                }
            };

            if !self.armed.load(Ordering::SeqCst) {
                debug!("Disarmed during acquisition, discarding fix");
                break;
            }

            match self.store.append_sample(trip_id, fix) {
                Ok(()) => {
                    self.samples.fetch_add(1, Ordering::SeqCst);
                    trace!(
                        "Recorded sample at ({}, {}) for trip {}",
                        fix.lat,
                        fix.lon,
                        trip_id
                    );
                }
                Err(err) if err.is_not_found() || err.is_invalid_state() => {
                    info!("Trip {} is no longer open, sampler disarming", trip_id);
                    break;
                }
                Err(err) => {
                    warn!("Failed to persist sample, retrying next cycle: {}", err);
                }
            }
        }

        self.armed.store(false, Ordering::SeqCst);
        *lock_slot(&self.current_trip) = None;
        info!(
            "Location sampler disarmed after {} samples for trip {}",
            self.samples.load(Ordering::SeqCst),
            trip_id
        );
        Ok(())
    }

    /// Arm the sampler for the operator's open trip, if one exists.
    ///
    /// Covers the restart case: a trip left open by a previous process
    /// picks up sampling again. Returns the resumed trip id once sampling
    /// ends, or `None` immediately when the operator has no open trip.
    ///
    /// # Errors
    ///
    /// Returns an error if the open-trip lookup fails or the sampler is
    /// already armed.
    pub async fn resume(&self, operator_id: &str) -> Result<Option<TripId>> {
        match self.store.open_trip(operator_id)? {
            Some(trip) => {
                info!(
                    "Resuming sampling for open trip {} of operator {}",
                    trip.id, operator_id
                );
                let trip_id = trip.id;
                self.run(trip_id).await?;
                Ok(Some(trip_id))
            }
            None => {
                debug!(
                    "No open trip for operator {}, sampler stays disarmed",
                    operator_id
                );
                Ok(None)
            }
        }
    }
}

fn lock_slot(slot: &Mutex<Option<TripId>>) -> MutexGuard<'_, Option<TripId>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A lightweight, cloneable handle to control a running sampler from other
/// tasks.
#[derive(Debug, Clone)]
pub struct SamplerHandle {
    armed: Arc<AtomicBool>,
    cancel: Arc<Notify>,
    samples: Arc<AtomicU64>,
    current_trip: Arc<Mutex<Option<TripId>>>,
}

impl SamplerHandle {
    /// Ask the sampling loop to stop.
    ///
    /// The loop exits at its next scheduling point; an acquisition already
    /// in flight finishes but its fix is discarded.
    pub fn disarm(&self) {
        self.armed.store(false, Ordering::SeqCst);
        self.cancel.notify_waiters();
    }

    /// Check whether the sampler is currently armed.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    /// Number of samples recorded since the sampler was last armed.
    #[must_use]
    pub fn sample_count(&self) -> u64 {
        self.samples.load(Ordering::SeqCst)
    }

    /// The trip currently being sampled, if any.
    #[must_use]
    pub fn current_trip(&self) -> Option<TripId> {
        *lock_slot(&self.current_trip)
    }
}

/// Status of a location sampler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerStatus {
    /// Whether a sampling loop is active.
    pub armed: bool,

    /// The trip being sampled, when armed.
    pub trip_id: Option<TripId>,

    /// Samples recorded since the sampler was last armed.
    pub samples_recorded: u64,

    /// Human-readable status message.
    pub message: String,
}

impl SamplerStatus {
    /// Status for a sampler with no active loop.
    #[must_use]
    pub fn disarmed() -> Self {
        Self {
            armed: false,
            trip_id: None,
            samples_recorded: 0,
            message: "Sampler disarmed".to_string(),
        }
    }

    /// Status for an armed sampler.
    #[must_use]
    pub fn armed(trip_id: TripId, samples_recorded: u64) -> Self {
        Self {
            armed: true,
            trip_id: Some(trip_id),
            samples_recorded,
            message: "Sampler armed".to_string(),
        }
    }
}
