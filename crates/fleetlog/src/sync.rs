//! Sync reconciliation.
//!
//! Trips carry a dirty flag: every store mutation re-arms `sync_state`
//! to pending and bumps the record version in the same transaction. An
//! external sync collaborator drains the pending set through
//! [`SyncReconciler`], delivers each snapshot, and echoes the snapshot's
//! version back to confirm. A version that moved in the meantime makes
//! the confirmation a no-op so the newer state gets delivered on the
//! next pass.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::Result;
use crate::store::TripStore;
use crate::trip::{Trip, TripId};

/// Thin handle over the store for the sync collaborator.
///
/// Deliberately narrow: the collaborator can list what is dirty, read a
/// snapshot to deliver, and confirm a delivery. It never mutates trip
/// content.
#[derive(Debug, Clone)]
pub struct SyncReconciler {
    store: Arc<TripStore>,
}

impl SyncReconciler {
    /// Create a reconciler over the given store.
    #[must_use]
    pub fn new(store: Arc<TripStore>) -> Self {
        Self { store }
    }

    /// Ids of trips whose latest state has not been delivered yet,
    /// oldest update first.
    ///
    /// Each call re-issues the query, so a drain loop that restarts
    /// always sees the current pending set.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_pending(&self) -> Result<Vec<TripId>> {
        self.store.list_pending()
    }

    /// The full trip record the collaborator should deliver.
    ///
    /// The snapshot carries the `version` the collaborator must echo
    /// back to [`SyncReconciler::mark_synced`]. Returns `None` when the
    /// trip does not exist (deleted between listing and delivery).
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    pub fn snapshot(&self, trip_id: TripId) -> Result<Option<Trip>> {
        self.store.get(trip_id)
    }

    /// Confirm that the snapshot at `observed_version` was delivered.
    ///
    /// Flips the trip to synced only if the stored version still matches;
    /// a mismatch means the trip changed after the snapshot was taken, so
    /// the confirmation is dropped and `false` comes back. The caller
    /// simply retries on its next pass.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::TripNotFound`] if the trip does not exist,
    /// or an error if the update fails.
    pub fn mark_synced(&self, trip_id: TripId, observed_version: i64) -> Result<bool> {
        let confirmed = self.store.mark_synced(trip_id, observed_version)?;
        if confirmed {
            info!("Trip {} confirmed synced at version {}", trip_id, observed_version);
        } else {
            debug!(
                "Trip {} changed since version {}, sync confirmation dropped",
                trip_id, observed_version
            );
        }
        Ok(confirmed)
    }

    /// Number of trips currently awaiting delivery.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn pending_count(&self) -> Result<usize> {
        Ok(self.list_pending()?.len())
    }
}
