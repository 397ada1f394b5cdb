//! Trip lifecycle types.
//!
//! A [`Trip`] is the unit of record: one vehicle usage from departure to
//! arrival, carrying the route sampled along the way. Trips serialize to
//! camelCase JSON, which is the layout sync collaborators consume.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::error::Error;

/// Unique identifier of a trip, assigned once at departure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TripId(Uuid);

impl TripId {
    /// Generate a fresh random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an identifier from its string form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTripId`] if the string is not a valid UUID.
    pub fn parse(s: &str) -> Result<Self, Error> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| Error::InvalidTripId {
                value: s.to_string(),
            })
    }
}

impl Default for TripId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TripId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for TripId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// One position sample: where the vehicle was at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    /// Latitude in decimal degrees.
    pub lat: f64,

    /// Longitude in decimal degrees.
    pub lon: f64,

    /// Capture time in milliseconds since the Unix epoch.
    pub ts: i64,
}

impl Fix {
    /// Build a fix stamped with the current wall-clock time.
    #[must_use]
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            ts: Utc::now().timestamp_millis(),
        }
    }

    /// Build a fix with an explicit timestamp.
    #[must_use]
    pub const fn at(lat: f64, lon: f64, ts: i64) -> Self {
        Self { lat, lon, ts }
    }

    /// Whether both coordinates fall inside their valid ranges.
    #[must_use]
    pub fn is_in_range(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lon)
    }

    /// Capture time as a UTC datetime, if the timestamp is representable.
    #[must_use]
    pub fn captured_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.ts).single()
    }
}

/// Error returned when a stored status or sync-state string is unrecognized.
#[derive(Debug, Error)]
#[error("unrecognized {kind} {value:?}")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

/// Lifecycle status of a trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TripStatus {
    /// The vehicle is out; samples may still be appended.
    Departed,

    /// The trip is closed. No further mutation is accepted.
    Arrived,
}

impl TripStatus {
    /// Stable string form used in storage and JSON.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Departed => "departed",
            Self::Arrived => "arrived",
        }
    }

    /// Whether the trip still accepts mutation.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Departed)
    }

    /// Whether the trip has reached its terminal state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Arrived)
    }
}

impl fmt::Display for TripStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TripStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "departed" => Ok(Self::Departed),
            "arrived" => Ok(Self::Arrived),
            other => Err(ParseEnumError {
                kind: "trip status",
                value: other.to_string(),
            }),
        }
    }
}

/// Whether a trip's latest state has been delivered to a sync collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    /// Local changes have not been delivered yet.
    Pending,

    /// The stored version has been delivered.
    Synced,
}

impl SyncState {
    /// Stable string form used in storage and JSON.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Synced => "synced",
        }
    }

    /// Whether the trip still awaits delivery.
    #[must_use]
    pub const fn is_pending(self) -> bool {
        matches!(self, Self::Pending)
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncState {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "synced" => Ok(Self::Synced),
            other => Err(ParseEnumError {
                kind: "sync state",
                value: other.to_string(),
            }),
        }
    }
}

/// A recorded vehicle trip.
///
/// The coordinate trail is append-only and never empty: the departure fix is
/// seeded at creation and every later mutation only adds to the tail. The
/// `version` counter increments on every data mutation and backs the
/// compare-and-set used by [`mark_synced`](crate::store::TripStore::mark_synced).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    /// Identifier assigned at departure.
    pub id: TripId,

    /// Operator who registered the departure.
    pub operator_id: String,

    /// Display name of the operator.
    pub operator_name: String,

    /// Normalized license plate of the vehicle.
    pub plate: String,

    /// Free-text purpose of the usage.
    pub reason: String,

    /// Position trail, ordered by capture time.
    pub coords: Vec<Fix>,

    /// Lifecycle status.
    pub status: TripStatus,

    /// Creation instant.
    pub created_at: DateTime<Utc>,

    /// Last mutation instant.
    pub updated_at: DateTime<Utc>,

    /// Delivery state toward sync collaborators.
    pub sync_state: SyncState,

    /// Mutation counter, starting at 1.
    pub version: i64,
}

impl Trip {
    /// Build a freshly departed trip seeded with its departure fix.
    ///
    /// Inputs are expected to be validated and normalized already; see
    /// [`crate::validate`].
    #[must_use]
    pub fn depart(
        operator_id: impl Into<String>,
        operator_name: impl Into<String>,
        plate: impl Into<String>,
        reason: impl Into<String>,
        fix: Fix,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: TripId::new(),
            operator_id: operator_id.into(),
            operator_name: operator_name.into(),
            plate: plate.into(),
            reason: reason.into(),
            coords: vec![fix],
            status: TripStatus::Departed,
            created_at: now,
            updated_at: now,
            sync_state: SyncState::Pending,
            version: 1,
        }
    }

    /// Whether the trip still accepts mutation.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }

    /// The fix captured at departure.
    #[must_use]
    pub fn departure_fix(&self) -> Option<Fix> {
        self.coords.first().copied()
    }

    /// The most recently appended fix.
    #[must_use]
    pub fn last_fix(&self) -> Option<Fix> {
        self.coords.last().copied()
    }

    /// The fix captured at arrival, present only once the trip is closed.
    #[must_use]
    pub fn arrival_fix(&self) -> Option<Fix> {
        if self.status.is_terminal() {
            self.last_fix()
        } else {
            None
        }
    }

    /// Number of recorded position samples.
    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.coords.len()
    }

    /// Milliseconds covered by the trail, first fix to last.
    #[must_use]
    pub fn elapsed_ms(&self) -> i64 {
        match (self.departure_fix(), self.last_fix()) {
            (Some(first), Some(last)) => last.ts - first.ts,
            _ => 0,
        }
    }
}
