//! Trip storage for fleetlog.
//!
//! This module provides `SQLite`-based persistent storage for trips and
//! their coordinate trails. One store can be shared across the CLI front
//! end and the background sampler; every mutation runs inside an immediate
//! transaction, so a crash between statements never leaves a trip row
//! without its trail or a trail without its trip row.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::{debug, info, trace};

use crate::error::{Error, Result};
use crate::trip::{Fix, SyncState, Trip, TripId, TripStatus};

/// Storage engine for recorded trips.
///
/// Provides persistent storage using `SQLite` with support for:
/// - Atomic departure registration with the single-open-trip rule
/// - Append-only coordinate trails with non-decreasing timestamps
/// - Arrival closing in one transaction
/// - Sync bookkeeping via a per-trip version counter
#[derive(Debug)]
pub struct TripStore {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection, serialized across callers.
    conn: Mutex<Connection>,
}

impl TripStore {
    /// Open or create a trip database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    /// Initializes the schema if this is a new database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema
    /// initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        // WAL keeps readers unblocked while the sampler writes; the busy
        // timeout covers a second fleetlog process sharing the file.
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA foreign_keys=ON;
             PRAGMA busy_timeout=5000;",
        )?;

        migrations::initialize_schema(&conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self {
            path,
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn: Mutex::new(conn),
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Persist a freshly departed trip.
    ///
    /// The trip row and its seeded trail are written in one transaction.
    /// The single-open-trip rule is checked inside that transaction, so two
    /// racing departures for the same operator cannot both succeed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OpenTripExists`] if the operator already has an open
    /// trip, [`Error::MissingFix`] if the trail is empty, or an error if the
    /// database operation fails.
    pub fn create(&self, trip: &Trip) -> Result<()> {
        if trip.coords.is_empty() {
            return Err(Error::MissingFix);
        }
        for fix in &trip.coords {
            if !fix.is_in_range() {
                return Err(Error::CoordinateOutOfRange {
                    lat: fix.lat,
                    lon: fix.lon,
                });
            }
        }

        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let open: Option<String> = tx
            .query_row(
                "SELECT id FROM trips WHERE operator_id = ?1 AND status = ?2",
                params![trip.operator_id, TripStatus::Departed.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        if open.is_some() {
            return Err(Error::OpenTripExists {
                operator_id: trip.operator_id.clone(),
            });
        }

        tx.execute(
            r"
            INSERT INTO trips (id, operator_id, operator_name, plate, reason,
                               status, sync_state, version, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ",
            params![
                trip.id.to_string(),
                trip.operator_id,
                trip.operator_name,
                trip.plate,
                trip.reason,
                trip.status.as_str(),
                trip.sync_state.as_str(),
                trip.version,
                trip.created_at.to_rfc3339(),
                trip.updated_at.to_rfc3339(),
            ],
        )
        .map_err(|e| map_open_conflict(e, &trip.operator_id))?;

        let mut prev_ts = i64::MIN;
        for (seq, fix) in trip.coords.iter().enumerate() {
            let ts = fix.ts.max(prev_ts);
            prev_ts = ts;
            insert_coord(&tx, trip.id, i64::try_from(seq).unwrap_or(i64::MAX), *fix, ts)?;
        }

        tx.commit()?;
        debug!("Created trip {} for operator {}", trip.id, trip.operator_id);
        Ok(())
    }

    /// Append one position sample to an open trip.
    ///
    /// Bumps the trip version, refreshes `updated_at`, and re-arms the sync
    /// state to pending. A timestamp older than the current trail tail is
    /// clamped up to the tail, keeping the trail non-decreasing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TripNotFound`] for an unknown trip,
    /// [`Error::TripNotOpen`] if the trip has already arrived, or an error
    /// if the database operation fails.
    pub fn append_sample(&self, trip_id: TripId, fix: Fix) -> Result<()> {
        if !fix.is_in_range() {
            return Err(Error::CoordinateOutOfRange {
                lat: fix.lat,
                lon: fix.lon,
            });
        }

        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let status = fetch_status(&tx, trip_id)?;
        if !status.is_open() {
            return Err(Error::TripNotOpen { trip_id, status });
        }

        let (next_seq, ts) = next_trail_slot(&tx, trip_id, fix.ts)?;
        insert_coord(&tx, trip_id, next_seq, fix, ts)?;
        touch_trip(&tx, trip_id)?;

        tx.commit()?;
        trace!("Appended sample {} to trip {}", next_seq, trip_id);
        Ok(())
    }

    /// Close an open trip with its final position fix.
    ///
    /// Appends the arrival fix, flips the status to arrived, bumps the
    /// version, and returns the trip as persisted. All of it happens in one
    /// transaction; a failed close leaves the trip untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TripNotFound`] for an unknown trip,
    /// [`Error::TripNotOpen`] if the trip is already closed, or an error if
    /// the database operation fails.
    pub fn close(&self, trip_id: TripId, final_fix: Fix) -> Result<Trip> {
        if !final_fix.is_in_range() {
            return Err(Error::CoordinateOutOfRange {
                lat: final_fix.lat,
                lon: final_fix.lon,
            });
        }

        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let status = fetch_status(&tx, trip_id)?;
        if !status.is_open() {
            return Err(Error::TripNotOpen { trip_id, status });
        }

        let (next_seq, ts) = next_trail_slot(&tx, trip_id, final_fix.ts)?;
        insert_coord(&tx, trip_id, next_seq, final_fix, ts)?;
        tx.execute(
            "UPDATE trips SET status = ?1, updated_at = ?2, version = version + 1,
             sync_state = ?3 WHERE id = ?4",
            params![
                TripStatus::Arrived.as_str(),
                Utc::now().to_rfc3339(),
                SyncState::Pending.as_str(),
                trip_id.to_string(),
            ],
        )?;

        let trip = match load_trip(&tx, trip_id)? {
            Some(trip) => trip,
            None => return Err(Error::TripNotFound { trip_id }),
        };
        tx.commit()?;

        info!(
            "Closed trip {} with {} samples over {} ms",
            trip_id,
            trip.sample_count(),
            trip.elapsed_ms()
        );
        Ok(trip)
    }

    /// Get a trip by its identifier, trail included.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get(&self, trip_id: TripId) -> Result<Option<Trip>> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let trip = load_trip(&tx, trip_id)?;
        tx.commit()?;
        Ok(trip)
    }

    /// Get the operator's open trip, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn open_trip(&self, operator_id: &str) -> Result<Option<Trip>> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;

        let id: Option<String> = tx
            .query_row(
                "SELECT id FROM trips WHERE operator_id = ?1 AND status = ?2",
                params![operator_id, TripStatus::Departed.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        let trip = match id {
            Some(id) => load_trip(&tx, TripId::parse(&id)?)?,
            None => None,
        };
        tx.commit()?;
        Ok(trip)
    }

    /// Get the operator's trips, most recently created first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn history(&self, operator_id: &str, limit: usize) -> Result<Vec<Trip>> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;

        let limit_i64 = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = tx.prepare(
            r"
            SELECT id, operator_id, operator_name, plate, reason,
                   status, sync_state, version, created_at, updated_at
            FROM trips WHERE operator_id = ?1
            ORDER BY created_at DESC, id LIMIT ?2
            ",
        )?;
        let mut trips = stmt
            .query_map(params![operator_id, limit_i64], row_to_trip)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        drop(stmt);

        for trip in &mut trips {
            trip.coords = load_coords(&tx, trip.id)?;
        }
        tx.commit()?;
        Ok(trips)
    }

    /// List trips awaiting sync, least recently updated first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_pending(&self) -> Result<Vec<TripId>> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare("SELECT id FROM trips WHERE sync_state = ?1 ORDER BY updated_at ASC, id")?;
        let ids = stmt
            .query_map([SyncState::Pending.as_str()], |row| {
                row.get::<_, String>(0)
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        ids.iter().map(|id| TripId::parse(id)).collect()
    }

    /// Confirm delivery of a trip at the version the collaborator observed.
    ///
    /// Returns `true` if the confirmation matched the stored version and the
    /// trip is now synced. A stale confirmation, one whose observed version
    /// no longer matches because the trip mutated in the meantime, is a
    /// no-op and returns `false`; the trip stays pending.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TripNotFound`] for an unknown trip, or an error if
    /// the database operation fails.
    pub fn mark_synced(&self, trip_id: TripId, observed_version: i64) -> Result<bool> {
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let version: Option<i64> = tx
            .query_row(
                "SELECT version FROM trips WHERE id = ?1",
                [trip_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        let version = match version {
            Some(version) => version,
            None => return Err(Error::TripNotFound { trip_id }),
        };

        if version != observed_version {
            debug!(
                "Stale sync confirmation for trip {}: observed {}, stored {}",
                trip_id, observed_version, version
            );
            return Ok(false);
        }

        tx.execute(
            "UPDATE trips SET sync_state = ?1 WHERE id = ?2",
            params![SyncState::Synced.as_str(), trip_id.to_string()],
        )?;
        tx.commit()?;
        debug!("Trip {} marked synced at version {}", trip_id, version);
        Ok(true)
    }

    /// Count total trips in storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count(&self) -> Result<i64> {
        let conn = self.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM trips", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Get database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StoreStats> {
        let conn = self.lock();

        let total_trips: i64 =
            conn.query_row("SELECT COUNT(*) FROM trips", [], |row| row.get(0))?;
        let open_trips: i64 = conn.query_row(
            "SELECT COUNT(*) FROM trips WHERE status = ?1",
            [TripStatus::Departed.as_str()],
            |row| row.get(0),
        )?;
        let pending_sync: i64 = conn.query_row(
            "SELECT COUNT(*) FROM trips WHERE sync_state = ?1",
            [SyncState::Pending.as_str()],
            |row| row.get(0),
        )?;

        let oldest: Option<String> = conn
            .query_row(
                "SELECT created_at FROM trips ORDER BY created_at ASC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        let newest: Option<String> = conn
            .query_row(
                "SELECT created_at FROM trips ORDER BY created_at DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        let oldest_trip = oldest
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc));
        let newest_trip = newest
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StoreStats {
            total_trips,
            open_trips,
            pending_sync,
            oldest_trip,
            newest_trip,
            db_size_bytes,
        })
    }
}

/// Fetch a trip's status, failing if the trip does not exist.
fn fetch_status(conn: &Connection, trip_id: TripId) -> Result<TripStatus> {
    let status: Option<String> = conn
        .query_row(
            "SELECT status FROM trips WHERE id = ?1",
            [trip_id.to_string()],
            |row| row.get(0),
        )
        .optional()?;

    match status {
        Some(status) => status.parse().map_err(|e| {
            Error::from(rusqlite::Error::FromSqlConversionFailure(
                0,
                Type::Text,
                Box::new(e),
            ))
        }),
        None => Err(Error::TripNotFound { trip_id }),
    }
}

/// Compute the next trail sequence number and the effective timestamp for a
/// new sample, clamping the timestamp up to the trail tail when needed.
fn next_trail_slot(conn: &Connection, trip_id: TripId, incoming_ts: i64) -> Result<(i64, i64)> {
    let (next_seq, tail_ts): (i64, i64) = conn.query_row(
        "SELECT COUNT(*), COALESCE(MAX(ts), 0) FROM trip_coords WHERE trip_id = ?1",
        [trip_id.to_string()],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let ts = if incoming_ts < tail_ts {
        debug!(
            "Clamping sample timestamp {} up to trail tail {} for trip {}",
            incoming_ts, tail_ts, trip_id
        );
        tail_ts
    } else {
        incoming_ts
    };
    Ok((next_seq, ts))
}

fn insert_coord(conn: &Connection, trip_id: TripId, seq: i64, fix: Fix, ts: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO trip_coords (trip_id, seq, lat, lon, ts) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![trip_id.to_string(), seq, fix.lat, fix.lon, ts],
    )?;
    Ok(())
}

/// Bump the version, refresh `updated_at`, and re-arm the sync state.
fn touch_trip(conn: &Connection, trip_id: TripId) -> Result<()> {
    conn.execute(
        "UPDATE trips SET updated_at = ?1, version = version + 1, sync_state = ?2 WHERE id = ?3",
        params![
            Utc::now().to_rfc3339(),
            SyncState::Pending.as_str(),
            trip_id.to_string(),
        ],
    )?;
    Ok(())
}

/// Load a trip and its trail.
fn load_trip(conn: &Connection, trip_id: TripId) -> Result<Option<Trip>> {
    let trip = conn
        .query_row(
            r"
            SELECT id, operator_id, operator_name, plate, reason,
                   status, sync_state, version, created_at, updated_at
            FROM trips WHERE id = ?1
            ",
            [trip_id.to_string()],
            row_to_trip,
        )
        .optional()?;

    match trip {
        Some(mut trip) => {
            trip.coords = load_coords(conn, trip_id)?;
            Ok(Some(trip))
        }
        None => Ok(None),
    }
}

/// Load a trip's trail in append order.
fn load_coords(conn: &Connection, trip_id: TripId) -> Result<Vec<Fix>> {
    let mut stmt =
        conn.prepare("SELECT lat, lon, ts FROM trip_coords WHERE trip_id = ?1 ORDER BY seq ASC")?;
    let fixes = stmt
        .query_map([trip_id.to_string()], |row| {
            Ok(Fix::at(row.get(0)?, row.get(1)?, row.get(2)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(fixes)
}

/// Convert a database row to a Trip struct, trail left empty.
fn row_to_trip(row: &rusqlite::Row) -> rusqlite::Result<Trip> {
    let id_str: String = row.get(0)?;
    let operator_id: String = row.get(1)?;
    let operator_name: String = row.get(2)?;
    let plate: String = row.get(3)?;
    let reason: String = row.get(4)?;
    let status_str: String = row.get(5)?;
    let sync_str: String = row.get(6)?;
    let version: i64 = row.get(7)?;
    let created_str: String = row.get(8)?;
    let updated_str: String = row.get(9)?;

    let id = TripId::parse(&id_str)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;
    let status = status_str
        .parse::<TripStatus>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?;
    let sync_state = sync_str
        .parse::<SyncState>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?;
    let created_at = parse_timestamp(&created_str, 8)?;
    let updated_at = parse_timestamp(&updated_str, 9)?;

    Ok(Trip {
        id,
        operator_id,
        operator_name,
        plate,
        reason,
        coords: Vec::new(),
        status,
        created_at,
        updated_at,
        sync_state,
        version,
    })
}

fn parse_timestamp(value: &str, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Translate a unique-index violation on the open-trip index into the
/// conflict error. Only reachable when a second process slips past the
/// in-transaction check.
fn map_open_conflict(err: rusqlite::Error, operator_id: &str) -> Error {
    if let rusqlite::Error::SqliteFailure(failure, Some(message)) = &err {
        if failure.code == rusqlite::ErrorCode::ConstraintViolation
            && message.contains("trips.operator_id")
        {
            return Error::OpenTripExists {
                operator_id: operator_id.to_string(),
            };
        }
    }
    err.into()
}

/// Statistics about the trip store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    /// Total number of trips stored.
    pub total_trips: i64,
    /// Number of trips still open.
    pub open_trips: i64,
    /// Number of trips awaiting sync.
    pub pending_sync: i64,
    /// Creation timestamp of the oldest trip.
    pub oldest_trip: Option<DateTime<Utc>>,
    /// Creation timestamp of the newest trip.
    pub newest_trip: Option<DateTime<Utc>>,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}
