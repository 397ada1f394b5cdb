//! `SQLite` schema definitions for fleetlog.
//!
//! This module contains the SQL statements for creating and managing
//! the database schema.

/// SQL statement to create the trips table.
pub const CREATE_TRIPS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS trips (
    id TEXT PRIMARY KEY,
    operator_id TEXT NOT NULL,
    operator_name TEXT NOT NULL,
    plate TEXT NOT NULL,
    reason TEXT NOT NULL,
    status TEXT NOT NULL,
    sync_state TEXT NOT NULL,
    version INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
";

/// SQL statement to create the coordinate trail table.
///
/// `seq` is dense per trip and assigned by the store, so ordering by it
/// reproduces the append order exactly.
pub const CREATE_COORDS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS trip_coords (
    trip_id TEXT NOT NULL REFERENCES trips(id),
    seq INTEGER NOT NULL,
    lat REAL NOT NULL,
    lon REAL NOT NULL,
    ts INTEGER NOT NULL,
    PRIMARY KEY (trip_id, seq)
)
";

/// SQL statement enforcing at most one open trip per operator.
pub const CREATE_OPEN_TRIP_INDEX: &str = r"
CREATE UNIQUE INDEX IF NOT EXISTS idx_trips_open_operator
    ON trips(operator_id) WHERE status = 'departed'
";

/// SQL statement to create an index for per-operator history queries.
pub const CREATE_OPERATOR_CREATED_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_trips_operator_created
    ON trips(operator_id, created_at DESC)
";

/// SQL statement to create an index on `sync_state` for pending scans.
pub const CREATE_SYNC_STATE_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_trips_sync_state ON trips(sync_state)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_TRIPS_TABLE,
    CREATE_COORDS_TABLE,
    CREATE_OPEN_TRIP_INDEX,
    CREATE_OPERATOR_CREATED_INDEX,
    CREATE_SYNC_STATE_INDEX,
    CREATE_METADATA_TABLE,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_statements_not_empty() {
        assert!(!SCHEMA_STATEMENTS.is_empty());
        for stmt in SCHEMA_STATEMENTS {
            assert!(!stmt.is_empty());
        }
    }

    #[test]
    fn test_create_trips_table_contains_required_columns() {
        assert!(CREATE_TRIPS_TABLE.contains("id TEXT PRIMARY KEY"));
        assert!(CREATE_TRIPS_TABLE.contains("operator_id TEXT NOT NULL"));
        assert!(CREATE_TRIPS_TABLE.contains("plate TEXT NOT NULL"));
        assert!(CREATE_TRIPS_TABLE.contains("status TEXT NOT NULL"));
        assert!(CREATE_TRIPS_TABLE.contains("sync_state TEXT NOT NULL"));
        assert!(CREATE_TRIPS_TABLE.contains("version INTEGER NOT NULL"));
    }

    #[test]
    fn test_create_coords_table_structure() {
        assert!(CREATE_COORDS_TABLE.contains("trip_id TEXT NOT NULL"));
        assert!(CREATE_COORDS_TABLE.contains("lat REAL NOT NULL"));
        assert!(CREATE_COORDS_TABLE.contains("lon REAL NOT NULL"));
        assert!(CREATE_COORDS_TABLE.contains("ts INTEGER NOT NULL"));
        assert!(CREATE_COORDS_TABLE.contains("PRIMARY KEY (trip_id, seq)"));
    }

    #[test]
    fn test_open_trip_index_is_partial_and_unique() {
        assert!(CREATE_OPEN_TRIP_INDEX.contains("UNIQUE INDEX"));
        assert!(CREATE_OPEN_TRIP_INDEX.contains("WHERE status = 'departed'"));
    }

    #[test]
    fn test_create_metadata_table_structure() {
        assert!(CREATE_METADATA_TABLE.contains("key TEXT PRIMARY KEY"));
        assert!(CREATE_METADATA_TABLE.contains("value TEXT NOT NULL"));
    }
}
