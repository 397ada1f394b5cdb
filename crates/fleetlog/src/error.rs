//! Error types for fleetlog.
//!
//! This module defines all error types used throughout the fleetlog crate,
//! providing detailed context for debugging and user-friendly error messages.

use std::path::PathBuf;
use thiserror::Error;

use crate::trip::{TripId, TripStatus};

/// The main error type for fleetlog operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Validation Errors ===
    /// The license plate does not match the expected format.
    #[error("invalid license plate {plate:?}: expected a format like ABC1234")]
    InvalidPlate {
        /// The rejected plate as entered.
        plate: String,
    },

    /// The departure reason is empty or whitespace only.
    #[error("departure reason must not be empty")]
    EmptyReason,

    /// No position fix was supplied for an operation that requires one.
    #[error("no position fix available for this operation")]
    MissingFix,

    /// A coordinate falls outside its valid range.
    #[error("coordinate out of range: lat {lat}, lon {lon}")]
    CoordinateOutOfRange {
        /// The rejected latitude.
        lat: f64,
        /// The rejected longitude.
        lon: f64,
    },

    /// A trip identifier string could not be parsed.
    #[error("invalid trip id {value:?}")]
    InvalidTripId {
        /// The rejected identifier as entered.
        value: String,
    },

    // === Lifecycle Errors ===
    /// The operator already has an open trip.
    #[error("operator {operator_id:?} already has an open trip")]
    OpenTripExists {
        /// Operator holding the open trip.
        operator_id: String,
    },

    /// No trip exists with the given identifier.
    #[error("trip {trip_id} not found")]
    TripNotFound {
        /// The identifier that was looked up.
        trip_id: TripId,
    },

    /// The trip exists but is not open for mutation.
    #[error("trip {trip_id} is not open (status: {status})")]
    TripNotOpen {
        /// The trip that rejected the mutation.
        trip_id: TripId,
        /// Its current status.
        status: TripStatus,
    },

    // === Acquisition Errors ===
    /// The position provider failed to produce a fix.
    #[error("failed to acquire position fix: {message}")]
    FixUnavailable {
        /// Description of what went wrong.
        message: String,
    },

    /// The position provider did not answer in time.
    #[error("position fix not acquired within {timeout_ms} ms")]
    FixTimeout {
        /// The timeout that elapsed.
        timeout_ms: u64,
    },

    // === Sampler Errors ===
    /// The background sampler is already armed for a trip.
    #[error("location sampler is already armed")]
    SamplerAlreadyArmed,

    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for fleetlog operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create an invalid-plate error.
    #[must_use]
    pub fn invalid_plate(plate: impl Into<String>) -> Self {
        Self::InvalidPlate {
            plate: plate.into(),
        }
    }

    /// Create a fix-unavailable error.
    #[must_use]
    pub fn fix_unavailable(message: impl Into<String>) -> Self {
        Self::FixUnavailable {
            message: message.into(),
        }
    }

    /// Create a configuration validation error.
    #[must_use]
    pub fn config_validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }

    /// Check if this error rejects caller input.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidPlate { .. }
                | Self::EmptyReason
                | Self::MissingFix
                | Self::CoordinateOutOfRange { .. }
                | Self::InvalidTripId { .. }
        )
    }

    /// Check if this error reports a single-open-trip conflict.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::OpenTripExists { .. })
    }

    /// Check if this error reports a missing trip.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::TripNotFound { .. })
    }

    /// Check if this error reports a lifecycle-state violation.
    #[must_use]
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Self::TripNotOpen { .. } | Self::SamplerAlreadyArmed)
    }

    /// Check if this error comes from position acquisition.
    #[must_use]
    pub fn is_acquisition(&self) -> bool {
        matches!(self, Self::FixUnavailable { .. } | Self::FixTimeout { .. })
    }

    /// Check if this error comes from the persistence layer.
    #[must_use]
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            Self::DatabaseOpen { .. }
                | Self::DatabaseQuery(_)
                | Self::DatabaseMigration { .. }
                | Self::Io(_)
                | Self::DirectoryCreate { .. }
                | Self::Json(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_plate_display() {
        let err = Error::invalid_plate("xx-99");
        let msg = err.to_string();
        assert!(msg.contains("xx-99"));
        assert!(msg.contains("ABC1234"));
    }

    #[test]
    fn test_validation_predicate() {
        assert!(Error::invalid_plate("bad").is_validation());
        assert!(Error::EmptyReason.is_validation());
        assert!(Error::MissingFix.is_validation());
        assert!(Error::CoordinateOutOfRange {
            lat: 91.0,
            lon: 0.0
        }
        .is_validation());
        assert!(Error::InvalidTripId {
            value: "nope".to_string()
        }
        .is_validation());
        assert!(!Error::SamplerAlreadyArmed.is_validation());
    }

    #[test]
    fn test_conflict_predicate() {
        let err = Error::OpenTripExists {
            operator_id: "u1".to_string(),
        };
        assert!(err.is_conflict());
        assert!(!err.is_validation());
        assert!(!Error::EmptyReason.is_conflict());
    }

    #[test]
    fn test_not_found_predicate() {
        let err = Error::TripNotFound {
            trip_id: TripId::new(),
        };
        assert!(err.is_not_found());
        assert!(!err.is_invalid_state());
    }

    #[test]
    fn test_invalid_state_predicate() {
        let err = Error::TripNotOpen {
            trip_id: TripId::new(),
            status: TripStatus::Arrived,
        };
        assert!(err.is_invalid_state());
        assert!(Error::SamplerAlreadyArmed.is_invalid_state());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_acquisition_predicate() {
        assert!(Error::fix_unavailable("no signal").is_acquisition());
        assert!(Error::FixTimeout { timeout_ms: 10_000 }.is_acquisition());
        assert!(!Error::MissingFix.is_acquisition());
    }

    #[test]
    fn test_persistence_predicate() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(Error::from(io_err).is_persistence());
        assert!(Error::DatabaseMigration {
            message: "bad".to_string()
        }
        .is_persistence());
        assert!(!Error::EmptyReason.is_persistence());
    }

    #[test]
    fn test_trip_not_open_display() {
        let id = TripId::new();
        let err = Error::TripNotOpen {
            trip_id: id,
            status: TripStatus::Arrived,
        };
        let msg = err.to_string();
        assert!(msg.contains(&id.to_string()));
        assert!(msg.contains("arrived"));
    }

    #[test]
    fn test_open_trip_exists_display() {
        let err = Error::OpenTripExists {
            operator_id: "u1".to_string(),
        };
        assert!(err.to_string().contains("u1"));
    }

    #[test]
    fn test_fix_timeout_display() {
        let err = Error::FixTimeout { timeout_ms: 2500 };
        assert!(err.to_string().contains("2500"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_rusqlite_error() {
        let result = rusqlite::Connection::open_with_flags(
            "/nonexistent/path/db.sqlite",
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        );
        if let Err(sqlite_err) = result {
            let err: Error = sqlite_err.into();
            assert!(matches!(err, Error::DatabaseQuery(_)));
            assert!(err.is_persistence());
        }
    }

    #[test]
    fn test_from_json_error() {
        let json_result: std::result::Result<i32, serde_json::Error> =
            serde_json::from_str("not valid json");
        if let Err(json_err) = json_result {
            let err: Error = json_err.into();
            assert!(matches!(err, Error::Json(_)));
        }
    }

    #[test]
    fn test_database_migration_error_display() {
        let err = Error::DatabaseMigration {
            message: "version mismatch".to_string(),
        };
        assert!(err.to_string().contains("version mismatch"));
    }

    #[test]
    fn test_config_validation_error_display() {
        let err = Error::config_validation("interval must be positive");
        assert!(err.to_string().contains("interval must be positive"));
    }

    #[test]
    fn test_directory_create_error_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = Error::DirectoryCreate {
            path: PathBuf::from("/root/forbidden"),
            source: io_err,
        };
        assert!(err.to_string().contains("/root/forbidden"));
    }
}
