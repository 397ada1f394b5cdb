//! Trip lifecycle facade.
//!
//! The presentation layer talks to [`TripService`] with typed requests
//! instead of reaching into the store. Every request is validated in full
//! before any mutation is attempted, so a rejected request leaves no
//! partial state behind.

use std::sync::Arc;

use tracing::info;

use crate::error::Result;
use crate::store::TripStore;
use crate::trip::{Fix, Trip, TripId};
use crate::validate::{normalize_plate, validate_fix, validate_reason};

/// A request to open a new trip for an operator.
#[derive(Debug, Clone)]
pub struct DepartureRequest {
    /// Stable identifier of the operator opening the trip.
    pub operator_id: String,

    /// Display name of the operator, stored on the trip.
    pub operator_name: String,

    /// Vehicle license plate, in any case; normalized before storage.
    pub plate: String,

    /// Free-text reason for the trip.
    pub reason: String,

    /// The departure position, if acquisition succeeded.
    pub fix: Option<Fix>,
}

/// A request to close an open trip.
#[derive(Debug, Clone)]
pub struct ArrivalRequest {
    /// The trip to close.
    pub trip_id: TripId,

    /// The arrival position, if acquisition succeeded.
    pub fix: Option<Fix>,
}

/// Validated entry point for the trip lifecycle.
#[derive(Debug, Clone)]
pub struct TripService {
    store: Arc<TripStore>,
}

impl TripService {
    /// Create a service over the given store.
    #[must_use]
    pub fn new(store: Arc<TripStore>) -> Self {
        Self { store }
    }

    /// Open a new trip seeded with the departure fix.
    ///
    /// The plate is trimmed and uppercased before it is checked and
    /// stored; the reason is trimmed. Validation runs in full before the
    /// store is touched.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a malformed plate, blank reason, or
    /// missing/out-of-range fix; [`crate::Error::OpenTripExists`] when the
    /// operator already has an open trip; or a storage error.
    pub fn depart(&self, request: DepartureRequest) -> Result<Trip> {
        let plate = normalize_plate(&request.plate)?;
        validate_reason(&request.reason)?;
        let fix = validate_fix(request.fix)?;

        let trip = Trip::depart(
            request.operator_id,
            request.operator_name,
            plate,
            request.reason.trim(),
            fix,
        );
        self.store.create(&trip)?;
        info!(
            "Trip {} departed for operator {} with plate {}",
            trip.id, trip.operator_id, trip.plate
        );
        Ok(trip)
    }

    /// Close an open trip with the arrival fix.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a missing or out-of-range fix,
    /// [`crate::Error::TripNotFound`] for an unknown trip, or
    /// [`crate::Error::TripNotOpen`] when the trip already arrived.
    pub fn arrive(&self, request: ArrivalRequest) -> Result<Trip> {
        let fix = validate_fix(request.fix)?;
        let trip = self.store.close(request.trip_id, fix)?;
        info!(
            "Trip {} arrived with {} samples over {} ms",
            trip.id,
            trip.sample_count(),
            trip.elapsed_ms()
        );
        Ok(trip)
    }

    /// Look up a trip by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    pub fn get(&self, trip_id: TripId) -> Result<Option<Trip>> {
        self.store.get(trip_id)
    }

    /// The operator's currently open trip, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    pub fn open_trip(&self, operator_id: &str) -> Result<Option<Trip>> {
        self.store.open_trip(operator_id)
    }

    /// The operator's trips, newest first, at most `limit` of them.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn history(&self, operator_id: &str, limit: usize) -> Result<Vec<Trip>> {
        self.store.history(operator_id, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trip::{SyncState, TripStatus};

    fn test_service() -> (TripService, Arc<TripStore>) {
        let store = Arc::new(TripStore::open_in_memory().unwrap());
        (TripService::new(Arc::clone(&store)), store)
    }

    fn departure(operator_id: &str) -> DepartureRequest {
        DepartureRequest {
            operator_id: operator_id.to_string(),
            operator_name: "Alice".to_string(),
            plate: "ABC1234".to_string(),
            reason: "delivery".to_string(),
            fix: Some(Fix::at(10.0, 20.0, 1000)),
        }
    }

    #[test]
    fn test_depart_persists_trip() {
        let (service, store) = test_service();
        let trip = service.depart(departure("u1")).unwrap();

        assert_eq!(trip.status, TripStatus::Departed);
        assert_eq!(trip.sync_state, SyncState::Pending);
        assert_eq!(trip.version, 1);
        assert_eq!(trip.coords, vec![Fix::at(10.0, 20.0, 1000)]);

        let loaded = store.get(trip.id).unwrap().unwrap();
        assert_eq!(loaded, trip);
    }

    #[test]
    fn test_depart_normalizes_plate_and_reason() {
        let (service, _store) = test_service();
        let mut request = departure("u1");
        request.plate = " abc1234 ".to_string();
        request.reason = "  delivery  ".to_string();

        let trip = service.depart(request).unwrap();
        assert_eq!(trip.plate, "ABC1234");
        assert_eq!(trip.reason, "delivery");
    }

    #[test]
    fn test_depart_rejects_invalid_plate_without_side_effects() {
        let (service, store) = test_service();
        let mut request = departure("u1");
        request.plate = "1234ABC".to_string();

        let err = service.depart(request).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_depart_rejects_blank_reason_without_side_effects() {
        let (service, store) = test_service();
        let mut request = departure("u1");
        request.reason = "   ".to_string();

        let err = service.depart(request).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_depart_requires_fix() {
        let (service, store) = test_service();
        let mut request = departure("u1");
        request.fix = None;

        let err = service.depart(request).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_depart_rejects_out_of_range_fix() {
        let (service, store) = test_service();
        let mut request = departure("u1");
        request.fix = Some(Fix::at(91.0, 20.0, 1000));

        let err = service.depart(request).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_plate_is_checked_before_reason() {
        let (service, _store) = test_service();
        let mut request = departure("u1");
        request.plate = "bad".to_string();
        request.reason = String::new();

        let err = service.depart(request).unwrap_err();
        assert!(matches!(err, crate::Error::InvalidPlate { .. }));
    }

    #[test]
    fn test_depart_conflicts_with_open_trip() {
        let (service, store) = test_service();
        service.depart(departure("u1")).unwrap();

        let err = service.depart(departure("u1")).unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_depart_allowed_after_arrival() {
        let (service, _store) = test_service();
        let first = service.depart(departure("u1")).unwrap();
        service
            .arrive(ArrivalRequest {
                trip_id: first.id,
                fix: Some(Fix::at(10.1, 20.1, 2000)),
            })
            .unwrap();

        let second = service.depart(departure("u1")).unwrap();
        assert_ne!(second.id, first.id);
    }

    #[test]
    fn test_arrive_closes_trip() {
        let (service, store) = test_service();
        let trip = service.depart(departure("u1")).unwrap();

        let closed = service
            .arrive(ArrivalRequest {
                trip_id: trip.id,
                fix: Some(Fix::at(10.3, 20.3, 1300)),
            })
            .unwrap();

        assert_eq!(closed.status, TripStatus::Arrived);
        assert_eq!(closed.arrival_fix(), Some(Fix::at(10.3, 20.3, 1300)));
        assert_eq!(closed.version, 2);
        assert_eq!(store.open_trip("u1").unwrap(), None);
    }

    #[test]
    fn test_arrive_unknown_trip() {
        let (service, _store) = test_service();
        let err = service
            .arrive(ArrivalRequest {
                trip_id: TripId::new(),
                fix: Some(Fix::at(10.0, 20.0, 1000)),
            })
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_arrive_requires_fix() {
        let (service, _store) = test_service();
        let trip = service.depart(departure("u1")).unwrap();

        let err = service
            .arrive(ArrivalRequest {
                trip_id: trip.id,
                fix: None,
            })
            .unwrap_err();
        assert!(err.is_validation());

        // The trip is untouched and still open.
        let loaded = service.open_trip("u1").unwrap().unwrap();
        assert_eq!(loaded, trip);
    }

    #[test]
    fn test_arrive_twice_fails_and_preserves_record() {
        let (service, store) = test_service();
        let trip = service.depart(departure("u1")).unwrap();
        let closed = service
            .arrive(ArrivalRequest {
                trip_id: trip.id,
                fix: Some(Fix::at(10.3, 20.3, 1300)),
            })
            .unwrap();

        let err = service
            .arrive(ArrivalRequest {
                trip_id: trip.id,
                fix: Some(Fix::at(11.0, 21.0, 1400)),
            })
            .unwrap_err();
        assert!(err.is_invalid_state());
        assert_eq!(store.get(trip.id).unwrap().unwrap(), closed);
    }

    #[test]
    fn test_open_trip_lookup() {
        let (service, _store) = test_service();
        assert!(service.open_trip("u1").unwrap().is_none());

        let trip = service.depart(departure("u1")).unwrap();
        assert_eq!(service.open_trip("u1").unwrap().unwrap().id, trip.id);
        assert!(service.open_trip("u2").unwrap().is_none());
    }

    #[test]
    fn test_history_newest_first() {
        let (service, _store) = test_service();
        let first = service.depart(departure("u1")).unwrap();
        service
            .arrive(ArrivalRequest {
                trip_id: first.id,
                fix: Some(Fix::at(10.1, 20.1, 2000)),
            })
            .unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = service.depart(departure("u1")).unwrap();

        let history = service.history("u1", 10).unwrap();
        let ids: Vec<_> = history.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[test]
    fn test_full_trip_scenario() {
        let (service, store) = test_service();

        let trip = service
            .depart(DepartureRequest {
                operator_id: "u1".to_string(),
                operator_name: "Alice".to_string(),
                plate: "ABC1234".to_string(),
                reason: "delivery".to_string(),
                fix: Some(Fix::at(10.0, 20.0, 1000)),
            })
            .unwrap();

        store.append_sample(trip.id, Fix::at(10.1, 20.1, 1100)).unwrap();
        store.append_sample(trip.id, Fix::at(10.2, 20.2, 1200)).unwrap();

        let closed = service
            .arrive(ArrivalRequest {
                trip_id: trip.id,
                fix: Some(Fix::at(10.3, 20.3, 1300)),
            })
            .unwrap();

        assert_eq!(closed.status, TripStatus::Arrived);
        assert_eq!(closed.sync_state, SyncState::Pending);
        assert_eq!(
            closed.coords,
            vec![
                Fix::at(10.0, 20.0, 1000),
                Fix::at(10.1, 20.1, 1100),
                Fix::at(10.2, 20.2, 1200),
                Fix::at(10.3, 20.3, 1300),
            ]
        );
    }
}
