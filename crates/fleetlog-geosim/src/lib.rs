//! Deterministic simulated GPS track source for fleetlog
//!
//! Produces a plausible vehicle track without touching real positioning
//! hardware. A walker starts at a coordinate, moves at a configured ground
//! speed, and drifts its heading slightly on every step so routes curve
//! instead of running in a straight line. The walker state is pure
//! arithmetic, so two walkers built from the same configuration emit
//! identical tracks.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

/// Metres covered by one degree of latitude.
const METERS_PER_DEG_LAT: f64 = 111_320.0;

/// Heading drift amplitude per step, in degrees.
const DRIFT_AMPLITUDE_DEG: f64 = 9.0;

/// Phase increment driving the heading drift oscillation.
const DRIFT_PHASE_STEP: f64 = 0.37;

/// Lower bound for the longitude scale factor near the poles.
const MIN_LON_SCALE: f64 = 0.01;

/// A latitude/longitude pair emitted by the walker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    /// Latitude in decimal degrees, within `-90.0..=90.0`.
    pub lat: f64,
    /// Longitude in decimal degrees, within `-180.0..180.0`.
    pub lon: f64,
}

/// Configuration for a [`RouteWalker`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WalkerConfig {
    /// Starting latitude in decimal degrees.
    pub start_lat: f64,

    /// Starting longitude in decimal degrees.
    pub start_lon: f64,

    /// Initial heading in degrees clockwise from north.
    pub heading_deg: f64,

    /// Ground speed in metres per second.
    pub speed_mps: f64,

    /// Drop every n-th position to simulate signal loss. Zero never drops.
    pub fail_every: u64,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            // Praca da Se, Sao Paulo.
            start_lat: -23.5505,
            start_lon: -46.6333,
            heading_deg: 45.0,
            speed_mps: 13.9,
            fail_every: 0,
        }
    }
}

/// Deterministic walker advancing a simulated vehicle along a curving route.
#[derive(Debug, Clone)]
pub struct RouteWalker {
    lat: f64,
    lon: f64,
    heading_deg: f64,
    speed_mps: f64,
    fail_every: u64,
    steps: u64,
    phase: f64,
}

impl RouteWalker {
    /// Create a walker from an explicit configuration.
    ///
    /// Out-of-range start coordinates are clamped (latitude) or wrapped
    /// (longitude); negative speeds are treated as zero.
    #[must_use]
    pub fn new(config: WalkerConfig) -> Self {
        Self {
            lat: config.start_lat.clamp(-90.0, 90.0),
            lon: wrap_lon(config.start_lon),
            heading_deg: config.heading_deg.rem_euclid(360.0),
            speed_mps: config.speed_mps.max(0.0),
            fail_every: config.fail_every,
            steps: 0,
            phase: 0.0,
        }
    }

    /// Create a walker starting at `lat`/`lon` with default motion parameters.
    #[must_use]
    pub fn starting_at(lat: f64, lon: f64) -> Self {
        Self::new(WalkerConfig {
            start_lat: lat,
            start_lon: lon,
            ..WalkerConfig::default()
        })
    }

    /// Current position without advancing.
    #[must_use]
    pub fn position(&self) -> Position {
        Position {
            lat: self.lat,
            lon: self.lon,
        }
    }

    /// Number of steps taken so far, counting dropped ones.
    #[must_use]
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Advance the walker by `elapsed_secs` and report the new position.
    ///
    /// Returns `None` when the step falls on the configured signal-loss
    /// cadence. The walker still moves on a dropped step, mirroring a
    /// vehicle that keeps driving while its receiver has no fix.
    pub fn advance(&mut self, elapsed_secs: f64) -> Option<Position> {
        self.steps += 1;
        self.phase += DRIFT_PHASE_STEP;
        let drift = DRIFT_AMPLITUDE_DEG * self.phase.sin();
        self.heading_deg = (self.heading_deg + drift).rem_euclid(360.0);

        let distance = self.speed_mps * elapsed_secs.max(0.0);
        let heading_rad = self.heading_deg.to_radians();
        let dlat = distance * heading_rad.cos() / METERS_PER_DEG_LAT;
        let lon_scale = self.lat.to_radians().cos().max(MIN_LON_SCALE);
        let dlon = distance * heading_rad.sin() / (METERS_PER_DEG_LAT * lon_scale);

        self.lat = (self.lat + dlat).clamp(-90.0, 90.0);
        self.lon = wrap_lon(self.lon + dlon);

        if self.fail_every > 0 && self.steps % self.fail_every == 0 {
            return None;
        }
        Some(self.position())
    }
}

/// Wrap a longitude into `-180.0..180.0`.
fn wrap_lon(lon: f64) -> f64 {
    (lon + 180.0).rem_euclid(360.0) - 180.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> WalkerConfig {
        WalkerConfig {
            start_lat: -23.5505,
            start_lon: -46.6333,
            heading_deg: 45.0,
            speed_mps: 10.0,
            fail_every: 0,
        }
    }

    #[test]
    fn test_same_config_same_track() {
        let mut a = RouteWalker::new(test_config());
        let mut b = RouteWalker::new(test_config());

        for _ in 0..50 {
            assert_eq!(a.advance(5.0), b.advance(5.0));
        }
        assert_eq!(a.position(), b.position());
    }

    #[test]
    fn test_advance_moves_walker() {
        let mut walker = RouteWalker::new(test_config());
        let start = walker.position();

        let next = walker.advance(10.0).unwrap();

        assert_ne!(next, start);
        // 100 m is roughly 0.0009 degrees; movement stays in that ballpark.
        assert!((next.lat - start.lat).abs() < 0.01);
        assert!((next.lon - start.lon).abs() < 0.01);
        assert!(
            (next.lat - start.lat).abs() > 1e-6 || (next.lon - start.lon).abs() > 1e-6,
            "walker barely moved: {next:?}"
        );
    }

    #[test]
    fn test_zero_speed_stays_put() {
        let mut walker = RouteWalker::new(WalkerConfig {
            speed_mps: 0.0,
            ..test_config()
        });
        let start = walker.position();

        for _ in 0..10 {
            assert_eq!(walker.advance(5.0), Some(start));
        }
    }

    #[test]
    fn test_negative_elapsed_treated_as_zero() {
        let mut walker = RouteWalker::new(test_config());
        let start = walker.position();

        assert_eq!(walker.advance(-30.0), Some(start));
    }

    #[test]
    fn test_fail_every_drops_on_cadence() {
        let mut walker = RouteWalker::new(WalkerConfig {
            fail_every: 3,
            ..test_config()
        });

        let outcomes: Vec<bool> = (0..9).map(|_| walker.advance(1.0).is_some()).collect();

        assert_eq!(
            outcomes,
            vec![true, true, false, true, true, false, true, true, false]
        );
    }

    #[test]
    fn test_fail_every_zero_never_drops() {
        let mut walker = RouteWalker::new(test_config());

        assert!((0..100).all(|_| walker.advance(1.0).is_some()));
    }

    #[test]
    fn test_steps_count_dropped_advances() {
        let mut walker = RouteWalker::new(WalkerConfig {
            fail_every: 2,
            ..test_config()
        });

        for _ in 0..6 {
            let _ = walker.advance(1.0);
        }

        assert_eq!(walker.steps(), 6);
    }

    #[test]
    fn test_latitude_clamped_at_pole() {
        let mut walker = RouteWalker::new(WalkerConfig {
            start_lat: 89.9999,
            start_lon: 0.0,
            heading_deg: 0.0,
            speed_mps: 500.0,
            fail_every: 0,
        });

        for _ in 0..100 {
            let _ = walker.advance(60.0);
            let pos = walker.position();
            assert!(pos.lat <= 90.0, "latitude escaped range: {}", pos.lat);
            assert!(pos.lat >= -90.0);
        }
    }

    #[test]
    fn test_longitude_wraps_at_antimeridian() {
        let mut walker = RouteWalker::new(WalkerConfig {
            start_lat: 0.0,
            start_lon: 179.9999,
            heading_deg: 90.0,
            speed_mps: 500.0,
            fail_every: 0,
        });

        for _ in 0..100 {
            let _ = walker.advance(60.0);
            let pos = walker.position();
            assert!(pos.lon < 180.0, "longitude escaped range: {}", pos.lon);
            assert!(pos.lon >= -180.0);
        }
    }

    #[test]
    fn test_starting_at_uses_given_coordinates() {
        let walker = RouteWalker::starting_at(10.5, 20.5);
        let pos = walker.position();

        assert!((pos.lat - 10.5).abs() < f64::EPSILON);
        assert!((pos.lon - 20.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_out_of_range_start_normalized() {
        let walker = RouteWalker::new(WalkerConfig {
            start_lat: 123.0,
            start_lon: 200.0,
            heading_deg: 725.0,
            speed_mps: -5.0,
            fail_every: 0,
        });
        let pos = walker.position();

        assert!((pos.lat - 90.0).abs() < f64::EPSILON);
        assert!((pos.lon - (-160.0)).abs() < 1e-9);
    }

    #[test]
    fn test_heading_drift_curves_route() {
        let mut walker = RouteWalker::new(test_config());
        let mut track = Vec::new();
        for _ in 0..20 {
            track.push(walker.advance(30.0).unwrap());
        }

        // A straight route would keep a constant bearing between fixes.
        let bearing = |a: &Position, b: &Position| (b.lon - a.lon).atan2(b.lat - a.lat);
        let first = bearing(&track[0], &track[1]);
        let later = bearing(&track[18], &track[19]);

        assert!(
            (first - later).abs() > 1e-3,
            "route did not curve: {first} vs {later}"
        );
    }
}
