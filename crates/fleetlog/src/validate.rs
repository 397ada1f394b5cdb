//! Input validation for departure and arrival requests.
//!
//! All checks run before anything touches storage, so a rejected request
//! leaves no partial state behind.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, Result};
use crate::trip::Fix;

/// License plate format: three letters, a digit, a digit or letter, two
/// digits. Covers both the older ABC1234 plates and the Mercosul ABC1D23
/// layout.
const PLATE_PATTERN: &str = "^[A-Z]{3}[0-9][0-9A-Z][0-9]{2}$";

fn plate_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(PLATE_PATTERN).expect("plate pattern is valid"))
}

/// Normalize a license plate and check it against the accepted format.
///
/// Leading and trailing whitespace is stripped and letters are uppercased
/// before matching, so `" abc1234 "` normalizes to `"ABC1234"`.
///
/// # Errors
///
/// Returns [`Error::InvalidPlate`] carrying the input as entered when the
/// normalized plate does not match the format.
pub fn normalize_plate(raw: &str) -> Result<String> {
    let plate = raw.trim().to_uppercase();
    if plate_regex().is_match(&plate) {
        Ok(plate)
    } else {
        Err(Error::invalid_plate(raw))
    }
}

/// Check that a usage reason carries actual content.
///
/// # Errors
///
/// Returns [`Error::EmptyReason`] when the reason is empty or whitespace
/// only.
pub fn validate_reason(reason: &str) -> Result<()> {
    if reason.trim().is_empty() {
        return Err(Error::EmptyReason);
    }
    Ok(())
}

/// Require a position fix and check its coordinates are in range.
///
/// # Errors
///
/// Returns [`Error::MissingFix`] when no fix is present, or
/// [`Error::CoordinateOutOfRange`] when either coordinate escapes its valid
/// range.
pub fn validate_fix(fix: Option<Fix>) -> Result<Fix> {
    let fix = fix.ok_or(Error::MissingFix)?;
    if !fix.is_in_range() {
        return Err(Error::CoordinateOutOfRange {
            lat: fix.lat,
            lon: fix.lon,
        });
    }
    Ok(fix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_old_format_plate() {
        assert_eq!(normalize_plate("ABC1234").unwrap(), "ABC1234");
    }

    #[test]
    fn test_accepts_mercosul_plate() {
        assert_eq!(normalize_plate("BRA2E19").unwrap(), "BRA2E19");
    }

    #[test]
    fn test_normalizes_case_and_whitespace() {
        assert_eq!(normalize_plate("  abc1234\t").unwrap(), "ABC1234");
        assert_eq!(normalize_plate("bra2e19").unwrap(), "BRA2E19");
    }

    #[test]
    fn test_rejects_malformed_plates() {
        for plate in ["", "AB1234", "ABCD123", "ABC12345", "ABC-1234", "1234ABC", "ABC12E4"] {
            let err = normalize_plate(plate).unwrap_err();
            assert!(err.is_validation(), "plate {plate:?} should be rejected");
        }
    }

    #[test]
    fn test_plate_error_carries_original_input() {
        let err = normalize_plate(" xy-12 ").unwrap_err();
        assert!(err.to_string().contains("xy-12"));
    }

    #[test]
    fn test_reason_with_content_passes() {
        assert!(validate_reason("delivery run").is_ok());
    }

    #[test]
    fn test_empty_reason_rejected() {
        assert!(matches!(validate_reason(""), Err(Error::EmptyReason)));
        assert!(matches!(validate_reason("   \t\n"), Err(Error::EmptyReason)));
    }

    #[test]
    fn test_fix_passes_through() {
        let fix = Fix::at(10.0, 20.0, 1000);
        assert_eq!(validate_fix(Some(fix)).unwrap(), fix);
    }

    #[test]
    fn test_missing_fix_rejected() {
        assert!(matches!(validate_fix(None), Err(Error::MissingFix)));
    }

    #[test]
    fn test_out_of_range_fix_rejected() {
        let err = validate_fix(Some(Fix::at(91.0, 0.0, 0))).unwrap_err();
        assert!(matches!(err, Error::CoordinateOutOfRange { .. }));

        let err = validate_fix(Some(Fix::at(0.0, 180.5, 0))).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_boundary_fix_accepted() {
        assert!(validate_fix(Some(Fix::at(-90.0, 180.0, 0))).is_ok());
    }
}
