//! Plausibility checks applied to decoded hits before they are accepted.
//!
//! The live upstream has been observed returning syntactically valid but
//! semantically garbage coordinates; everything here exists to keep those
//! out of the store.

use crate::resolver::outcome::LookupOutcome;

/// Mean Earth radius in kilometers.
const MEAN_EARTH_RADIUS_KM: f64 = 6371.0088;

/// Largest accuracy radius the upstream can credibly report, in meters.
const MAX_RANGE_M: u32 = 1_000_000;

/// Half the Earth's circumference: no two points are farther apart.
const MAX_GREAT_CIRCLE_KM: f64 = 20_037.5;

/// Validates a decoded outcome against the record's last known coordinate.
///
/// Non-hit outcomes pass through untouched. Hits are rejected in order:
/// out-of-globe coordinates, oversized range, then a great-circle distance
/// from `origin` that exceeds the antipodal maximum.
pub fn validate(origin: (f64, f64), outcome: LookupOutcome) -> LookupOutcome {
    let LookupOutcome::Hit { lat, lon, range_m } = outcome else {
        return outcome;
    };

    if lat.abs() > 90.0 || lon.abs() > 180.0 {
        return LookupOutcome::ImplausibleCoordinate { lat, lon, range_m };
    }

    if range_m > MAX_RANGE_M {
        return LookupOutcome::ImplausibleRange { lat, lon, range_m };
    }

    if exceeds_distance_cap(haversine_km(origin, (lat, lon))) {
        return LookupOutcome::ImplausibleRange { lat, lon, range_m };
    }

    outcome
}

/// True when a displacement from the last known coordinate is farther than
/// any two points on the globe can be. On the mean-radius sphere the
/// haversine maximum is ~20,015 km, slightly under the cap, so this fires
/// only on degenerate geometry rather than on genuine antipodes.
pub fn exceeds_distance_cap(distance_km: f64) -> bool {
    distance_km > MAX_GREAT_CIRCLE_KM
}

/// Great-circle distance between two (lat, lon) points in decimal degrees,
/// in kilometers, on a sphere of the Earth's mean radius.
pub fn haversine_km(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (lat1, lon1) = (a.0.to_radians(), a.1.to_radians());
    let (lat2, lon2) = (b.0.to_radians(), b.1.to_radians());

    let d_lat = lat2 - lat1;
    let d_lon = lon2 - lon1;
    let h = (d_lat * 0.5).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon * 0.5).sin().powi(2);

    2.0 * MEAN_EARTH_RADIUS_KM * h.sqrt().asin()
}
