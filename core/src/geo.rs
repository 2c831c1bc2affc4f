//! Geodesy and kinematics helpers
//!
//! Pure functions shared by the simulator and the detector. Missing inputs are
//! represented by `NaN` on the way in and by `None` on the way out, so callers
//! can treat "undefined" as "rule does not apply" without special casing.

/// Mean Earth radius used by the haversine formula, in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Sea-level standard pressure in hPa.
pub const SEA_LEVEL_PRESSURE_HPA: f64 = 1013.25;

/// Meters of altitude gain per hPa of pressure drop.
pub const METERS_PER_HPA: f64 = 8.3;

/// Degrees of latitude per meter (equirectangular approximation).
pub const DEGREES_PER_METER: f64 = 1.0 / 111_320.0;

/// Great-circle distance in meters between two coordinates given in degrees.
///
/// Returns `None` when any coordinate is missing (`NaN`).
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> Option<f64> {
    if [lat1, lon1, lat2, lon2].iter().any(|v| v.is_nan()) {
        return None;
    }

    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let delta_phi = (lat2 - lat1).to_radians();
    let delta_lambda = (lon2 - lon1).to_radians();

    let a = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    Some(EARTH_RADIUS_M * c)
}

/// Speed implied by covering `distance_m` in `dt_s` seconds.
///
/// Undefined (`None`) for a zero time delta or a missing input.
pub fn implied_speed(distance_m: f64, dt_s: f64) -> Option<f64> {
    if distance_m.is_nan() || dt_s.is_nan() || dt_s == 0.0 {
        return None;
    }
    Some(distance_m / dt_s)
}

/// Barometric pressure expected at `altitude_m`, in hPa.
///
/// Linear approximation with no temperature or humidity correction.
pub fn implied_pressure(altitude_m: f64) -> f64 {
    SEA_LEVEL_PRESSURE_HPA - altitude_m / METERS_PER_HPA
}

/// Advance a coordinate by `meters` along `bearing_deg` using the flat
/// degrees-per-meter approximation. Returns the new `(lat, lon)`.
pub fn advance(lat: f64, lon: f64, meters: f64, bearing_deg: f64) -> (f64, f64) {
    let theta = bearing_deg.to_radians();
    (
        lat + meters * DEGREES_PER_METER * theta.cos(),
        lon + meters * DEGREES_PER_METER * theta.sin(),
    )
}
