//! WGS84 reference ellipsoid constants.

/// Semi-major (equatorial) axis of the WGS84 ellipsoid, in meters.
pub const SEMI_MAJOR_AXIS_METERS: f64 = 6378137.0;

/// Inverse flattening of the WGS84 ellipsoid.
pub const INVERSE_FLATTENING: f64 = 298.257223563;

/// Convert a ground distance in meters at the equator to an angle in radians.
pub fn meters_to_radians(meters: f64) -> f64 {
    meters / SEMI_MAJOR_AXIS_METERS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meters_to_radians() {
        // A full equatorial circumference corresponds to 2*pi radians.
        let circumference = 2.0 * std::f64::consts::PI * SEMI_MAJOR_AXIS_METERS;
        let radians = meters_to_radians(circumference);
        assert!((radians - 2.0 * std::f64::consts::PI).abs() < 1e-12);
    }
}
