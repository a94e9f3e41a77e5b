#![forbid(unsafe_code)]

//! Geographic coordinates and distance formatting.
//!
//! Coordinates are plain WGS84 degrees. The only validation performed is the
//! one the backend contract guarantees nothing about: both axes must be
//! finite and nonzero before an entity is eligible for the map. A `(0, 0)`
//! pair is how the backend encodes "no location recorded", so it is rejected
//! even though it is a real point in the Gulf of Guinea.

use serde::{Deserialize, Serialize};

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    #[must_use]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Whether both axes are finite and nonzero.
    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite() && self.lat != 0.0 && self.lng != 0.0
    }

    /// Per-axis proximity test used by clustering.
    ///
    /// Both `|Δlat|` and `|Δlng|` must be strictly below `tolerance`. This is
    /// a box test in degree space, not a great-circle distance: fine at
    /// neighbourhood scale, increasingly wrong towards the poles.
    #[inline]
    #[must_use]
    pub fn within(&self, other: &Self, tolerance: f64) -> bool {
        (self.lat - other.lat).abs() < tolerance && (self.lng - other.lng).abs() < tolerance
    }
}

/// Format a distance given in kilometres for list rows and popups.
///
/// Below one kilometre, after rounding to whole metres, the value is shown
/// in metres (`"350 m"`), otherwise in kilometres with one decimal (`"2.4 km"`). Non-finite or
/// negative inputs yield `None`.
#[must_use]
pub fn format_distance(km: f64) -> Option<String> {
    if !km.is_finite() || km < 0.0 {
        return None;
    }
    let metres = (km * 1000.0).round();
    if metres < 1000.0 {
        Some(format!("{} m", metres as i64))
    } else {
        Some(format!("{km:.1} km"))
    }
}
