//! Great-circle distance, unit conversion, and circle geometry.
//!
//! Every distance is computed once in kilometres with the haversine formula
//! and converted by fixed ratios. Nothing here performs I/O.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::types::{BoundingBox, Coordinate, QueryCircle, QueryError, Result};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Mean Earth radius.
pub const EARTH_MEAN_RADIUS_KM: f64 = 6371.0;

pub const KM_PER_NM: f64 = 1.852;
pub const MILES_PER_KM: f64 = 0.621371;

/// Cruise speed assumed by route estimates when the caller gives none.
pub const DEFAULT_CRUISE_KTS: f64 = 450.0;

/// Widening applied to fetch boxes so rounding never clips the circle.
const BOX_MARGIN: f64 = 1.01;

// ---------------------------------------------------------------------------
// Distance value
// ---------------------------------------------------------------------------

/// A distance, stored in kilometres.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Distance(f64);

impl Distance {
    pub const ZERO: Distance = Distance(0.0);

    pub fn from_km(km: f64) -> Self {
        Distance(km)
    }

    pub fn from_nm(nm: f64) -> Self {
        Distance(nm * KM_PER_NM)
    }

    pub fn km(self) -> f64 {
        self.0
    }

    pub fn nm(self) -> f64 {
        self.0 / KM_PER_NM
    }

    pub fn miles(self) -> f64 {
        self.0 * MILES_PER_KM
    }

    pub fn in_unit(self, unit: DistanceUnit) -> f64 {
        match unit {
            DistanceUnit::NauticalMiles => self.nm(),
            DistanceUnit::Kilometers => self.km(),
            DistanceUnit::StatuteMiles => self.miles(),
        }
    }

    /// Total order over the underlying value, for sorting.
    pub fn total_cmp(&self, other: &Distance) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Output unit for distances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceUnit {
    #[default]
    NauticalMiles,
    Kilometers,
    StatuteMiles,
}

impl FromStr for DistanceUnit {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nautical_miles" | "nm" => Ok(DistanceUnit::NauticalMiles),
            "kilometers" | "km" => Ok(DistanceUnit::Kilometers),
            "statute_miles" | "mi" => Ok(DistanceUnit::StatuteMiles),
            other => Err(QueryError::InvalidParameter(format!(
                "unknown unit {other:?}: expected nautical_miles, kilometers, or statute_miles"
            ))),
        }
    }
}

impl fmt::Display for DistanceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistanceUnit::NauticalMiles => write!(f, "nm"),
            DistanceUnit::Kilometers => write!(f, "km"),
            DistanceUnit::StatuteMiles => write!(f, "mi"),
        }
    }
}

// ---------------------------------------------------------------------------
// Haversine
// ---------------------------------------------------------------------------

/// Great-circle distance on a sphere of the mean Earth radius.
pub fn great_circle_distance(a: Coordinate, b: Coordinate) -> Distance {
    great_circle_distance_on(a, b, EARTH_MEAN_RADIUS_KM)
}

/// Great-circle distance on a sphere of `radius_km`.
pub fn great_circle_distance_on(a: Coordinate, b: Coordinate, radius_km: f64) -> Distance {
    let lat1 = a.lat().to_radians();
    let lat2 = b.lat().to_radians();
    let dlat = (b.lat() - a.lat()).to_radians();
    let dlon = (b.lon() - a.lon()).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    // Rounding can push h a hair past 1 near antipodes.
    let c = 2.0 * h.clamp(0.0, 1.0).sqrt().asin();

    Distance(radius_km * c)
}

// ---------------------------------------------------------------------------
// Circle geometry
// ---------------------------------------------------------------------------

/// Latitude/longitude box enclosing the circle on a sphere of `radius_km`.
///
/// Returns `None` when the box would cross a pole or the antimeridian; the
/// caller should then fetch without a box. The box is a superset of the
/// circle, so it can only over-fetch.
pub fn bounding_box(circle: &QueryCircle, radius_km: f64) -> Option<BoundingBox> {
    let center = circle.center();
    let angular = Distance::from_nm(circle.radius_nm()).km() / radius_km * BOX_MARGIN;
    let lat_span = angular.to_degrees();

    let min_lat = center.lat() - lat_span;
    let max_lat = center.lat() + lat_span;
    if min_lat <= -90.0 || max_lat >= 90.0 {
        return None;
    }

    // Longitude extent of a spherical cap.
    let ratio = angular.sin() / center.lat().to_radians().cos();
    if !(0.0..1.0).contains(&ratio) {
        return None;
    }
    let lon_span = ratio.asin().to_degrees();

    let min_lon = center.lon() - lon_span;
    let max_lon = center.lon() + lon_span;
    if min_lon < -180.0 || max_lon > 180.0 {
        return None;
    }

    Some(BoundingBox {
        min_lat,
        max_lat,
        min_lon,
        max_lon,
    })
}

// ---------------------------------------------------------------------------
// Route estimate
// ---------------------------------------------------------------------------

/// Point-to-point distance and flight time at a fixed ground speed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteEstimate {
    pub origin: Coordinate,
    pub destination: Coordinate,
    pub distance: f64,
    pub unit: DistanceUnit,
    pub average_speed_kts: f64,
    pub flight_time_hours: f64,
    pub flight_time_minutes: f64,
}

pub fn estimate_route(
    origin: Coordinate,
    destination: Coordinate,
    unit: DistanceUnit,
    average_speed_kts: f64,
) -> Result<RouteEstimate> {
    if !average_speed_kts.is_finite() || average_speed_kts <= 0.0 {
        return Err(QueryError::InvalidParameter(format!(
            "average speed must be greater than 0 kts, got {average_speed_kts}"
        )));
    }

    let d = great_circle_distance(origin, destination);
    let hours = d.nm() / average_speed_kts;

    Ok(RouteEstimate {
        origin,
        destination,
        distance: d.in_unit(unit),
        unit,
        average_speed_kts,
        flight_time_hours: hours,
        flight_time_minutes: (hours * 60.0).round(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
