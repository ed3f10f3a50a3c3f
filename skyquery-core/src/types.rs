//! Shared types, error enum, and the aircraft data model for skyquery-core.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::distance::Distance;
use crate::feed::FeedError;

/// All errors produced by skyquery-core.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("upstream feed unavailable: {0}")]
    UpstreamUnavailable(#[from] FeedError),
    #[error("config error: {0}")]
    Config(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl QueryError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        QueryError::InvalidParameter(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, QueryError>;

// ---------------------------------------------------------------------------
// Unit conversion constants
// ---------------------------------------------------------------------------

pub const FEET_PER_METER: f64 = 1.0 / 0.3048;
pub const KNOTS_PER_MS: f64 = 1.0 / 0.514444;

// ---------------------------------------------------------------------------
// Coordinate
// ---------------------------------------------------------------------------

/// A validated (latitude, longitude) pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    lat: f64,
    lon: f64,
}

impl Coordinate {
    /// Build a coordinate, rejecting non-finite or out-of-range values.
    pub fn new(lat: f64, lon: f64) -> Result<Self> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(QueryError::invalid(format!(
                "latitude must be within [-90, 90], got {lat}"
            )));
        }
        if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
            return Err(QueryError::invalid(format!(
                "longitude must be within [-180, 180], got {lon}"
            )));
        }
        Ok(Coordinate { lat, lon })
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }
}

/// Parses `"lat,lon"`.
impl FromStr for Coordinate {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self> {
        let (lat, lon) = s
            .split_once(',')
            .ok_or_else(|| QueryError::invalid(format!("expected \"lat,lon\", got {s:?}")))?;
        let lat = lat
            .trim()
            .parse::<f64>()
            .map_err(|_| QueryError::invalid(format!("invalid latitude in {s:?}")))?;
        let lon = lon
            .trim()
            .parse::<f64>()
            .map_err(|_| QueryError::invalid(format!("invalid longitude in {s:?}")))?;
        Coordinate::new(lat, lon)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4},{:.4}", self.lat, self.lon)
    }
}

impl Serialize for Coordinate {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("Coordinate", 2)?;
        s.serialize_field("latitude", &self.lat)?;
        s.serialize_field("longitude", &self.lon)?;
        s.end()
    }
}

// ---------------------------------------------------------------------------
// ICAO 24-bit address
// ---------------------------------------------------------------------------

/// 24-bit transponder address. Stored as raw bytes; byte order matches the
/// lexical order of the 6-digit hex form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Icao24([u8; 3]);

impl Icao24 {
    pub fn from_u32(val: u32) -> Self {
        Icao24([
            ((val >> 16) & 0xFF) as u8,
            ((val >> 8) & 0xFF) as u8,
            (val & 0xFF) as u8,
        ])
    }

    pub fn to_u32(self) -> u32 {
        ((self.0[0] as u32) << 16) | ((self.0[1] as u32) << 8) | (self.0[2] as u32)
    }
}

impl FromStr for Icao24 {
    type Err = QueryError;

    /// Parse exactly 6 hex digits, case-insensitive.
    fn from_str(hex: &str) -> Result<Self> {
        let hex = hex.trim();
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(QueryError::invalid(format!(
                "icao24 must be 6 hex digits, got {hex:?}"
            )));
        }
        let val = u32::from_str_radix(hex, 16)
            .map_err(|_| QueryError::invalid(format!("invalid icao24 {hex:?}")))?;
        Ok(Icao24::from_u32(val))
    }
}

impl fmt::Display for Icao24 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}{:02x}{:02x}", self.0[0], self.0[1], self.0[2])
    }
}

impl Serialize for Icao24 {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ---------------------------------------------------------------------------
// State vectors
// ---------------------------------------------------------------------------

/// One aircraft's telemetry as reported in a single feed snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateVector {
    pub icao24: Icao24,
    pub callsign: Option<String>,
    pub origin_country: Option<String>,
    pub time_position: Option<i64>,
    pub last_contact: i64,
    pub position: Option<Coordinate>,
    /// Barometric altitude, meters.
    pub baro_altitude_m: Option<f64>,
    pub on_ground: bool,
    /// Ground speed, m/s.
    pub velocity_ms: Option<f64>,
    /// Track angle clockwise from north, degrees.
    pub true_track_deg: Option<f64>,
    /// Vertical rate, m/s.
    pub vertical_rate_ms: Option<f64>,
    pub squawk: Option<String>,
}

impl StateVector {
    /// Minimal state vector with every optional field unknown.
    pub fn new(icao24: Icao24, last_contact: i64) -> Self {
        StateVector {
            icao24,
            callsign: None,
            origin_country: None,
            time_position: None,
            last_contact,
            position: None,
            baro_altitude_m: None,
            on_ground: false,
            velocity_ms: None,
            true_track_deg: None,
            vertical_rate_ms: None,
            squawk: None,
        }
    }

    pub fn has_position(&self) -> bool {
        self.position.is_some()
    }

    /// Barometric altitude in feet, rounded.
    pub fn altitude_ft(&self) -> Option<i32> {
        self.baro_altitude_m
            .map(|m| (m * FEET_PER_METER).round() as i32)
    }

    /// Ground speed in knots, rounded.
    pub fn velocity_kts(&self) -> Option<i32> {
        self.velocity_ms.map(|v| (v * KNOTS_PER_MS).round() as i32)
    }
}

/// Every state vector the feed returned for one request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    /// Feed timestamp, unix seconds.
    pub time: i64,
    pub states: Vec<StateVector>,
}

// ---------------------------------------------------------------------------
// Query geometry
// ---------------------------------------------------------------------------

/// Axis-aligned latitude/longitude box used as a fetch hint for the feed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn contains(&self, c: &Coordinate) -> bool {
        (self.min_lat..=self.max_lat).contains(&c.lat())
            && (self.min_lon..=self.max_lon).contains(&c.lon())
    }
}

/// Center plus radius in nautical miles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryCircle {
    center: Coordinate,
    radius_nm: f64,
}

impl QueryCircle {
    /// Radius must be finite, positive, and no larger than `max_radius_nm`.
    /// Oversized radii are rejected rather than clamped.
    pub fn new(center: Coordinate, radius_nm: f64, max_radius_nm: f64) -> Result<Self> {
        if !radius_nm.is_finite() || radius_nm <= 0.0 {
            return Err(QueryError::invalid(format!(
                "radius must be greater than 0 nm, got {radius_nm}"
            )));
        }
        if radius_nm > max_radius_nm {
            return Err(QueryError::invalid(format!(
                "radius {radius_nm} nm exceeds the maximum of {max_radius_nm} nm"
            )));
        }
        Ok(QueryCircle { center, radius_nm })
    }

    pub fn center(&self) -> Coordinate {
        self.center
    }

    pub fn radius_nm(&self) -> f64 {
        self.radius_nm
    }
}

impl Serialize for QueryCircle {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("QueryCircle", 2)?;
        s.serialize_field("center", &self.center)?;
        s.serialize_field("radius_nm", &self.radius_nm)?;
        s.end()
    }
}

// ---------------------------------------------------------------------------
// Query output
// ---------------------------------------------------------------------------

/// A state vector together with its distance from the query center.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotatedAircraft {
    #[serde(flatten)]
    pub state: StateVector,
    #[serde(rename = "distance_nm", serialize_with = "serialize_nm")]
    pub distance: Distance,
    pub altitude_ft: Option<i32>,
    pub velocity_kts: Option<i32>,
}

fn serialize_nm<S: Serializer>(d: &Distance, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_f64(d.nm())
}

impl AnnotatedAircraft {
    pub fn new(state: StateVector, distance: Distance) -> Self {
        AnnotatedAircraft {
            altitude_ft: state.altitude_ft(),
            velocity_kts: state.velocity_kts(),
            state,
            distance,
        }
    }

    pub fn distance_nm(&self) -> f64 {
        self.distance.nm()
    }

    pub fn distance_km(&self) -> f64 {
        self.distance.km()
    }

    pub fn distance_miles(&self) -> f64 {
        self.distance.miles()
    }
}

/// Echo of what was asked for, plus the box the feed was asked to cover.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchArea {
    #[serde(flatten)]
    pub circle: QueryCircle,
    pub bounding_box: Option<BoundingBox>,
}

/// Aircraft inside a query circle, closest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AreaQueryResult {
    pub aircraft_count: usize,
    pub search_area: SearchArea,
    /// Snapshot time reported by the feed, unix seconds.
    pub timestamp: i64,
    pub aircraft: Vec<AnnotatedAircraft>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_range() {
        assert!(Coordinate::new(90.0, 180.0).is_ok());
        assert!(Coordinate::new(-90.0, -180.0).is_ok());
        assert!(matches!(
            Coordinate::new(90.5, 0.0),
            Err(QueryError::InvalidParameter(_))
        ));
        assert!(Coordinate::new(0.0, -180.1).is_err());
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
        assert!(Coordinate::new(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn test_coordinate_parse() {
        let c: Coordinate = "37.7749, -122.4194".parse().unwrap();
        assert_eq!(c.lat(), 37.7749);
        assert_eq!(c.lon(), -122.4194);
        assert!("KSFO".parse::<Coordinate>().is_err());
        assert!("37.7,abc".parse::<Coordinate>().is_err());
        assert!("95.0,10.0".parse::<Coordinate>().is_err());
    }

    #[test]
    fn test_icao24_parse_and_display() {
        let icao: Icao24 = "A1B2C3".parse().unwrap();
        assert_eq!(icao.to_string(), "a1b2c3");
        assert_eq!(icao.to_u32(), 0xA1B2C3);
        assert!("a1b2c".parse::<Icao24>().is_err());
        assert!("zzzzzz".parse::<Icao24>().is_err());
        assert!("+1b2c3".parse::<Icao24>().is_err());
    }

    #[test]
    fn test_icao24_order_is_lexical() {
        let mut ids: Vec<Icao24> = ["abc123", "0fffff", "a00001", "abc122"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        ids.sort();
        let as_text: Vec<String> = ids.iter().map(|i| i.to_string()).collect();
        let mut lexical = as_text.clone();
        lexical.sort();
        assert_eq!(as_text, lexical);
    }

    #[test]
    fn test_derived_units() {
        let mut sv = StateVector::new(Icao24::from_u32(1), 0);
        assert_eq!(sv.altitude_ft(), None);
        assert_eq!(sv.velocity_kts(), None);
        sv.baro_altitude_m = Some(10668.0);
        sv.velocity_ms = Some(231.5);
        assert_eq!(sv.altitude_ft(), Some(35000));
        assert_eq!(sv.velocity_kts(), Some(450));
    }

    #[test]
    fn test_query_circle_bounds() {
        let c = Coordinate::new(0.0, 0.0).unwrap();
        assert!(QueryCircle::new(c, 250.0, 250.0).is_ok());
        assert!(QueryCircle::new(c, 250.01, 250.0).is_err());
        assert!(QueryCircle::new(c, 0.0, 250.0).is_err());
        assert!(QueryCircle::new(c, -5.0, 250.0).is_err());
        assert!(QueryCircle::new(c, f64::NAN, 250.0).is_err());
    }

    #[test]
    fn test_annotated_serialization() {
        let mut sv = StateVector::new("4840d6".parse().unwrap(), 1700000000);
        sv.position = Some(Coordinate::new(52.25, 3.92).unwrap());
        sv.callsign = Some("KLM1023".into());
        let ac = AnnotatedAircraft::new(sv, Distance::from_nm(12.5));
        let json = serde_json::to_value(&ac).unwrap();
        assert_eq!(json["icao24"], "4840d6");
        assert_eq!(json["callsign"], "KLM1023");
        assert_eq!(json["position"]["latitude"], 52.25);
        assert!((json["distance_nm"].as_f64().unwrap() - 12.5).abs() < 1e-9);
        assert!(json["altitude_ft"].is_null());
    }
}
