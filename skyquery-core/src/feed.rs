//! Snapshot provider seam and the OpenSky `states/all` decoder.
//!
//! The engine never talks to the network. It asks a `SnapshotProvider` for
//! the current state vectors; the server supplies one backed by HTTP, tests
//! supply `StaticSnapshot`.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::types::{BoundingBox, Coordinate, Icao24, Snapshot, StateVector};

/// Why the feed could not produce a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    #[error("feed unreachable: {0}")]
    Unreachable(String),
    #[error("feed rate limit exhausted, retry after {retry_after_secs:?}s")]
    RateLimited { retry_after_secs: Option<u64> },
    #[error("feed rejected credentials")]
    Unauthorized,
    #[error("feed returned HTTP {0}")]
    Status(u16),
    #[error("malformed feed payload: {0}")]
    Malformed(String),
}

/// What to ask the feed for. Empty `icao24` means every aircraft.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotRequest {
    pub bbox: Option<BoundingBox>,
    pub icao24: Vec<Icao24>,
}

/// Source of complete state-vector snapshots.
///
/// Implementations return the whole snapshot or an error, never a partial
/// result.
#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    async fn fetch(&self, request: &SnapshotRequest) -> Result<Snapshot, FeedError>;
}

// ---------------------------------------------------------------------------
// In-memory provider
// ---------------------------------------------------------------------------

/// Provider that answers every request from a fixed snapshot or a fixed
/// error. Request filters are applied so it behaves like the live feed.
#[derive(Debug, Clone)]
pub struct StaticSnapshot {
    outcome: Result<Snapshot, FeedError>,
}

impl StaticSnapshot {
    pub fn new(snapshot: Snapshot) -> Self {
        StaticSnapshot {
            outcome: Ok(snapshot),
        }
    }

    pub fn failing(error: FeedError) -> Self {
        StaticSnapshot {
            outcome: Err(error),
        }
    }

    /// Load from a saved `states/all` response body.
    pub fn from_json(body: &[u8]) -> Result<Self, FeedError> {
        Ok(StaticSnapshot::new(parse_states(body)?))
    }
}

#[async_trait]
impl SnapshotProvider for StaticSnapshot {
    async fn fetch(&self, request: &SnapshotRequest) -> Result<Snapshot, FeedError> {
        let snapshot = self.outcome.clone()?;
        let states = snapshot
            .states
            .into_iter()
            .filter(|sv| request.icao24.is_empty() || request.icao24.contains(&sv.icao24))
            .filter(|sv| match (&request.bbox, &sv.position) {
                (Some(bbox), Some(pos)) => bbox.contains(pos),
                (Some(_), None) => false,
                (None, _) => true,
            })
            .collect();
        Ok(Snapshot {
            time: snapshot.time,
            states,
        })
    }
}

// ---------------------------------------------------------------------------
// OpenSky states/all decoding
// ---------------------------------------------------------------------------

// Column indices of a state row.
const COL_ICAO24: usize = 0;
const COL_CALLSIGN: usize = 1;
const COL_COUNTRY: usize = 2;
const COL_TIME_POSITION: usize = 3;
const COL_LAST_CONTACT: usize = 4;
const COL_LON: usize = 5;
const COL_LAT: usize = 6;
const COL_BARO_ALT: usize = 7;
const COL_ON_GROUND: usize = 8;
const COL_VELOCITY: usize = 9;
const COL_TRACK: usize = 10;
const COL_VRATE: usize = 11;
const COL_SQUAWK: usize = 14;

/// Minimum row length; trailing columns (sensors, geo altitude, squawk, ...)
/// are optional.
const MIN_COLUMNS: usize = 12;

/// Decode an OpenSky `states/all` response body.
///
/// `"states": null` is an empty snapshot. Structural problems are
/// `FeedError::Malformed`. Coordinates outside the valid range are treated
/// as an unknown position.
pub fn parse_states(body: &[u8]) -> Result<Snapshot, FeedError> {
    let root: Value =
        serde_json::from_slice(body).map_err(|e| FeedError::Malformed(e.to_string()))?;

    let time = root
        .get("time")
        .and_then(Value::as_i64)
        .ok_or_else(|| FeedError::Malformed("missing \"time\"".into()))?;

    let rows = match root.get("states") {
        None | Some(Value::Null) => return Ok(Snapshot { time, states: vec![] }),
        Some(Value::Array(rows)) => rows,
        Some(_) => return Err(FeedError::Malformed("\"states\" is not an array".into())),
    };

    let states = rows
        .iter()
        .enumerate()
        .map(|(i, row)| parse_row(row).map_err(|e| FeedError::Malformed(format!("state {i}: {e}"))))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Snapshot { time, states })
}

fn parse_row(row: &Value) -> Result<StateVector, String> {
    let cols = row.as_array().ok_or("row is not an array")?;
    if cols.len() < MIN_COLUMNS {
        return Err(format!("expected at least {MIN_COLUMNS} columns, got {}", cols.len()));
    }

    let icao24 = cols[COL_ICAO24]
        .as_str()
        .ok_or("icao24 is not a string")?
        .parse::<Icao24>()
        .map_err(|e| e.to_string())?;

    let last_contact = cols[COL_LAST_CONTACT]
        .as_i64()
        .ok_or("last_contact is not an integer")?;

    let on_ground = match &cols[COL_ON_GROUND] {
        Value::Bool(b) => *b,
        Value::Null => false,
        _ => return Err("on_ground is not a boolean".into()),
    };

    let lat = opt_f64(cols, COL_LAT, "latitude")?;
    let lon = opt_f64(cols, COL_LON, "longitude")?;
    let position = match (lat, lon) {
        (Some(lat), Some(lon)) => Coordinate::new(lat, lon).ok(),
        _ => None,
    };

    Ok(StateVector {
        icao24,
        callsign: opt_string(cols, COL_CALLSIGN, "callsign")?,
        origin_country: opt_string(cols, COL_COUNTRY, "origin_country")?,
        time_position: opt_i64(cols, COL_TIME_POSITION, "time_position")?,
        last_contact,
        position,
        baro_altitude_m: opt_f64(cols, COL_BARO_ALT, "baro_altitude")?,
        on_ground,
        velocity_ms: opt_f64(cols, COL_VELOCITY, "velocity")?,
        true_track_deg: opt_f64(cols, COL_TRACK, "true_track")?,
        vertical_rate_ms: opt_f64(cols, COL_VRATE, "vertical_rate")?,
        squawk: opt_string(cols, COL_SQUAWK, "squawk")?,
    })
}

fn opt_f64(cols: &[Value], idx: usize, name: &str) -> Result<Option<f64>, String> {
    match cols.get(idx) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_f64()
            .map(Some)
            .ok_or_else(|| format!("{name} is not a number")),
    }
}

fn opt_i64(cols: &[Value], idx: usize, name: &str) -> Result<Option<i64>, String> {
    match cols.get(idx) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| format!("{name} is not an integer")),
    }
}

/// Trimmed string; blank counts as absent.
fn opt_string(cols: &[Value], idx: usize, name: &str) -> Result<Option<String>, String> {
    match cols.get(idx) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => {
            let s = s.trim();
            Ok((!s.is_empty()).then(|| s.to_string()))
        }
        Some(_) => Err(format!("{name} is not a string")),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
