//! Area query engine: aircraft inside a circle, closest first.
//!
//! Each query fetches one fresh snapshot, measures every positioned aircraft
//! against the center, keeps those within the radius, and sorts by distance
//! with the transponder address as tie-break. Nothing is cached between
//! queries.

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::distance::{bounding_box, great_circle_distance_on};
use crate::feed::{SnapshotProvider, SnapshotRequest};
use crate::types::*;

// ---------------------------------------------------------------------------
// Attribute filter
// ---------------------------------------------------------------------------

/// Optional narrowing applied after the distance test.
///
/// Altitude bounds only exclude aircraft whose altitude is known. `ident`
/// matches case-insensitively anywhere in the icao24 or the callsign.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AircraftFilter {
    pub altitude_min_ft: Option<f64>,
    pub altitude_max_ft: Option<f64>,
    pub ident: Option<String>,
}

impl AircraftFilter {
    pub fn validate(&self) -> Result<()> {
        for (name, bound) in [
            ("altitude_min", self.altitude_min_ft),
            ("altitude_max", self.altitude_max_ft),
        ] {
            if matches!(bound, Some(v) if !v.is_finite()) {
                return Err(QueryError::invalid(format!("{name} must be a finite number")));
            }
        }
        if let (Some(min), Some(max)) = (self.altitude_min_ft, self.altitude_max_ft) {
            if min > max {
                return Err(QueryError::invalid(format!(
                    "altitude_min ({min} ft) is above altitude_max ({max} ft)"
                )));
            }
        }
        Ok(())
    }

    pub fn matches(&self, sv: &StateVector) -> bool {
        if let Some(alt) = sv.altitude_ft() {
            let alt = f64::from(alt);
            if self.altitude_min_ft.is_some_and(|min| alt < min) {
                return false;
            }
            if self.altitude_max_ft.is_some_and(|max| alt > max) {
                return false;
            }
        }

        match self.ident.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(ident) => {
                let needle = ident.to_ascii_lowercase();
                sv.icao24.to_string().contains(&needle)
                    || sv
                        .callsign
                        .as_deref()
                        .is_some_and(|cs| cs.to_ascii_lowercase().contains(&needle))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Stateless query engine over an injected snapshot provider.
///
/// Holds only immutable config and a shared provider handle, so one engine
/// can serve any number of concurrent queries.
#[derive(Clone)]
pub struct AreaQueryEngine {
    config: EngineConfig,
    provider: Arc<dyn SnapshotProvider>,
}

impl AreaQueryEngine {
    pub fn new(config: EngineConfig, provider: Arc<dyn SnapshotProvider>) -> Self {
        AreaQueryEngine { config, provider }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Build and validate a query circle against the configured maximum.
    pub fn circle(&self, center: Coordinate, radius_nm: f64) -> Result<QueryCircle> {
        QueryCircle::new(center, radius_nm, self.config.max_radius_nm)
    }

    /// All aircraft within `radius_nm` of `center`.
    pub async fn query_area(&self, center: Coordinate, radius_nm: f64) -> Result<AreaQueryResult> {
        self.query_area_filtered(center, radius_nm, &AircraftFilter::default())
            .await
    }

    /// All aircraft within `radius_nm` of `center` that also pass `filter`.
    ///
    /// A feed failure is returned as `UpstreamUnavailable`; an empty list
    /// only ever means the snapshot held nothing inside the circle.
    pub async fn query_area_filtered(
        &self,
        center: Coordinate,
        radius_nm: f64,
        filter: &AircraftFilter,
    ) -> Result<AreaQueryResult> {
        let circle = self.circle(center, radius_nm)?;
        filter.validate()?;

        let bbox = bounding_box(&circle, self.config.earth_radius_km);
        let request = SnapshotRequest {
            bbox,
            icao24: Vec::new(),
        };
        let snapshot = self.provider.fetch(&request).await?;

        let aircraft = self.select(&circle, filter, snapshot.states);

        Ok(AreaQueryResult {
            aircraft_count: aircraft.len(),
            search_area: SearchArea {
                circle,
                bounding_box: bbox,
            },
            timestamp: snapshot.time,
            aircraft,
        })
    }

    /// Filter, annotate, and order a set of state vectors. Pure.
    pub fn select(
        &self,
        circle: &QueryCircle,
        filter: &AircraftFilter,
        states: Vec<StateVector>,
    ) -> Vec<AnnotatedAircraft> {
        let center = circle.center();
        let radius_nm = circle.radius_nm();

        let mut aircraft: Vec<AnnotatedAircraft> = states
            .into_iter()
            .filter_map(|sv| {
                let pos = sv.position?;
                let distance = great_circle_distance_on(center, pos, self.config.earth_radius_km);
                (distance.nm() <= radius_nm && filter.matches(&sv))
                    .then(|| AnnotatedAircraft::new(sv, distance))
            })
            .collect();

        aircraft.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.state.icao24.cmp(&b.state.icao24))
        });
        aircraft
    }

    /// Current state of a single aircraft, if the feed is tracking it.
    pub async fn lookup_aircraft(&self, icao24: Icao24) -> Result<Option<StateVector>> {
        let request = SnapshotRequest {
            bbox: None,
            icao24: vec![icao24],
        };
        let snapshot = self.provider.fetch(&request).await?;
        Ok(snapshot.states.into_iter().find(|sv| sv.icao24 == icao24))
    }

    /// Current state of the aircraft broadcasting `callsign`. The feed has no
    /// callsign selector, so this fetches the whole snapshot.
    pub async fn lookup_callsign(&self, callsign: &str) -> Result<Option<StateVector>> {
        let wanted = callsign.trim();
        if wanted.is_empty() {
            return Err(QueryError::invalid("callsign must not be empty"));
        }
        let snapshot = self.provider.fetch(&SnapshotRequest::default()).await?;
        Ok(snapshot.states.into_iter().find(|sv| {
            sv.callsign
                .as_deref()
                .is_some_and(|c| c.eq_ignore_ascii_case(wanted))
        }))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
