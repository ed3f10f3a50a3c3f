//! REST API route handlers.
//!
//! Query parameters arrive as strings and are parsed here so that every
//! client-input problem gets the same JSON error shape. Engine errors map to
//! HTTP status through `ApiError`.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use skyquery_core::area::AircraftFilter;
use skyquery_core::distance::{estimate_route, DistanceUnit, DEFAULT_CRUISE_KTS};
use skyquery_core::feed::FeedError;
use skyquery_core::types::{Coordinate, Icao24, QueryError};

use crate::web::AppState;

const SERVICE_NAME: &str = "skyquery";

// ---------------------------------------------------------------------------
// Query param types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct AreaParams {
    latitude: Option<String>,
    longitude: Option<String>,
    radius: Option<String>,
    altitude_min: Option<String>,
    altitude_max: Option<String>,
    aircraft_type: Option<String>,
}

#[derive(Deserialize)]
pub struct AircraftInfoParams {
    identifier: Option<String>,
    identifier_type: Option<String>,
}

#[derive(Deserialize)]
pub struct RouteParams {
    origin: Option<String>,
    destination: Option<String>,
    unit: Option<String>,
    average_speed_knots: Option<String>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Engine error on its way to an HTTP response.
pub struct ApiError(QueryError);

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        ApiError(err)
    }
}

/// 400 for caller mistakes, 503 when the feed asks us to back off, 502 for
/// any other feed failure.
pub fn status_for(err: &QueryError) -> StatusCode {
    match err {
        QueryError::InvalidParameter(_) => StatusCode::BAD_REQUEST,
        QueryError::UpstreamUnavailable(FeedError::RateLimited { .. }) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        QueryError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
        QueryError::Config(_) | QueryError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            tracing::warn!(%status, error = %self.0, "request failed");
        }
        (
            status,
            Json(json!({"success": false, "error": self.0.to_string()})),
        )
            .into_response()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Required numeric parameter.
fn required_f64(name: &str, raw: Option<&str>) -> Result<f64, QueryError> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| QueryError::InvalidParameter(format!("missing required parameter: {name}")))?;
    parse_f64(name, raw)
}

/// Optional numeric parameter; blank counts as absent.
fn optional_f64(name: &str, raw: Option<&str>) -> Result<Option<f64>, QueryError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => parse_f64(name, s).map(Some),
    }
}

fn parse_f64(name: &str, raw: &str) -> Result<f64, QueryError> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| QueryError::InvalidParameter(format!("{name} must be a number, got {raw:?}")))
}

/// Attach `"success": true` to a serialized payload.
fn success(payload: impl serde::Serialize) -> Result<Json<Value>, ApiError> {
    let mut value = serde_json::to_value(payload)
        .map_err(|e| QueryError::Internal(format!("serializing response: {e}")))?;
    if let Value::Object(map) = &mut value {
        map.insert("success".into(), Value::Bool(true));
    }
    Ok(Json(value))
}

// ---------------------------------------------------------------------------
// Index + health
// ---------------------------------------------------------------------------

/// GET /: endpoint listing.
pub async fn api_index() -> impl IntoResponse {
    Json(json!({
        "name": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Live aircraft within a radius, closest first",
        "endpoints": {
            "collect_adsb_data": {
                "method": "GET",
                "path": "/api/collect_adsb_data",
                "parameters": {
                    "latitude": "float (required) - center latitude",
                    "longitude": "float (required) - center longitude",
                    "radius": "float (required) - search radius in nautical miles",
                    "altitude_min": "float (optional) - minimum altitude in feet",
                    "altitude_max": "float (optional) - maximum altitude in feet",
                    "aircraft_type": "string (optional) - match against icao24 or callsign"
                },
                "example": "/api/collect_adsb_data?latitude=37.7749&longitude=-122.4194&radius=50"
            },
            "get_aircraft_info": {
                "method": "GET",
                "path": "/api/get_aircraft_info",
                "parameters": {
                    "identifier": "string (required) - aircraft identifier",
                    "identifier_type": "string (required) - icao24 or flight_number"
                },
                "example": "/api/get_aircraft_info?identifier=a1b2c3&identifier_type=icao24"
            },
            "calculate_route_distance": {
                "method": "GET",
                "path": "/api/calculate_route_distance",
                "parameters": {
                    "origin": "string (required) - lat,lon",
                    "destination": "string (required) - lat,lon",
                    "unit": "string (optional) - nautical_miles, kilometers, or statute_miles",
                    "average_speed_knots": "float (optional, default: 450)"
                },
                "example": "/api/calculate_route_distance?origin=37.6213,-122.3790&destination=40.6413,-73.7781"
            }
        }
    }))
}

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ---------------------------------------------------------------------------
// Area query
// ---------------------------------------------------------------------------

/// GET /api/collect_adsb_data: aircraft within a radius, closest first.
pub async fn api_collect_adsb_data(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AreaParams>,
) -> Result<Json<Value>, ApiError> {
    let lat = required_f64("latitude", params.latitude.as_deref())?;
    let lon = required_f64("longitude", params.longitude.as_deref())?;
    let radius = required_f64("radius", params.radius.as_deref())?;
    let center = Coordinate::new(lat, lon)?;

    let filter = AircraftFilter {
        altitude_min_ft: optional_f64("altitude_min", params.altitude_min.as_deref())?,
        altitude_max_ft: optional_f64("altitude_max", params.altitude_max.as_deref())?,
        ident: params.aircraft_type.filter(|s| !s.trim().is_empty()),
    };

    let result = state
        .engine
        .query_area_filtered(center, radius, &filter)
        .await?;

    tracing::info!(
        center = %center,
        radius_nm = radius,
        aircraft = result.aircraft_count,
        "area query"
    );

    success(result)
}

// ---------------------------------------------------------------------------
// Aircraft lookup
// ---------------------------------------------------------------------------

/// GET /api/get_aircraft_info: current state of one aircraft.
pub async fn api_aircraft_info(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AircraftInfoParams>,
) -> Result<Response, ApiError> {
    let (Some(identifier), Some(identifier_type)) = (params.identifier, params.identifier_type)
    else {
        return Err(QueryError::InvalidParameter(
            "missing required parameters: identifier and identifier_type".into(),
        )
        .into());
    };

    let found = match identifier_type.as_str() {
        "icao24" => {
            let icao24: Icao24 = identifier.parse()?;
            state.engine.lookup_aircraft(icao24).await?
        }
        "flight_number" => state.engine.lookup_callsign(&identifier).await?,
        "registration" => {
            return Err(QueryError::InvalidParameter(
                "identifier_type registration cannot be resolved against the live feed; use icao24 or flight_number".into(),
            )
            .into())
        }
        other => {
            return Err(QueryError::InvalidParameter(format!(
                "invalid identifier_type {other:?}: must be flight_number, icao24, or registration"
            ))
            .into())
        }
    };

    match found {
        Some(sv) => Ok(success(json!({
            "identifier_type": identifier_type,
            "aircraft": sv,
            "altitude_ft": sv.altitude_ft(),
            "velocity_kts": sv.velocity_kts(),
        }))?
        .into_response()),
        None => Ok((
            StatusCode::NOT_FOUND,
            Json(json!({
                "success": false,
                "error": "aircraft not found or not currently transmitting",
                "identifier": identifier,
            })),
        )
            .into_response()),
    }
}

// ---------------------------------------------------------------------------
// Route distance
// ---------------------------------------------------------------------------

/// GET /api/calculate_route_distance: great-circle distance and flight time.
pub async fn api_route_distance(
    Query(params): Query<RouteParams>,
) -> Result<Json<Value>, ApiError> {
    let (Some(origin), Some(destination)) = (params.origin, params.destination) else {
        return Err(QueryError::InvalidParameter(
            "missing required parameters: origin, destination".into(),
        )
        .into());
    };

    let from: Coordinate = origin.parse()?;
    let to: Coordinate = destination.parse()?;
    let unit = match params.unit.as_deref() {
        Some(u) if !u.trim().is_empty() => u.parse::<DistanceUnit>()?,
        _ => DistanceUnit::default(),
    };
    let speed = optional_f64("average_speed_knots", params.average_speed_knots.as_deref())?
        .unwrap_or(DEFAULT_CRUISE_KTS);

    let estimate = estimate_route(from, to, unit, speed)?;
    success(estimate)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use skyquery_core::area::AreaQueryEngine;
    use skyquery_core::config::EngineConfig;
    use skyquery_core::feed::StaticSnapshot;
    use skyquery_core::types::{Snapshot, StateVector};

    fn aircraft(icao: &str, lat: f64, lon: f64) -> StateVector {
        let mut sv = StateVector::new(icao.parse().unwrap(), 1700000000);
        sv.position = Some(Coordinate::new(lat, lon).unwrap());
        sv
    }

    fn app_with(provider: StaticSnapshot) -> axum::Router {
        let engine = AreaQueryEngine::new(EngineConfig::default(), Arc::new(provider));
        crate::web::build_router(Arc::new(AppState { engine }))
    }

    fn test_app() -> axum::Router {
        let mut ual = aircraft("a1b2c3", 37.7850, -122.4100);
        ual.callsign = Some("UAL123".into());
        ual.baro_altitude_m = Some(3048.0);
        let far = aircraft("3c6444", 52.25, 3.92);
        let mut no_fix = StateVector::new("00abcd".parse().unwrap(), 1700000000);
        no_fix.callsign = Some("GHOST".into());

        app_with(StaticSnapshot::new(Snapshot {
            time: 1700000000,
            states: vec![far, ual, no_fix],
        }))
    }

    async fn get(app: axum::Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (status, json) = get(test_app(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "healthy");
    }

    #[tokio::test]
    async fn test_index_lists_endpoints() {
        let (status, json) = get(test_app(), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["endpoints"]["collect_adsb_data"].is_object());
    }

    #[tokio::test]
    async fn test_collect_adsb_data() {
        let (status, json) = get(
            test_app(),
            "/api/collect_adsb_data?latitude=37.7749&longitude=-122.4194&radius=50",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert_eq!(json["aircraft_count"], 1);
        assert_eq!(json["aircraft"][0]["icao24"], "a1b2c3");
        assert_eq!(json["aircraft"][0]["callsign"], "UAL123");
        assert_eq!(json["aircraft"][0]["altitude_ft"], 10000);
        let d = json["aircraft"][0]["distance_nm"].as_f64().unwrap();
        assert!((d - 0.75).abs() < 0.05);
        assert_eq!(json["search_area"]["radius_nm"], 50.0);
        assert_eq!(json["search_area"]["center"]["latitude"], 37.7749);
        assert!(json["search_area"]["bounding_box"].is_object());
    }

    #[tokio::test]
    async fn test_collect_adsb_data_filters() {
        let (status, json) = get(
            test_app(),
            "/api/collect_adsb_data?latitude=37.7749&longitude=-122.4194&radius=50&altitude_min=20000",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["aircraft_count"], 0);

        let (_, json) = get(
            test_app(),
            "/api/collect_adsb_data?latitude=37.7749&longitude=-122.4194&radius=50&aircraft_type=ual",
        )
        .await;
        assert_eq!(json["aircraft_count"], 1);
    }

    #[tokio::test]
    async fn test_collect_adsb_data_bad_params() {
        for uri in [
            "/api/collect_adsb_data?latitude=37.7749&longitude=-122.4194",
            "/api/collect_adsb_data?latitude=abc&longitude=-122.4194&radius=50",
            "/api/collect_adsb_data?latitude=91&longitude=-122.4194&radius=50",
            "/api/collect_adsb_data?latitude=37.7749&longitude=-122.4194&radius=251",
            "/api/collect_adsb_data?latitude=37.7749&longitude=-122.4194&radius=-1",
            "/api/collect_adsb_data?latitude=37.7749&longitude=-122.4194&radius=NaN",
        ] {
            let (status, json) = get(test_app(), uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(json["success"], false);
            assert!(json["error"].is_string());
        }
    }

    #[tokio::test]
    async fn test_collect_adsb_data_upstream_errors() {
        let app = app_with(StaticSnapshot::failing(FeedError::Unreachable(
            "connection refused".into(),
        )));
        let (status, json) = get(
            app,
            "/api/collect_adsb_data?latitude=37.7749&longitude=-122.4194&radius=50",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(json["success"], false);
        assert!(json.get("aircraft").is_none());

        let app = app_with(StaticSnapshot::failing(FeedError::RateLimited {
            retry_after_secs: None,
        }));
        let (status, _) = get(
            app,
            "/api/collect_adsb_data?latitude=37.7749&longitude=-122.4194&radius=50",
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_aircraft_info() {
        let (status, json) = get(
            test_app(),
            "/api/get_aircraft_info?identifier=3C6444&identifier_type=icao24",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["aircraft"]["icao24"], "3c6444");

        let (status, _) = get(
            test_app(),
            "/api/get_aircraft_info?identifier=ffffff&identifier_type=icao24",
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, json) = get(
            test_app(),
            "/api/get_aircraft_info?identifier=ual123&identifier_type=flight_number",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["aircraft"]["icao24"], "a1b2c3");
        assert_eq!(json["identifier_type"], "flight_number");
        assert_eq!(json["altitude_ft"], 10000);

        let (status, _) = get(
            test_app(),
            "/api/get_aircraft_info?identifier=DAL9&identifier_type=flight_number",
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = get(
            test_app(),
            "/api/get_aircraft_info?identifier=N12345&identifier_type=registration",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = get(test_app(), "/api/get_aircraft_info?identifier=a1b2c3").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_route_distance() {
        let (status, json) = get(
            test_app(),
            "/api/calculate_route_distance?origin=37.7749,-122.4194&destination=40.7128,-74.0060&unit=kilometers",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["unit"], "kilometers");
        let km = json["distance"].as_f64().unwrap();
        assert!((km - 4129.0).abs() < 10.0);
        assert_eq!(json["average_speed_kts"], 450.0);

        let (status, _) = get(
            test_app(),
            "/api/calculate_route_distance?origin=KSFO&destination=KJFK",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = get(
            test_app(),
            "/api/calculate_route_distance?origin=0,0&destination=1,1&unit=furlongs",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unserializable_payload_is_server_error() {
        // Non-string map keys cannot become a JSON object.
        let payload: std::collections::HashMap<(i32, i32), i32> = [((1, 2), 3)].into();
        let err = match success(payload) {
            Err(e) => e,
            Ok(_) => panic!("expected serialization failure"),
        };
        assert!(matches!(err.0, QueryError::Internal(_)));

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], false);
        assert!(json["error"].as_str().unwrap().contains("serializing response"));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&QueryError::InvalidParameter("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&QueryError::UpstreamUnavailable(FeedError::Unauthorized)),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(&QueryError::UpstreamUnavailable(FeedError::Malformed("x".into()))),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(&QueryError::UpstreamUnavailable(FeedError::RateLimited {
                retry_after_secs: Some(5)
            })),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_for(&QueryError::Internal("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
