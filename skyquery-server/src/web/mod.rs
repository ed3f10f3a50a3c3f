//! Web server: axum REST API for area queries.
//!
//! Shared state is a single `AreaQueryEngine`; it is stateless, so handlers
//! use it concurrently without locking.

use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use skyquery_core::area::AreaQueryEngine;

pub mod routes;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

pub struct AppState {
    pub engine: AreaQueryEngine,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", axum::routing::get(routes::api_index))
        .route("/health", axum::routing::get(routes::health))
        .route(
            "/api/collect_adsb_data",
            axum::routing::get(routes::api_collect_adsb_data),
        )
        .route(
            "/api/get_aircraft_info",
            axum::routing::get(routes::api_aircraft_info),
        )
        .route(
            "/api/calculate_route_distance",
            axum::routing::get(routes::api_route_distance),
        )
        .with_state(state)
        .layer(cors)
}

/// Start the web server.
pub async fn serve(engine: AreaQueryEngine, host: &str, port: u16) -> std::io::Result<()> {
    let state = Arc::new(AppState { engine });

    let app = build_router(state);
    let addr = format!("{host}:{port}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("skyquery API listening on http://{addr}");
    axum::serve(listener, app).await
}
