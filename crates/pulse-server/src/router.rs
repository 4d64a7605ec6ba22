//! Axum router construction for the Pulse server.
//!
//! Assembles all routes (HTML + REST + `WebSocket`) into a single
//! [`Router`] with CORS and request tracing enabled.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{admin, contact, handlers, ws};

/// Build the complete Axum router for the Pulse server.
///
/// The router includes:
/// - `GET /` -- inline HTML status page
/// - `GET /ws/population` -- live population `WebSocket` stream
/// - `GET /api/population` -- current snapshots
/// - `GET /api/population/:name` -- single snapshot
/// - `GET /api/data` -- demographic data + current figures
/// - `GET /api/data/:name` -- single territory data
/// - `GET /api/validation` -- growth-rate consistency report
/// - `POST /api/contact` -- contact form intake
/// - `POST /api/admin/update-base` -- anchor replacement (admin)
/// - `GET /api/admin/messages` -- recent contact messages (admin)
///
/// CORS is configured to allow any origin for development. In
/// production this should be restricted.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Status page
        .route("/", get(handlers::index))
        // WebSocket
        .route("/ws/population", get(ws::ws_population))
        // REST API
        .route("/api/population", get(handlers::population_all))
        .route("/api/population/{name}", get(handlers::population_one))
        .route("/api/data", get(handlers::data_all))
        .route("/api/data/{name}", get(handlers::data_one))
        .route("/api/validation", get(handlers::validation))
        .route("/api/contact", post(contact::submit_contact))
        // Admin
        .route("/api/admin/update-base", post(admin::update_base))
        .route("/api/admin/messages", get(contact::list_messages))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
