//! HTTP router for the custody service.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! Ledger routes are nested under `/api/`, the event feed sits at
//! `/ws/events`.
//!
//! Middleware stack (outermost → innermost):
//! 1. CORS → 2. Access logger

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::api::websocket;
use crate::core_state::CustodyState;

/// Build the custody API router.
pub fn api_router(state: Arc<CustodyState>) -> Router {
    let ctx = ApiContext::new(state);

    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let api = Router::new()
        .route("/health", get(endpoints::health::check))
        .route(
            "/medications",
            get(endpoints::medications::list).post(endpoints::medications::register),
        )
        .route("/medications/:id/count", get(endpoints::medications::count))
        .route(
            "/medications/:id/discontinue",
            post(endpoints::medications::discontinue),
        )
        .route(
            "/medications/:id/reactivate",
            post(endpoints::medications::reactivate),
        )
        .route("/medications/:id/custody", get(endpoints::medications::custody))
        .route(
            "/medications/:id/custody/verify",
            get(endpoints::medications::verify),
        )
        .route(
            "/administrations",
            get(endpoints::administrations::list).post(endpoints::administrations::record),
        )
        .route("/audits", post(endpoints::audits::submit))
        .route("/audits/pending", get(endpoints::audits::pending))
        .route("/audits/archive", get(endpoints::audits::archive))
        .route("/audits/:id", get(endpoints::audits::detail))
        .route("/audits/:id/decision", post(endpoints::audits::decide))
        .route(
            "/alerts",
            get(endpoints::alerts::list).post(endpoints::alerts::create),
        )
        .route("/alerts/:id/resolve", post(endpoints::alerts::resolve));

    Router::new()
        .nest("/api", api)
        .route("/ws/events", get(websocket::ws_upgrade))
        .with_state(ctx)
        .layer(axum::middleware::from_fn(middleware::access::log_access))
        .layer(CorsLayer::permissive())
}
