//! HTTP routes served behind the authentication gate

use axum::http::StatusCode;
use axum::routing::get;
use axum::{Extension, Json, Router};
use my_copilot_auth::gate::{AuthGateLayer, GateConfig};
use my_copilot_auth::{AuthStrategy, Identity};

/// Build the application router with the gate applied to every route
pub fn router(strategy: AuthStrategy, gate: GateConfig) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/me", get(me))
        .fallback(not_found)
        .layer(AuthGateLayer::with_config(strategy, gate))
}

async fn health() -> &'static str {
    "ok"
}

async fn me(Extension(identity): Extension<Identity>) -> Json<Identity> {
    Json(identity)
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}
