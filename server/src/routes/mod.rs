//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! This module binds the fleet REST API, the dashboard stats endpoint, the
//! admin trash endpoints, and the live channel under a single Axum router.
//! Mutating handlers report success as soon as the store commits; live
//! notification happens afterwards in `services::notify`.

pub mod admin;
pub mod dashboard;
pub mod live;
pub mod maintenance;
pub mod trucks;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::services::fleet::FleetError;
use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/dashboard/stats", get(dashboard::stats))
        .route("/api/trucks", get(trucks::list_trucks).post(trucks::create_truck))
        .route(
            "/api/trucks/{id}",
            get(trucks::get_truck)
                .put(trucks::update_truck)
                .delete(trucks::delete_truck),
        )
        .route(
            "/api/maintenance",
            get(maintenance::list_maintenance).post(maintenance::create_maintenance),
        )
        .route(
            "/api/maintenance/{id}",
            get(maintenance::get_maintenance)
                .put(maintenance::update_maintenance)
                .delete(maintenance::delete_maintenance),
        )
        .route("/api/admin/trash", get(admin::list_trash))
        .route("/api/admin/trash/restore", post(admin::restore))
        .route(events::LIVE_PATH, get(live::handle_live))
        .route("/api/health/db", get(health_db))
        .route("/healthz", get(healthz))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

/// `GET /api/health/db`: store reachability.
async fn health_db(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    state.store.ping().await?;
    Ok(Json(json!({ "status": "ok" })))
}

// =============================================================================
// ERRORS
// =============================================================================

/// JSON error body: `{"error": message, "code": "E_..."}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, code: "E_INVALID", message: message.into() }
    }
}

pub(crate) fn fleet_error_to_status(err: &FleetError) -> StatusCode {
    match err {
        FleetError::TruckNotFound(_) | FleetError::MaintenanceNotFound(_) => StatusCode::NOT_FOUND,
        FleetError::Invalid(_) => StatusCode::BAD_REQUEST,
        FleetError::DuplicateVin(_) | FleetError::DuplicatePlate(_) => StatusCode::CONFLICT,
        FleetError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<FleetError> for ApiError {
    fn from(err: FleetError) -> Self {
        let status = fleet_error_to_status(&err);
        let message = if let FleetError::Database(e) = &err {
            tracing::error!(error = %e, "fleet store query failed");
            "internal server error".to_owned()
        } else {
            err.to_string()
        };
        Self { status, code: err.error_code(), message }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message, "code": self.code }))).into_response()
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
