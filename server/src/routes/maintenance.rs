//! Maintenance record REST routes.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use events::{Action, Category};
use serde::Deserialize;
use uuid::Uuid;

use crate::routes::ApiError;
use crate::services::fleet::{MaintenanceInput, MaintenanceQuery, MaintenanceRecord};
use crate::services::notify;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct MaintenanceListParams {
    pub limit: Option<usize>,
    pub truck_id: Option<Uuid>,
}

/// `GET /api/maintenance`: newest first, optionally for one truck.
pub async fn list_maintenance(
    State(state): State<AppState>,
    Query(params): Query<MaintenanceListParams>,
) -> Result<Json<Vec<MaintenanceRecord>>, ApiError> {
    let query = MaintenanceQuery { truck_id: params.truck_id, limit: params.limit };
    Ok(Json(state.store.list_maintenance(&query).await?))
}

pub async fn get_maintenance(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MaintenanceRecord>, ApiError> {
    Ok(Json(state.store.get_maintenance(id).await?))
}

pub async fn create_maintenance(
    State(state): State<AppState>,
    Json(body): Json<MaintenanceInput>,
) -> Result<(StatusCode, Json<MaintenanceRecord>), ApiError> {
    let record = state.store.create_maintenance(body.validate()?).await?;
    notify::record_changed(&state, Category::Maintenance, Action::Created, &record);
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn update_maintenance(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<MaintenanceInput>,
) -> Result<Json<MaintenanceRecord>, ApiError> {
    let record = state.store.update_maintenance(id, body.validate()?).await?;
    notify::record_changed(&state, Category::Maintenance, Action::Updated, &record);
    Ok(Json(record))
}

pub async fn delete_maintenance(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MaintenanceRecord>, ApiError> {
    let record = state.store.delete_maintenance(id).await?;
    notify::record_changed(&state, Category::Maintenance, Action::Deleted, &record);
    Ok(Json(record))
}

#[cfg(test)]
#[path = "maintenance_test.rs"]
mod tests;
