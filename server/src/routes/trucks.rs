//! Truck REST routes.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use events::{Action, Category};
use serde::Deserialize;
use uuid::Uuid;

use crate::routes::ApiError;
use crate::services::fleet::{Truck, TruckInput, TruckQuery, TruckStatus, current_year};
use crate::services::notify;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct TruckListParams {
    pub limit: Option<usize>,
    pub search: Option<String>,
    pub status: Option<String>,
}

impl TruckListParams {
    fn into_query(self) -> Result<TruckQuery, ApiError> {
        let status = match self.status.as_deref().filter(|s| !s.is_empty()) {
            None => None,
            Some(raw) => Some(
                TruckStatus::parse(raw).ok_or_else(|| ApiError::bad_request(format!("unknown truck status: {raw}")))?,
            ),
        };
        Ok(TruckQuery { search: self.search, status, limit: self.limit })
    }
}

/// `GET /api/trucks`: newest first, optionally filtered.
pub async fn list_trucks(
    State(state): State<AppState>,
    Query(params): Query<TruckListParams>,
) -> Result<Json<Vec<Truck>>, ApiError> {
    let query = params.into_query()?;
    Ok(Json(state.store.list_trucks(&query).await?))
}

/// `GET /api/trucks/:id`
pub async fn get_truck(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Truck>, ApiError> {
    Ok(Json(state.store.get_truck(id).await?))
}

/// `POST /api/trucks`: create and announce to the dashboard group.
pub async fn create_truck(
    State(state): State<AppState>,
    Json(body): Json<TruckInput>,
) -> Result<(StatusCode, Json<Truck>), ApiError> {
    let input = body.validate(current_year())?;
    let truck = state.store.create_truck(input).await?;
    notify::record_changed(&state, Category::Truck, Action::Created, &truck);
    Ok((StatusCode::CREATED, Json(truck)))
}

/// `PUT /api/trucks/:id`
pub async fn update_truck(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<TruckInput>,
) -> Result<Json<Truck>, ApiError> {
    let input = body.validate(current_year())?;
    let truck = state.store.update_truck(id, input).await?;
    notify::record_changed(&state, Category::Truck, Action::Updated, &truck);
    Ok(Json(truck))
}

/// `DELETE /api/trucks/:id`: soft delete; maintenance records follow.
pub async fn delete_truck(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Truck>, ApiError> {
    let truck = state.store.delete_truck(id).await?;
    notify::record_changed(&state, Category::Truck, Action::Deleted, &truck);
    Ok(Json(truck))
}

#[cfg(test)]
#[path = "trucks_test.rs"]
mod tests;
