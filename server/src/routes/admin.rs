//! Trash listing and restore.
//!
//! Restoring a record is announced as an `updated` event so dashboards that
//! dropped it on delete pick it back up.

use axum::extract::State;
use axum::response::Json;
use events::{Action, Category};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::routes::ApiError;
use crate::services::fleet::{MaintenanceRecord, TrashListing, Truck};
use crate::services::notify;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RestoreBody {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum RestoredItem {
    Truck(Truck),
    Maintenance(MaintenanceRecord),
}

#[derive(Debug, Serialize)]
pub struct RestoreResponse {
    pub message: String,
    pub item: RestoredItem,
}

/// `GET /api/admin/trash`
pub async fn list_trash(State(state): State<AppState>) -> Result<Json<TrashListing>, ApiError> {
    Ok(Json(state.store.list_trash().await?))
}

/// `POST /api/admin/trash/restore`: `{type: "truck"|"maintenance", id}`.
pub async fn restore(
    State(state): State<AppState>,
    Json(body): Json<RestoreBody>,
) -> Result<Json<RestoreResponse>, ApiError> {
    let (Some(kind), Some(id)) = (body.kind, body.id) else {
        return Err(ApiError::bad_request("type and id are required"));
    };

    let item = match kind.as_str() {
        "truck" => {
            let truck = state.store.restore_truck(id).await?;
            notify::record_changed(&state, Category::Truck, Action::Updated, &truck);
            RestoredItem::Truck(truck)
        }
        "maintenance" => {
            let record = state.store.restore_maintenance(id).await?;
            notify::record_changed(&state, Category::Maintenance, Action::Updated, &record);
            RestoredItem::Maintenance(record)
        }
        other => {
            return Err(ApiError::bad_request(format!(
                "invalid type {other}; must be truck or maintenance"
            )));
        }
    };

    Ok(Json(RestoreResponse { message: format!("{kind} restored successfully"), item }))
}

#[cfg(test)]
#[path = "admin_test.rs"]
mod tests;
