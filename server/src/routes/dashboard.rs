//! Dashboard aggregate route. This is the "stats" resource clients poll when
//! the live channel is down.

use axum::extract::State;
use axum::response::Json;
use events::now_ms;

use crate::routes::ApiError;
use crate::services::fleet::DashboardStats;
use crate::state::AppState;

/// `GET /api/dashboard/stats`
pub async fn stats(State(state): State<AppState>) -> Result<Json<DashboardStats>, ApiError> {
    Ok(Json(state.store.dashboard_stats(now_ms()).await?))
}
