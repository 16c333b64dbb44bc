use super::*;
use uuid::Uuid;

use crate::state::test_helpers;

#[test]
fn fleet_error_to_status_maps_not_found() {
    let err = FleetError::TruckNotFound(Uuid::nil());
    assert_eq!(fleet_error_to_status(&err), StatusCode::NOT_FOUND);
    let err = FleetError::MaintenanceNotFound(Uuid::nil());
    assert_eq!(fleet_error_to_status(&err), StatusCode::NOT_FOUND);
}

#[test]
fn fleet_error_to_status_maps_duplicates_to_conflict() {
    assert_eq!(fleet_error_to_status(&FleetError::DuplicateVin("V".into())), StatusCode::CONFLICT);
    assert_eq!(fleet_error_to_status(&FleetError::DuplicatePlate("P".into())), StatusCode::CONFLICT);
}

#[test]
fn api_error_keeps_validation_message() {
    let err = ApiError::from(FleetError::Invalid("all fields are required".into()));
    assert_eq!(err.status, StatusCode::BAD_REQUEST);
    assert_eq!(err.code, "E_INVALID");
    assert_eq!(err.message, "all fields are required");
}

#[test]
fn api_error_hides_database_detail() {
    let err = ApiError::from(FleetError::Database(sqlx::Error::PoolTimedOut));
    assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(err.message, "internal server error");
}

#[tokio::test]
async fn health_endpoints_respond_ok() {
    let addr = test_helpers::spawn_app(test_helpers::test_app_state()).await;
    let http = reqwest::Client::new();

    let live = http.get(format!("http://{addr}/healthz")).send().await.expect("healthz");
    assert_eq!(live.status(), reqwest::StatusCode::OK);

    let db: serde_json::Value = http
        .get(format!("http://{addr}/api/health/db"))
        .send()
        .await
        .expect("health db")
        .json()
        .await
        .expect("json body");
    assert_eq!(db["status"], "ok");
}
