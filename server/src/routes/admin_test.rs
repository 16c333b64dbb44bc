use super::*;
use axum::http::StatusCode;

use crate::services::fleet::{NewTruck, TruckStatus};
use crate::state::test_helpers;

async fn seed_deleted_truck(state: &AppState) -> Uuid {
    let truck = state
        .store
        .create_truck(NewTruck {
            vin: "TVIN".into(),
            make: "International".into(),
            model: "LT".into(),
            year: 2018,
            license_plate: "TR-1".into(),
            current_mileage: 400_000,
            status: TruckStatus::Inactive,
        })
        .await
        .expect("seed truck");
    state.store.delete_truck(truck.id).await.expect("delete");
    truck.id
}

#[tokio::test]
async fn trash_lists_deleted_truck() {
    let state = test_helpers::test_app_state();
    let id = seed_deleted_truck(&state).await;

    let Json(trash) = list_trash(State(state)).await.expect("trash");
    assert_eq!(trash.trucks.len(), 1);
    assert_eq!(trash.trucks[0].id, id);
}

#[tokio::test]
async fn restore_truck_removes_it_from_trash() {
    let state = test_helpers::test_app_state();
    let id = seed_deleted_truck(&state).await;

    let Json(resp) = restore(
        State(state.clone()),
        Json(RestoreBody { kind: Some("truck".into()), id: Some(id) }),
    )
    .await
    .expect("restore");
    assert_eq!(resp.message, "truck restored successfully");
    assert!(matches!(resp.item, RestoredItem::Truck(ref t) if t.id == id));

    let Json(trash) = list_trash(State(state)).await.expect("trash");
    assert!(trash.trucks.is_empty());
}

#[tokio::test]
async fn restore_requires_type_and_id() {
    let state = test_helpers::test_app_state();
    let err = restore(State(state), Json(RestoreBody { kind: None, id: Some(Uuid::nil()) }))
        .await
        .expect_err("missing type");
    assert_eq!(err.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn restore_rejects_unknown_type() {
    let state = test_helpers::test_app_state();
    let err = restore(
        State(state),
        Json(RestoreBody { kind: Some("mechanic".into()), id: Some(Uuid::nil()) }),
    )
    .await
    .expect_err("unknown type");
    assert_eq!(err.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn restore_live_record_is_not_found() {
    let state = test_helpers::test_app_state();
    let err = restore(
        State(state),
        Json(RestoreBody { kind: Some("maintenance".into()), id: Some(Uuid::new_v4()) }),
    )
    .await
    .expect_err("nothing to restore");
    assert_eq!(err.status, StatusCode::NOT_FOUND);
}
