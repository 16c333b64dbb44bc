use super::*;
use events::{DASHBOARD_GROUP, PushMessage};
use tokio::time::{Duration, timeout};

use crate::services::fleet::{NewTruck, TruckStatus};
use crate::state::test_helpers;

async fn seed_truck(state: &AppState) -> Uuid {
    let truck = state
        .store
        .create_truck(NewTruck {
            vin: "MVIN".into(),
            make: "Kenworth".into(),
            model: "T680".into(),
            year: 2019,
            license_plate: "MP-1".into(),
            current_mileage: 300_000,
            status: TruckStatus::Maintenance,
        })
        .await
        .expect("seed truck");
    truck.id
}

fn body(truck_id: Uuid) -> MaintenanceInput {
    MaintenanceInput {
        truck_id: Some(truck_id),
        service_type: Some("transmission".into()),
        description: Some("rebuild".into()),
        date_performed: Some(events::now_ms()),
        mileage: Some(300_010),
        parts_cost: Some(1_500.0),
        labor_cost: Some(700.0),
        status: Some("IN_PROGRESS".into()),
        next_service_due: None,
    }
}

#[tokio::test]
async fn create_maintenance_broadcasts_record_and_stats() {
    let state = test_helpers::test_app_state();
    let truck_id = seed_truck(&state).await;
    let hub = state.hub.current().expect("hub installed");
    let client = Uuid::new_v4();
    let mut rx = hub.connect(client).await;
    hub.join(client, DASHBOARD_GROUP).await;

    let (status, Json(record)) = create_maintenance(State(state.clone()), Json(body(truck_id)))
        .await
        .expect("create");
    assert_eq!(status, StatusCode::CREATED);
    assert!((record.total_cost - 2_200.0).abs() < f64::EPSILON);

    let first = timeout(Duration::from_millis(200), rx.recv())
        .await
        .expect("timed out")
        .expect("queue open");
    assert!(matches!(first, PushMessage::MaintenanceUpdate(ref u) if u.action == Action::Created));

    let second = timeout(Duration::from_millis(200), rx.recv())
        .await
        .expect("timed out")
        .expect("queue open");
    let PushMessage::DashboardUpdate(stats) = second else {
        panic!("expected dashboard-update, got {second:?}");
    };
    assert_eq!(stats.data["upcoming_maintenance"], 1);
}

#[tokio::test]
async fn create_maintenance_for_unknown_truck_is_bad_request() {
    let state = test_helpers::test_app_state();
    let err = create_maintenance(State(state), Json(body(Uuid::new_v4())))
        .await
        .expect_err("unknown truck");
    assert_eq!(err.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn list_maintenance_filters_by_truck() {
    let state = test_helpers::test_app_state();
    let truck_id = seed_truck(&state).await;
    let _ = create_maintenance(State(state.clone()), Json(body(truck_id)))
        .await
        .expect("create");

    let params = MaintenanceListParams { truck_id: Some(truck_id), limit: Some(5) };
    let Json(listed) = list_maintenance(State(state.clone()), Query(params)).await.expect("list");
    assert_eq!(listed.len(), 1);

    let params = MaintenanceListParams { truck_id: Some(Uuid::new_v4()), limit: None };
    let Json(none) = list_maintenance(State(state), Query(params)).await.expect("list");
    assert!(none.is_empty());
}

#[tokio::test]
async fn update_and_delete_maintenance() {
    let state = test_helpers::test_app_state();
    let truck_id = seed_truck(&state).await;
    let (_, Json(record)) = create_maintenance(State(state.clone()), Json(body(truck_id)))
        .await
        .expect("create");

    let done = MaintenanceInput { status: Some("COMPLETED".into()), ..body(truck_id) };
    let Json(updated) = update_maintenance(State(state.clone()), Path(record.id), Json(done))
        .await
        .expect("update");
    assert_eq!(updated.status.as_str(), "COMPLETED");

    let Json(deleted) = delete_maintenance(State(state.clone()), Path(record.id)).await.expect("delete");
    assert_eq!(deleted.id, record.id);
    let err = get_maintenance(State(state), Path(record.id)).await.expect_err("deleted");
    assert_eq!(err.status, StatusCode::NOT_FOUND);
}
