use super::*;
use crate::services::fleet::{MaintenanceStatus, UPCOMING_WINDOW_MS};

fn new_truck(vin: &str, plate: &str) -> NewTruck {
    NewTruck {
        vin: vin.into(),
        make: "Volvo".into(),
        model: "VNL".into(),
        year: 2022,
        license_plate: plate.into(),
        current_mileage: 50_000,
        status: TruckStatus::Active,
    }
}

fn new_maintenance(truck_id: Uuid, status: MaintenanceStatus, next_service_due: Option<i64>) -> NewMaintenance {
    NewMaintenance {
        truck_id,
        service_type: "inspection".into(),
        description: None,
        date_performed: now_ms(),
        mileage: Some(50_100),
        parts_cost: 40.0,
        labor_cost: 60.0,
        status,
        next_service_due,
    }
}

#[tokio::test]
async fn list_trucks_is_newest_first_and_honors_limit() {
    let store = MemoryFleetStore::new();
    store.create_truck(new_truck("VIN1", "P1")).await.expect("create");
    store.create_truck(new_truck("VIN2", "P2")).await.expect("create");
    store.create_truck(new_truck("VIN3", "P3")).await.expect("create");

    let listed = store
        .list_trucks(&TruckQuery { limit: Some(2), ..TruckQuery::default() })
        .await
        .expect("list");
    let vins: Vec<&str> = listed.iter().map(|t| t.vin.as_str()).collect();
    assert_eq!(vins, ["VIN3", "VIN2"]);
}

#[tokio::test]
async fn search_matches_any_identifying_field() {
    let store = MemoryFleetStore::new();
    store.create_truck(new_truck("AAA111", "ZED-1")).await.expect("create");
    store.create_truck(new_truck("BBB222", "YAK-2")).await.expect("create");

    let hits = store
        .list_trucks(&TruckQuery { search: Some("yak".into()), ..TruckQuery::default() })
        .await
        .expect("list");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].vin, "BBB222");
}

#[tokio::test]
async fn duplicate_vin_and_plate_are_rejected() {
    let store = MemoryFleetStore::new();
    store.create_truck(new_truck("VIN1", "P1")).await.expect("create");

    let err = store.create_truck(new_truck("vin1", "P9")).await.expect_err("dup vin");
    assert!(matches!(err, FleetError::DuplicateVin(_)));
    let err = store.create_truck(new_truck("VIN9", "p1")).await.expect_err("dup plate");
    assert!(matches!(err, FleetError::DuplicatePlate(_)));
}

#[tokio::test]
async fn deleted_truck_frees_plate_but_not_vin() {
    let store = MemoryFleetStore::new();
    let truck = store.create_truck(new_truck("VIN1", "P1")).await.expect("create");
    store.delete_truck(truck.id).await.expect("delete");

    assert!(store.create_truck(new_truck("VIN2", "P1")).await.is_ok());
    assert!(matches!(
        store.create_truck(new_truck("VIN1", "P3")).await,
        Err(FleetError::DuplicateVin(_))
    ));
}

#[tokio::test]
async fn delete_truck_cascades_to_maintenance_and_lands_in_trash() {
    let store = MemoryFleetStore::new();
    let truck = store.create_truck(new_truck("VIN1", "P1")).await.expect("create");
    let record = store
        .create_maintenance(new_maintenance(truck.id, MaintenanceStatus::Completed, None))
        .await
        .expect("create maintenance");

    let deleted = store.delete_truck(truck.id).await.expect("delete");
    assert!(deleted.is_deleted);
    assert!(deleted.deleted_at.is_some());

    assert!(matches!(store.get_truck(truck.id).await, Err(FleetError::TruckNotFound(_))));
    assert!(matches!(
        store.get_maintenance(record.id).await,
        Err(FleetError::MaintenanceNotFound(_))
    ));

    let trash = store.list_trash().await.expect("trash");
    assert_eq!(trash.trucks.len(), 1);
    assert_eq!(trash.maintenance.len(), 1);
}

#[tokio::test]
async fn restore_brings_truck_back() {
    let store = MemoryFleetStore::new();
    let truck = store.create_truck(new_truck("VIN1", "P1")).await.expect("create");
    store.delete_truck(truck.id).await.expect("delete");

    let restored = store.restore_truck(truck.id).await.expect("restore");
    assert!(!restored.is_deleted);
    assert!(restored.deleted_at.is_none());
    assert!(store.get_truck(truck.id).await.is_ok());
    assert!(matches!(store.restore_truck(truck.id).await, Err(FleetError::TruckNotFound(_))));
}

#[tokio::test]
async fn restore_rejects_plate_taken_while_deleted() {
    let store = MemoryFleetStore::new();
    let truck = store.create_truck(new_truck("VIN1", "P1")).await.expect("create");
    store.delete_truck(truck.id).await.expect("delete");
    store.create_truck(new_truck("VIN2", "P1")).await.expect("create");

    assert!(matches!(store.restore_truck(truck.id).await, Err(FleetError::DuplicatePlate(_))));
}

#[tokio::test]
async fn maintenance_requires_live_truck() {
    let store = MemoryFleetStore::new();
    let err = store
        .create_maintenance(new_maintenance(Uuid::new_v4(), MaintenanceStatus::Completed, None))
        .await
        .expect_err("missing truck");
    assert!(matches!(err, FleetError::Invalid(_)));
}

#[tokio::test]
async fn maintenance_total_cost_is_parts_plus_labor() {
    let store = MemoryFleetStore::new();
    let truck = store.create_truck(new_truck("VIN1", "P1")).await.expect("create");
    let record = store
        .create_maintenance(new_maintenance(truck.id, MaintenanceStatus::Completed, None))
        .await
        .expect("create");
    assert!((record.total_cost - 100.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn stats_count_live_rows_and_classify_maintenance() {
    let store = MemoryFleetStore::new();
    let now = now_ms();
    let active = store.create_truck(new_truck("VIN1", "P1")).await.expect("create");
    store
        .create_truck(NewTruck { status: TruckStatus::Inactive, ..new_truck("VIN2", "P2") })
        .await
        .expect("create");
    let gone = store.create_truck(new_truck("VIN3", "P3")).await.expect("create");
    store.delete_truck(gone.id).await.expect("delete");

    store
        .create_maintenance(new_maintenance(active.id, MaintenanceStatus::Scheduled, Some(now + 60_000)))
        .await
        .expect("upcoming");
    store
        .create_maintenance(new_maintenance(active.id, MaintenanceStatus::InProgress, None))
        .await
        .expect("in progress");
    store
        .create_maintenance(new_maintenance(active.id, MaintenanceStatus::Scheduled, Some(now - 60_000)))
        .await
        .expect("overdue");
    store
        .create_maintenance(new_maintenance(
            active.id,
            MaintenanceStatus::Scheduled,
            Some(now + UPCOMING_WINDOW_MS * 2),
        ))
        .await
        .expect("far future");

    let stats = store.dashboard_stats(now).await.expect("stats");
    assert_eq!(stats.total_trucks, 2);
    assert_eq!(stats.active_trucks, 1);
    assert_eq!(stats.upcoming_maintenance, 2);
    assert_eq!(stats.overdue_repairs, 1);
    assert!((stats.total_maintenance_cost - 400.0).abs() < f64::EPSILON);
    assert_eq!(stats.recent_trucks.len(), 2);
    assert_eq!(stats.recent_maintenance.len(), 4);
}

#[tokio::test]
async fn stats_recent_lists_are_capped() {
    let store = MemoryFleetStore::new();
    for i in 0..7 {
        store
            .create_truck(new_truck(&format!("VIN{i}"), &format!("P{i}")))
            .await
            .expect("create");
    }
    let stats = store.dashboard_stats(now_ms()).await.expect("stats");
    assert_eq!(stats.total_trucks, 7);
    assert_eq!(stats.recent_trucks.len(), RECENT_LIMIT);
    assert_eq!(stats.recent_trucks[0].vin, "VIN6");
}
