//! Process-local fleet store.
//!
//! Used when `DATABASE_URL` is unset and by every handler test. Records live
//! in insertion order; lists walk them in reverse so the newest come first,
//! matching the Postgres store's `ORDER BY created_at DESC`.

use async_trait::async_trait;
use events::now_ms;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::fleet::{
    COST_WINDOW_MS, DashboardStats, FleetError, FleetStore, MaintenanceQuery, MaintenanceRecord, NewMaintenance,
    NewTruck, RECENT_LIMIT, TrashListing, Truck, TruckQuery, TruckStatus,
};

#[derive(Default)]
struct Tables {
    trucks: Vec<Truck>,
    maintenance: Vec<MaintenanceRecord>,
}

impl Tables {
    fn truck_mut(&mut self, id: Uuid) -> Result<&mut Truck, FleetError> {
        self.trucks
            .iter_mut()
            .find(|t| t.id == id && !t.is_deleted)
            .ok_or(FleetError::TruckNotFound(id))
    }

    fn maintenance_mut(&mut self, id: Uuid) -> Result<&mut MaintenanceRecord, FleetError> {
        self.maintenance
            .iter_mut()
            .find(|m| m.id == id && !m.is_deleted)
            .ok_or(FleetError::MaintenanceNotFound(id))
    }

    /// VIN is unique across every row; plate only among live rows.
    fn check_unique(&self, truck: &NewTruck, except: Option<Uuid>) -> Result<(), FleetError> {
        let others = self.trucks.iter().filter(|t| Some(t.id) != except);
        for other in others {
            if other.vin.eq_ignore_ascii_case(&truck.vin) {
                return Err(FleetError::DuplicateVin(truck.vin.clone()));
            }
            if !other.is_deleted && other.license_plate.eq_ignore_ascii_case(&truck.license_plate) {
                return Err(FleetError::DuplicatePlate(truck.license_plate.clone()));
            }
        }
        Ok(())
    }

    fn require_live_truck(&self, truck_id: Uuid) -> Result<(), FleetError> {
        if self.trucks.iter().any(|t| t.id == truck_id && !t.is_deleted) {
            Ok(())
        } else {
            Err(FleetError::Invalid(format!("truck {truck_id} does not exist")))
        }
    }
}

#[derive(Default)]
pub struct MemoryFleetStore {
    tables: RwLock<Tables>,
}

impl MemoryFleetStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches_search(truck: &Truck, needle: &str) -> bool {
    [&truck.vin, &truck.make, &truck.model, &truck.license_plate]
        .iter()
        .any(|field| field.to_lowercase().contains(needle))
}

#[async_trait]
impl FleetStore for MemoryFleetStore {
    async fn list_trucks(&self, query: &TruckQuery) -> Result<Vec<Truck>, FleetError> {
        let tables = self.tables.read().await;
        let needle = query.search.as_deref().map(str::to_lowercase).filter(|s| !s.is_empty());
        Ok(tables
            .trucks
            .iter()
            .rev()
            .filter(|t| !t.is_deleted)
            .filter(|t| query.status.is_none_or(|status| t.status == status))
            .filter(|t| needle.as_deref().is_none_or(|n| matches_search(t, n)))
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn get_truck(&self, id: Uuid) -> Result<Truck, FleetError> {
        let tables = self.tables.read().await;
        tables
            .trucks
            .iter()
            .find(|t| t.id == id && !t.is_deleted)
            .cloned()
            .ok_or(FleetError::TruckNotFound(id))
    }

    async fn create_truck(&self, truck: NewTruck) -> Result<Truck, FleetError> {
        let mut tables = self.tables.write().await;
        tables.check_unique(&truck, None)?;
        let now = now_ms();
        let row = Truck {
            id: Uuid::new_v4(),
            vin: truck.vin,
            make: truck.make,
            model: truck.model,
            year: truck.year,
            license_plate: truck.license_plate,
            current_mileage: truck.current_mileage,
            status: truck.status,
            created_at: now,
            updated_at: now,
            is_deleted: false,
            deleted_at: None,
        };
        tables.trucks.push(row.clone());
        Ok(row)
    }

    async fn update_truck(&self, id: Uuid, truck: NewTruck) -> Result<Truck, FleetError> {
        let mut tables = self.tables.write().await;
        tables.truck_mut(id)?;
        tables.check_unique(&truck, Some(id))?;
        let row = tables.truck_mut(id)?;
        row.vin = truck.vin;
        row.make = truck.make;
        row.model = truck.model;
        row.year = truck.year;
        row.license_plate = truck.license_plate;
        row.current_mileage = truck.current_mileage;
        row.status = truck.status;
        row.updated_at = now_ms();
        Ok(row.clone())
    }

    async fn delete_truck(&self, id: Uuid) -> Result<Truck, FleetError> {
        let mut tables = self.tables.write().await;
        let now = now_ms();
        let row = tables.truck_mut(id)?;
        row.is_deleted = true;
        row.deleted_at = Some(now);
        row.updated_at = now;
        let deleted = row.clone();
        for record in tables.maintenance.iter_mut().filter(|m| m.truck_id == id && !m.is_deleted) {
            record.is_deleted = true;
            record.deleted_at = Some(now);
            record.updated_at = now;
        }
        Ok(deleted)
    }

    async fn restore_truck(&self, id: Uuid) -> Result<Truck, FleetError> {
        let mut tables = self.tables.write().await;
        let Some(index) = tables.trucks.iter().position(|t| t.id == id && t.is_deleted) else {
            return Err(FleetError::TruckNotFound(id));
        };
        let plate = tables.trucks[index].license_plate.clone();
        if tables.trucks.iter().any(|t| !t.is_deleted && t.license_plate.eq_ignore_ascii_case(&plate)) {
            return Err(FleetError::DuplicatePlate(plate));
        }
        let row = &mut tables.trucks[index];
        row.is_deleted = false;
        row.deleted_at = None;
        row.updated_at = now_ms();
        Ok(row.clone())
    }

    async fn list_maintenance(&self, query: &MaintenanceQuery) -> Result<Vec<MaintenanceRecord>, FleetError> {
        let tables = self.tables.read().await;
        Ok(tables
            .maintenance
            .iter()
            .rev()
            .filter(|m| !m.is_deleted)
            .filter(|m| query.truck_id.is_none_or(|truck_id| m.truck_id == truck_id))
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn get_maintenance(&self, id: Uuid) -> Result<MaintenanceRecord, FleetError> {
        let tables = self.tables.read().await;
        tables
            .maintenance
            .iter()
            .find(|m| m.id == id && !m.is_deleted)
            .cloned()
            .ok_or(FleetError::MaintenanceNotFound(id))
    }

    async fn create_maintenance(&self, record: NewMaintenance) -> Result<MaintenanceRecord, FleetError> {
        let mut tables = self.tables.write().await;
        tables.require_live_truck(record.truck_id)?;
        let now = now_ms();
        let total_cost = record.total_cost();
        let row = MaintenanceRecord {
            id: Uuid::new_v4(),
            truck_id: record.truck_id,
            service_type: record.service_type,
            description: record.description,
            date_performed: record.date_performed,
            mileage: record.mileage,
            parts_cost: record.parts_cost,
            labor_cost: record.labor_cost,
            total_cost,
            status: record.status,
            next_service_due: record.next_service_due,
            created_at: now,
            updated_at: now,
            is_deleted: false,
            deleted_at: None,
        };
        tables.maintenance.push(row.clone());
        Ok(row)
    }

    async fn update_maintenance(&self, id: Uuid, record: NewMaintenance) -> Result<MaintenanceRecord, FleetError> {
        let mut tables = self.tables.write().await;
        tables.maintenance_mut(id)?;
        tables.require_live_truck(record.truck_id)?;
        let total_cost = record.total_cost();
        let row = tables.maintenance_mut(id)?;
        row.truck_id = record.truck_id;
        row.service_type = record.service_type;
        row.description = record.description;
        row.date_performed = record.date_performed;
        row.mileage = record.mileage;
        row.parts_cost = record.parts_cost;
        row.labor_cost = record.labor_cost;
        row.total_cost = total_cost;
        row.status = record.status;
        row.next_service_due = record.next_service_due;
        row.updated_at = now_ms();
        Ok(row.clone())
    }

    async fn delete_maintenance(&self, id: Uuid) -> Result<MaintenanceRecord, FleetError> {
        let mut tables = self.tables.write().await;
        let now = now_ms();
        let row = tables.maintenance_mut(id)?;
        row.is_deleted = true;
        row.deleted_at = Some(now);
        row.updated_at = now;
        Ok(row.clone())
    }

    async fn restore_maintenance(&self, id: Uuid) -> Result<MaintenanceRecord, FleetError> {
        let mut tables = self.tables.write().await;
        let row = tables
            .maintenance
            .iter_mut()
            .find(|m| m.id == id && m.is_deleted)
            .ok_or(FleetError::MaintenanceNotFound(id))?;
        row.is_deleted = false;
        row.deleted_at = None;
        row.updated_at = now_ms();
        Ok(row.clone())
    }

    async fn list_trash(&self) -> Result<TrashListing, FleetError> {
        let tables = self.tables.read().await;
        let mut trucks: Vec<Truck> = tables.trucks.iter().filter(|t| t.is_deleted).cloned().collect();
        let mut maintenance: Vec<MaintenanceRecord> =
            tables.maintenance.iter().filter(|m| m.is_deleted).cloned().collect();
        trucks.sort_by_key(|t| std::cmp::Reverse(t.deleted_at));
        maintenance.sort_by_key(|m| std::cmp::Reverse(m.deleted_at));
        Ok(TrashListing { trucks, maintenance })
    }

    async fn dashboard_stats(&self, now_ms: i64) -> Result<DashboardStats, FleetError> {
        let tables = self.tables.read().await;
        let trucks: Vec<&Truck> = tables.trucks.iter().filter(|t| !t.is_deleted).collect();
        let maintenance: Vec<&MaintenanceRecord> = tables.maintenance.iter().filter(|m| !m.is_deleted).collect();
        let cost_since = now_ms - COST_WINDOW_MS;

        Ok(DashboardStats {
            total_trucks: count(trucks.len()),
            active_trucks: count(trucks.iter().filter(|t| t.status == TruckStatus::Active).count()),
            upcoming_maintenance: count(maintenance.iter().filter(|m| m.is_upcoming(now_ms)).count()),
            overdue_repairs: count(maintenance.iter().filter(|m| m.is_overdue(now_ms)).count()),
            total_maintenance_cost: maintenance
                .iter()
                .filter(|m| m.date_performed >= cost_since)
                .map(|m| m.total_cost)
                .sum(),
            recent_trucks: trucks.iter().rev().take(RECENT_LIMIT).map(|t| (*t).clone()).collect(),
            recent_maintenance: maintenance.iter().rev().take(RECENT_LIMIT).map(|m| (*m).clone()).collect(),
        })
    }

    async fn ping(&self) -> Result<(), FleetError> {
        Ok(())
    }
}

fn count(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

#[cfg(test)]
#[path = "fleet_memory_test.rs"]
mod tests;
