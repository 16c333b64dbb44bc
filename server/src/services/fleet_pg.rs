//! Postgres-backed fleet store.
//!
//! ERROR HANDLING
//! ==============
//! Unique-index violations are translated into `DuplicateVin` /
//! `DuplicatePlate` using the index names from the migration; every other
//! SQL failure surfaces as `FleetError::Database`.

use async_trait::async_trait;
use events::now_ms;
use sqlx::PgPool;
use uuid::Uuid;

use super::fleet::{
    COST_WINDOW_MS, DashboardStats, FleetError, FleetStore, MaintenanceQuery, MaintenanceRecord, MaintenanceStatus,
    NewMaintenance, NewTruck, RECENT_LIMIT, TrashListing, Truck, TruckQuery, TruckStatus, UPCOMING_WINDOW_MS,
};

const TRUCK_COLUMNS: &str = "id, vin, make, model, year, license_plate, current_mileage, status, \
                             created_at, updated_at, is_deleted, deleted_at";

const MAINTENANCE_COLUMNS: &str = "id, truck_id, service_type, description, date_performed, mileage, \
                                   parts_cost, labor_cost, total_cost, status, next_service_due, \
                                   created_at, updated_at, is_deleted, deleted_at";

const VIN_INDEX: &str = "trucks_vin_key";
const PLATE_INDEX: &str = "trucks_live_plate_key";

// =============================================================================
// ROWS
// =============================================================================

#[derive(sqlx::FromRow)]
struct TruckRow {
    id: Uuid,
    vin: String,
    make: String,
    model: String,
    year: i32,
    license_plate: String,
    current_mileage: i64,
    status: String,
    created_at: i64,
    updated_at: i64,
    is_deleted: bool,
    deleted_at: Option<i64>,
}

impl TryFrom<TruckRow> for Truck {
    type Error = FleetError;

    fn try_from(row: TruckRow) -> Result<Self, Self::Error> {
        let status = TruckStatus::parse(&row.status)
            .ok_or_else(|| FleetError::Invalid(format!("stored truck status is invalid: {}", row.status)))?;
        Ok(Self {
            id: row.id,
            vin: row.vin,
            make: row.make,
            model: row.model,
            year: row.year,
            license_plate: row.license_plate,
            current_mileage: row.current_mileage,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
            is_deleted: row.is_deleted,
            deleted_at: row.deleted_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct MaintenanceRow {
    id: Uuid,
    truck_id: Uuid,
    service_type: String,
    description: Option<String>,
    date_performed: i64,
    mileage: Option<i64>,
    parts_cost: f64,
    labor_cost: f64,
    total_cost: f64,
    status: String,
    next_service_due: Option<i64>,
    created_at: i64,
    updated_at: i64,
    is_deleted: bool,
    deleted_at: Option<i64>,
}

impl TryFrom<MaintenanceRow> for MaintenanceRecord {
    type Error = FleetError;

    fn try_from(row: MaintenanceRow) -> Result<Self, Self::Error> {
        let status = MaintenanceStatus::parse(&row.status)
            .ok_or_else(|| FleetError::Invalid(format!("stored maintenance status is invalid: {}", row.status)))?;
        Ok(Self {
            id: row.id,
            truck_id: row.truck_id,
            service_type: row.service_type,
            description: row.description,
            date_performed: row.date_performed,
            mileage: row.mileage,
            parts_cost: row.parts_cost,
            labor_cost: row.labor_cost,
            total_cost: row.total_cost,
            status,
            next_service_due: row.next_service_due,
            created_at: row.created_at,
            updated_at: row.updated_at,
            is_deleted: row.is_deleted,
            deleted_at: row.deleted_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CountsRow {
    total_trucks: i64,
    active_trucks: i64,
    upcoming_maintenance: i64,
    overdue_repairs: i64,
    total_maintenance_cost: f64,
}

fn trucks_from(rows: Vec<TruckRow>) -> Result<Vec<Truck>, FleetError> {
    rows.into_iter().map(Truck::try_from).collect()
}

fn maintenance_from(rows: Vec<MaintenanceRow>) -> Result<Vec<MaintenanceRecord>, FleetError> {
    rows.into_iter().map(MaintenanceRecord::try_from).collect()
}

fn map_truck_write_error(err: sqlx::Error, truck: &NewTruck) -> FleetError {
    if let sqlx::Error::Database(db) = &err {
        match db.constraint() {
            Some(VIN_INDEX) => return FleetError::DuplicateVin(truck.vin.clone()),
            Some(PLATE_INDEX) => return FleetError::DuplicatePlate(truck.license_plate.clone()),
            _ => {}
        }
    }
    FleetError::Database(err)
}

fn limit_param(limit: Option<usize>) -> Option<i64> {
    limit.map(|n| i64::try_from(n).unwrap_or(i64::MAX))
}

// =============================================================================
// STORE
// =============================================================================

pub struct PgFleetStore {
    pool: PgPool,
}

impl PgFleetStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn require_live_truck(&self, truck_id: Uuid) -> Result<(), FleetError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM trucks WHERE id = $1 AND NOT is_deleted)")
                .bind(truck_id)
                .fetch_one(&self.pool)
                .await?;
        if exists {
            Ok(())
        } else {
            Err(FleetError::Invalid(format!("truck {truck_id} does not exist")))
        }
    }
}

#[async_trait]
impl FleetStore for PgFleetStore {
    async fn list_trucks(&self, query: &TruckQuery) -> Result<Vec<Truck>, FleetError> {
        let pattern = query
            .search
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{s}%"));
        let sql = format!(
            "SELECT {TRUCK_COLUMNS} FROM trucks
             WHERE NOT is_deleted
               AND ($1::TEXT IS NULL OR status = $1)
               AND ($2::TEXT IS NULL OR vin ILIKE $2 OR make ILIKE $2 OR model ILIKE $2 OR license_plate ILIKE $2)
             ORDER BY created_at DESC
             LIMIT $3"
        );
        let rows = sqlx::query_as::<_, TruckRow>(&sql)
            .bind(query.status.map(TruckStatus::as_str))
            .bind(pattern)
            .bind(limit_param(query.limit))
            .fetch_all(&self.pool)
            .await?;
        trucks_from(rows)
    }

    async fn get_truck(&self, id: Uuid) -> Result<Truck, FleetError> {
        let sql = format!("SELECT {TRUCK_COLUMNS} FROM trucks WHERE id = $1 AND NOT is_deleted");
        let row = sqlx::query_as::<_, TruckRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(FleetError::TruckNotFound(id))?;
        row.try_into()
    }

    async fn create_truck(&self, truck: NewTruck) -> Result<Truck, FleetError> {
        let now = now_ms();
        let sql = format!(
            "INSERT INTO trucks (id, vin, make, model, year, license_plate, current_mileage, status, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
             RETURNING {TRUCK_COLUMNS}"
        );
        let row = sqlx::query_as::<_, TruckRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(&truck.vin)
            .bind(&truck.make)
            .bind(&truck.model)
            .bind(truck.year)
            .bind(&truck.license_plate)
            .bind(truck.current_mileage)
            .bind(truck.status.as_str())
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_truck_write_error(e, &truck))?;
        row.try_into()
    }

    async fn update_truck(&self, id: Uuid, truck: NewTruck) -> Result<Truck, FleetError> {
        let sql = format!(
            "UPDATE trucks
             SET vin = $2, make = $3, model = $4, year = $5, license_plate = $6,
                 current_mileage = $7, status = $8, updated_at = $9
             WHERE id = $1 AND NOT is_deleted
             RETURNING {TRUCK_COLUMNS}"
        );
        let row = sqlx::query_as::<_, TruckRow>(&sql)
            .bind(id)
            .bind(&truck.vin)
            .bind(&truck.make)
            .bind(&truck.model)
            .bind(truck.year)
            .bind(&truck.license_plate)
            .bind(truck.current_mileage)
            .bind(truck.status.as_str())
            .bind(now_ms())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_truck_write_error(e, &truck))?
            .ok_or(FleetError::TruckNotFound(id))?;
        row.try_into()
    }

    async fn delete_truck(&self, id: Uuid) -> Result<Truck, FleetError> {
        let now = now_ms();
        let mut tx = self.pool.begin().await?;
        let sql = format!(
            "UPDATE trucks SET is_deleted = TRUE, deleted_at = $2, updated_at = $2
             WHERE id = $1 AND NOT is_deleted
             RETURNING {TRUCK_COLUMNS}"
        );
        let row = sqlx::query_as::<_, TruckRow>(&sql)
            .bind(id)
            .bind(now)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(FleetError::TruckNotFound(id))?;
        sqlx::query(
            "UPDATE maintenance_records SET is_deleted = TRUE, deleted_at = $2, updated_at = $2
             WHERE truck_id = $1 AND NOT is_deleted",
        )
        .bind(id)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        row.try_into()
    }

    async fn restore_truck(&self, id: Uuid) -> Result<Truck, FleetError> {
        let sql = format!(
            "UPDATE trucks SET is_deleted = FALSE, deleted_at = NULL, updated_at = $2
             WHERE id = $1 AND is_deleted
             RETURNING {TRUCK_COLUMNS}"
        );
        let result = sqlx::query_as::<_, TruckRow>(&sql)
            .bind(id)
            .bind(now_ms())
            .fetch_optional(&self.pool)
            .await;
        let row = match result {
            Ok(row) => row.ok_or(FleetError::TruckNotFound(id))?,
            Err(sqlx::Error::Database(db)) if db.constraint() == Some(PLATE_INDEX) => {
                let plate: String = sqlx::query_scalar("SELECT license_plate FROM trucks WHERE id = $1")
                    .bind(id)
                    .fetch_one(&self.pool)
                    .await?;
                return Err(FleetError::DuplicatePlate(plate));
            }
            Err(err) => return Err(err.into()),
        };
        row.try_into()
    }

    async fn list_maintenance(&self, query: &MaintenanceQuery) -> Result<Vec<MaintenanceRecord>, FleetError> {
        let sql = format!(
            "SELECT {MAINTENANCE_COLUMNS} FROM maintenance_records
             WHERE NOT is_deleted AND ($1::UUID IS NULL OR truck_id = $1)
             ORDER BY created_at DESC
             LIMIT $2"
        );
        let rows = sqlx::query_as::<_, MaintenanceRow>(&sql)
            .bind(query.truck_id)
            .bind(limit_param(query.limit))
            .fetch_all(&self.pool)
            .await?;
        maintenance_from(rows)
    }

    async fn get_maintenance(&self, id: Uuid) -> Result<MaintenanceRecord, FleetError> {
        let sql = format!("SELECT {MAINTENANCE_COLUMNS} FROM maintenance_records WHERE id = $1 AND NOT is_deleted");
        let row = sqlx::query_as::<_, MaintenanceRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(FleetError::MaintenanceNotFound(id))?;
        row.try_into()
    }

    async fn create_maintenance(&self, record: NewMaintenance) -> Result<MaintenanceRecord, FleetError> {
        self.require_live_truck(record.truck_id).await?;
        let sql = format!(
            "INSERT INTO maintenance_records
                 (id, truck_id, service_type, description, date_performed, mileage, parts_cost, labor_cost,
                  total_cost, status, next_service_due, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $12)
             RETURNING {MAINTENANCE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, MaintenanceRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(record.truck_id)
            .bind(&record.service_type)
            .bind(&record.description)
            .bind(record.date_performed)
            .bind(record.mileage)
            .bind(record.parts_cost)
            .bind(record.labor_cost)
            .bind(record.total_cost())
            .bind(record.status.as_str())
            .bind(record.next_service_due)
            .bind(now_ms())
            .fetch_one(&self.pool)
            .await?;
        row.try_into()
    }

    async fn update_maintenance(&self, id: Uuid, record: NewMaintenance) -> Result<MaintenanceRecord, FleetError> {
        self.require_live_truck(record.truck_id).await?;
        let sql = format!(
            "UPDATE maintenance_records
             SET truck_id = $2, service_type = $3, description = $4, date_performed = $5, mileage = $6,
                 parts_cost = $7, labor_cost = $8, total_cost = $9, status = $10, next_service_due = $11,
                 updated_at = $12
             WHERE id = $1 AND NOT is_deleted
             RETURNING {MAINTENANCE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, MaintenanceRow>(&sql)
            .bind(id)
            .bind(record.truck_id)
            .bind(&record.service_type)
            .bind(&record.description)
            .bind(record.date_performed)
            .bind(record.mileage)
            .bind(record.parts_cost)
            .bind(record.labor_cost)
            .bind(record.total_cost())
            .bind(record.status.as_str())
            .bind(record.next_service_due)
            .bind(now_ms())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(FleetError::MaintenanceNotFound(id))?;
        row.try_into()
    }

    async fn delete_maintenance(&self, id: Uuid) -> Result<MaintenanceRecord, FleetError> {
        let sql = format!(
            "UPDATE maintenance_records SET is_deleted = TRUE, deleted_at = $2, updated_at = $2
             WHERE id = $1 AND NOT is_deleted
             RETURNING {MAINTENANCE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, MaintenanceRow>(&sql)
            .bind(id)
            .bind(now_ms())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(FleetError::MaintenanceNotFound(id))?;
        row.try_into()
    }

    async fn restore_maintenance(&self, id: Uuid) -> Result<MaintenanceRecord, FleetError> {
        let sql = format!(
            "UPDATE maintenance_records SET is_deleted = FALSE, deleted_at = NULL, updated_at = $2
             WHERE id = $1 AND is_deleted
             RETURNING {MAINTENANCE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, MaintenanceRow>(&sql)
            .bind(id)
            .bind(now_ms())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(FleetError::MaintenanceNotFound(id))?;
        row.try_into()
    }

    async fn list_trash(&self) -> Result<TrashListing, FleetError> {
        let trucks_sql = format!("SELECT {TRUCK_COLUMNS} FROM trucks WHERE is_deleted ORDER BY deleted_at DESC");
        let maintenance_sql = format!(
            "SELECT {MAINTENANCE_COLUMNS} FROM maintenance_records WHERE is_deleted ORDER BY deleted_at DESC"
        );
        let trucks = sqlx::query_as::<_, TruckRow>(&trucks_sql).fetch_all(&self.pool).await?;
        let maintenance = sqlx::query_as::<_, MaintenanceRow>(&maintenance_sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(TrashListing { trucks: trucks_from(trucks)?, maintenance: maintenance_from(maintenance)? })
    }

    async fn dashboard_stats(&self, now_ms: i64) -> Result<DashboardStats, FleetError> {
        let counts = sqlx::query_as::<_, CountsRow>(
            "SELECT
                (SELECT COUNT(*) FROM trucks WHERE NOT is_deleted) AS total_trucks,
                (SELECT COUNT(*) FROM trucks WHERE NOT is_deleted AND status = 'ACTIVE') AS active_trucks,
                (SELECT COUNT(*) FROM maintenance_records
                  WHERE NOT is_deleted
                    AND (status = 'IN_PROGRESS'
                         OR (status = 'SCHEDULED' AND next_service_due BETWEEN $1 AND $2))) AS upcoming_maintenance,
                (SELECT COUNT(*) FROM maintenance_records
                  WHERE NOT is_deleted AND status = 'SCHEDULED' AND next_service_due < $1) AS overdue_repairs,
                (SELECT COALESCE(SUM(total_cost), 0)::DOUBLE PRECISION FROM maintenance_records
                  WHERE NOT is_deleted AND date_performed >= $3) AS total_maintenance_cost",
        )
        .bind(now_ms)
        .bind(now_ms + UPCOMING_WINDOW_MS)
        .bind(now_ms - COST_WINDOW_MS)
        .fetch_one(&self.pool)
        .await?;

        let recent_trucks = self
            .list_trucks(&TruckQuery { limit: Some(RECENT_LIMIT), ..TruckQuery::default() })
            .await?;
        let recent_maintenance = self
            .list_maintenance(&MaintenanceQuery { limit: Some(RECENT_LIMIT), ..MaintenanceQuery::default() })
            .await?;

        Ok(DashboardStats {
            total_trucks: counts.total_trucks,
            active_trucks: counts.active_trucks,
            upcoming_maintenance: counts.upcoming_maintenance,
            overdue_repairs: counts.overdue_repairs,
            total_maintenance_cost: counts.total_maintenance_cost,
            recent_trucks,
            recent_maintenance,
        })
    }

    async fn ping(&self) -> Result<(), FleetError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(all(test, feature = "live-db-tests"))]
#[path = "fleet_pg_test.rs"]
mod tests;
