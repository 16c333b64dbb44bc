//! Fleet records, validation, and the data-store seam.
//!
//! DESIGN
//! ======
//! Route handlers only talk to `dyn FleetStore`. The Postgres store is used in
//! production; the in-memory store backs tests and database-less runs. Both
//! implement the same soft-delete contract: deleting sets `is_deleted` and
//! `deleted_at`, listing and lookups skip deleted rows, and restore clears the
//! flags again. Deleting a truck also soft-deletes its maintenance records.
//!
//! Timestamps are milliseconds since the Unix epoch.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Number of rows in the dashboard "recent" lists.
pub const RECENT_LIMIT: usize = 5;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;
/// Scheduled work due within this horizon counts as upcoming.
pub const UPCOMING_WINDOW_MS: i64 = 30 * DAY_MS;
/// Cost totals cover records performed within this horizon.
pub const COST_WINDOW_MS: i64 = 180 * DAY_MS;

const MIN_TRUCK_YEAR: i32 = 1900;

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum FleetError {
    #[error("truck not found: {0}")]
    TruckNotFound(Uuid),
    #[error("maintenance record not found: {0}")]
    MaintenanceNotFound(Uuid),
    #[error("{0}")]
    Invalid(String),
    #[error("truck with VIN {0} already exists")]
    DuplicateVin(String),
    #[error("truck with license plate {0} already exists")]
    DuplicatePlate(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl FleetError {
    /// Grepable code returned alongside the message.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::TruckNotFound(_) => "E_TRUCK_NOT_FOUND",
            Self::MaintenanceNotFound(_) => "E_MAINTENANCE_NOT_FOUND",
            Self::Invalid(_) => "E_INVALID",
            Self::DuplicateVin(_) => "E_DUPLICATE_VIN",
            Self::DuplicatePlate(_) => "E_DUPLICATE_PLATE",
            Self::Database(_) => "E_DATABASE",
        }
    }
}

// =============================================================================
// STATUS ENUMS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TruckStatus {
    Active,
    Inactive,
    Maintenance,
}

impl TruckStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Inactive => "INACTIVE",
            Self::Maintenance => "MAINTENANCE",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_uppercase().as_str() {
            "ACTIVE" => Some(Self::Active),
            "INACTIVE" => Some(Self::Inactive),
            "MAINTENANCE" => Some(Self::Maintenance),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MaintenanceStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl MaintenanceStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "SCHEDULED",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_uppercase().as_str() {
            "SCHEDULED" => Some(Self::Scheduled),
            "IN_PROGRESS" => Some(Self::InProgress),
            "COMPLETED" => Some(Self::Completed),
            "CANCELLED" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

// =============================================================================
// RECORDS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Truck {
    pub id: Uuid,
    pub vin: String,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub license_plate: String,
    pub current_mileage: i64,
    pub status: TruckStatus,
    pub created_at: i64,
    pub updated_at: i64,
    pub is_deleted: bool,
    pub deleted_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceRecord {
    pub id: Uuid,
    pub truck_id: Uuid,
    pub service_type: String,
    pub description: Option<String>,
    pub date_performed: i64,
    pub mileage: Option<i64>,
    pub parts_cost: f64,
    pub labor_cost: f64,
    pub total_cost: f64,
    pub status: MaintenanceStatus,
    pub next_service_due: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
    pub is_deleted: bool,
    pub deleted_at: Option<i64>,
}

impl MaintenanceRecord {
    /// Scheduled and due within the upcoming window, or already in progress.
    #[must_use]
    pub fn is_upcoming(&self, now_ms: i64) -> bool {
        match self.status {
            MaintenanceStatus::InProgress => true,
            MaintenanceStatus::Scheduled => self
                .next_service_due
                .is_some_and(|due| due >= now_ms && due <= now_ms + UPCOMING_WINDOW_MS),
            MaintenanceStatus::Completed | MaintenanceStatus::Cancelled => false,
        }
    }

    /// Scheduled and past due.
    #[must_use]
    pub fn is_overdue(&self, now_ms: i64) -> bool {
        self.status == MaintenanceStatus::Scheduled && self.next_service_due.is_some_and(|due| due < now_ms)
    }
}

/// Aggregate served by `/api/dashboard/stats` and pushed as `dashboard-update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_trucks: i64,
    pub active_trucks: i64,
    pub upcoming_maintenance: i64,
    pub overdue_repairs: i64,
    pub total_maintenance_cost: f64,
    pub recent_trucks: Vec<Truck>,
    pub recent_maintenance: Vec<MaintenanceRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrashListing {
    pub trucks: Vec<Truck>,
    pub maintenance: Vec<MaintenanceRecord>,
}

// =============================================================================
// INPUTS
// =============================================================================

/// Raw truck body. Fields are optional so missing ones produce a validation
/// error rather than a deserialization rejection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TruckInput {
    pub vin: Option<String>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
    pub license_plate: Option<String>,
    pub current_mileage: Option<i64>,
    pub status: Option<String>,
}

/// Truck fields after validation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTruck {
    pub vin: String,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub license_plate: String,
    pub current_mileage: i64,
    pub status: TruckStatus,
}

impl TruckInput {
    /// Validate a create/update body.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::Invalid`] when a field is missing or out of range.
    pub fn validate(self, current_year: i32) -> Result<NewTruck, FleetError> {
        let (Some(vin), Some(make), Some(model), Some(year), Some(license_plate), Some(current_mileage), Some(status)) = (
            non_blank(self.vin),
            non_blank(self.make),
            non_blank(self.model),
            self.year,
            non_blank(self.license_plate),
            self.current_mileage,
            self.status,
        ) else {
            return Err(FleetError::Invalid("all fields are required".into()));
        };

        let max_year = current_year + 1;
        if !(MIN_TRUCK_YEAR..=max_year).contains(&year) {
            return Err(FleetError::Invalid(format!("year must be between {MIN_TRUCK_YEAR} and {max_year}")));
        }
        if current_mileage < 0 {
            return Err(FleetError::Invalid("mileage cannot be negative".into()));
        }
        let Some(status) = TruckStatus::parse(&status) else {
            return Err(FleetError::Invalid(format!("unknown truck status: {status}")));
        };

        Ok(NewTruck { vin, make, model, year, license_plate, current_mileage, status })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MaintenanceInput {
    pub truck_id: Option<Uuid>,
    pub service_type: Option<String>,
    pub description: Option<String>,
    pub date_performed: Option<i64>,
    pub mileage: Option<i64>,
    pub parts_cost: Option<f64>,
    pub labor_cost: Option<f64>,
    pub status: Option<String>,
    pub next_service_due: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewMaintenance {
    pub truck_id: Uuid,
    pub service_type: String,
    pub description: Option<String>,
    pub date_performed: i64,
    pub mileage: Option<i64>,
    pub parts_cost: f64,
    pub labor_cost: f64,
    pub status: MaintenanceStatus,
    pub next_service_due: Option<i64>,
}

impl NewMaintenance {
    #[must_use]
    pub fn total_cost(&self) -> f64 {
        self.parts_cost + self.labor_cost
    }
}

impl MaintenanceInput {
    /// Validate a create/update body. Truck existence is checked by the store.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::Invalid`] when a field is missing or out of range.
    pub fn validate(self) -> Result<NewMaintenance, FleetError> {
        let (Some(truck_id), Some(service_type), Some(date_performed)) =
            (self.truck_id, non_blank(self.service_type), self.date_performed)
        else {
            return Err(FleetError::Invalid("truck_id, service_type and date_performed are required".into()));
        };

        let parts_cost = self.parts_cost.unwrap_or(0.0);
        let labor_cost = self.labor_cost.unwrap_or(0.0);
        if !parts_cost.is_finite() || !labor_cost.is_finite() || parts_cost < 0.0 || labor_cost < 0.0 {
            return Err(FleetError::Invalid("costs must be non-negative numbers".into()));
        }
        if self.mileage.is_some_and(|m| m < 0) {
            return Err(FleetError::Invalid("mileage cannot be negative".into()));
        }
        let status = match self.status.as_deref() {
            None => MaintenanceStatus::Completed,
            Some(raw) => MaintenanceStatus::parse(raw)
                .ok_or_else(|| FleetError::Invalid(format!("unknown maintenance status: {raw}")))?,
        };

        Ok(NewMaintenance {
            truck_id,
            service_type,
            description: non_blank(self.description),
            date_performed,
            mileage: self.mileage,
            parts_cost,
            labor_cost,
            status,
            next_service_due: self.next_service_due,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_owned()).filter(|s| !s.is_empty())
}

// =============================================================================
// QUERIES
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct TruckQuery {
    /// Case-insensitive match over VIN, make, model and license plate.
    pub search: Option<String>,
    pub status: Option<TruckStatus>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct MaintenanceQuery {
    pub truck_id: Option<Uuid>,
    pub limit: Option<usize>,
}

// =============================================================================
// STORE
// =============================================================================

/// Data-store seam for fleet records. Lists are newest first and exclude
/// soft-deleted rows.
#[async_trait]
pub trait FleetStore: Send + Sync {
    async fn list_trucks(&self, query: &TruckQuery) -> Result<Vec<Truck>, FleetError>;
    async fn get_truck(&self, id: Uuid) -> Result<Truck, FleetError>;
    async fn create_truck(&self, truck: NewTruck) -> Result<Truck, FleetError>;
    async fn update_truck(&self, id: Uuid, truck: NewTruck) -> Result<Truck, FleetError>;
    /// Soft-delete the truck and its maintenance records; returns the deleted truck.
    async fn delete_truck(&self, id: Uuid) -> Result<Truck, FleetError>;
    async fn restore_truck(&self, id: Uuid) -> Result<Truck, FleetError>;

    async fn list_maintenance(&self, query: &MaintenanceQuery) -> Result<Vec<MaintenanceRecord>, FleetError>;
    async fn get_maintenance(&self, id: Uuid) -> Result<MaintenanceRecord, FleetError>;
    async fn create_maintenance(&self, record: NewMaintenance) -> Result<MaintenanceRecord, FleetError>;
    async fn update_maintenance(&self, id: Uuid, record: NewMaintenance) -> Result<MaintenanceRecord, FleetError>;
    async fn delete_maintenance(&self, id: Uuid) -> Result<MaintenanceRecord, FleetError>;
    async fn restore_maintenance(&self, id: Uuid) -> Result<MaintenanceRecord, FleetError>;

    async fn list_trash(&self) -> Result<TrashListing, FleetError>;
    async fn dashboard_stats(&self, now_ms: i64) -> Result<DashboardStats, FleetError>;
    /// Cheap reachability check for health probes.
    async fn ping(&self) -> Result<(), FleetError>;
}

/// Calendar year used for truck year validation.
#[must_use]
pub fn current_year() -> i32 {
    time::OffsetDateTime::now_utc().year()
}

#[cfg(test)]
#[path = "fleet_test.rs"]
mod tests;
