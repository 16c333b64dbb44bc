//! Domain services used by the REST and live-channel routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own fleet persistence and event emission so route handlers
//! can stay focused on protocol translation.

pub mod fleet;
pub mod fleet_memory;
pub mod fleet_pg;
pub mod notify;
