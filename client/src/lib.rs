//! Fleet dashboard client.
//!
//! Keeps one session's view of the dashboard as fresh as the network allows:
//! a live WebSocket link to the server hub when one can be negotiated, REST
//! polling when it cannot, and a local cache when the device is offline. The
//! `manager` module owns that state machine; `dashboard` turns its event
//! stream into a renderable view.
//!
//! Collaborators (live transport, REST fetcher, cache store, network status)
//! are trait objects or channels so the state machine can be driven
//! deterministically in tests.

pub mod cache;
pub mod config;
pub mod dashboard;
pub mod endpoints;
pub mod error;
pub mod fetch;
pub mod manager;
pub mod network;
pub mod state;
pub mod transport;

pub use config::ManagerConfig;
pub use dashboard::{DashboardView, StatusIndicator};
pub use error::ClientError;
pub use manager::{Collaborators, ManagerHandle};
pub use state::{ConnectionState, Phase, Transport};
