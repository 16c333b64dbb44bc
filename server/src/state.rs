//! Shared application state.
//!
//! `AppState` is cloned into every handler. It carries the fleet store and
//! the hub handle; the same handle is given to the live-channel listener so
//! emitters and sockets always see one hub.

use std::sync::Arc;

use crate::hub::HubHandle;
use crate::services::fleet::FleetStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn FleetStore>,
    pub hub: HubHandle,
}

impl AppState {
    #[must_use]
    pub fn new(store: Arc<dyn FleetStore>, hub: HubHandle) -> Self {
        Self { store, hub }
    }
}
