//! Broadcast hub: live client registry and group fan-out.
//!
//! DESIGN
//! ======
//! One `Hub` per process. Each accepted socket registers a bounded queue of
//! outgoing `PushMessage`s; groups are sets of client IDs. `broadcast`
//! encodes nothing itself: it hands a clone of the push to every member's
//! queue with `try_send`, so a slow or vanished client never stalls the
//! mutation handler that triggered the broadcast.
//!
//! `HubHandle` is the injected slot both the REST handlers and the socket
//! listener read. It starts `Pending`, becomes `Ready` once at startup and
//! `Closed` at shutdown. Readers that find no hub treat it as "nothing to
//! notify", never as an error.
//!
//! DELIVERY
//! ========
//! Best-effort: no acknowledgment, no retry, no replay for clients that were
//! disconnected at broadcast time. Those clients recover through polling.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock as StdRwLock};

use events::{DomainEvent, PushMessage};
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info, warn};
use uuid::Uuid;

// =============================================================================
// HUB
// =============================================================================

#[derive(Default)]
struct HubInner {
    /// Connected clients: `client_id` -> queue of outgoing pushes.
    clients: HashMap<Uuid, mpsc::Sender<PushMessage>>,
    /// Group name -> member client IDs.
    groups: HashMap<String, HashSet<Uuid>>,
}

/// Shared connection registry. Clone is cheap; all clones see the same state.
#[derive(Clone)]
pub struct Hub {
    inner: Arc<RwLock<HubInner>>,
    client_buffer: usize,
}

impl Hub {
    #[must_use]
    pub fn new(client_buffer: usize) -> Self {
        Self { inner: Arc::new(RwLock::new(HubInner::default())), client_buffer: client_buffer.max(1) }
    }

    /// Register a client. Does not join any group. Returns the receiving end
    /// of the client's push queue; it yields `None` once the client is
    /// disconnected or the hub shuts down.
    pub async fn connect(&self, client_id: Uuid) -> mpsc::Receiver<PushMessage> {
        let (tx, rx) = mpsc::channel(self.client_buffer);
        let mut inner = self.inner.write().await;
        inner.clients.insert(client_id, tx);
        info!(%client_id, clients = inner.clients.len(), "hub: client connected");
        rx
    }

    /// Add a connected client to `group`. Idempotent. Returns `true` only when
    /// membership changed.
    pub async fn join(&self, client_id: Uuid, group: &str) -> bool {
        let mut inner = self.inner.write().await;
        if !inner.clients.contains_key(&client_id) {
            warn!(%client_id, group, "hub: join from unknown client ignored");
            return false;
        }
        let added = inner.groups.entry(group.to_owned()).or_default().insert(client_id);
        if added {
            info!(%client_id, group, "hub: client joined group");
        }
        added
    }

    /// Remove a client from `group`. Idempotent. Returns `true` only when
    /// membership changed.
    pub async fn leave(&self, client_id: Uuid, group: &str) -> bool {
        let mut inner = self.inner.write().await;
        let Some(members) = inner.groups.get_mut(group) else {
            return false;
        };
        let removed = members.remove(&client_id);
        if members.is_empty() {
            inner.groups.remove(group);
        }
        if removed {
            info!(%client_id, group, "hub: client left group");
        }
        removed
    }

    /// Drop a client from every group and release its queue. Idempotent.
    pub async fn disconnect(&self, client_id: Uuid) {
        let mut inner = self.inner.write().await;
        let was_connected = inner.clients.remove(&client_id).is_some();
        inner.groups.retain(|_, members| {
            members.remove(&client_id);
            !members.is_empty()
        });
        if was_connected {
            info!(%client_id, clients = inner.clients.len(), "hub: client disconnected");
        }
    }

    /// Deliver `event` to every current member of `group`. Returns the number
    /// of queues that accepted it.
    pub async fn broadcast(&self, group: &str, event: &DomainEvent) -> usize {
        let push = PushMessage::from_event(event);
        let inner = self.inner.read().await;
        let Some(members) = inner.groups.get(group) else {
            debug!(group, event = push.name(), "hub: broadcast to empty group");
            return 0;
        };

        let mut delivered = 0;
        for client_id in members {
            let Some(tx) = inner.clients.get(client_id) else {
                continue;
            };
            match tx.try_send(push.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(%client_id, event = push.name(), "hub: client queue full; push dropped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!(%client_id, event = push.name(), "hub: client queue closed; push dropped");
                }
            }
        }
        debug!(group, event = push.name(), delivered, "hub: broadcast");
        delivered
    }

    #[cfg(test)]
    pub async fn group_size(&self, group: &str) -> usize {
        let inner = self.inner.read().await;
        inner.groups.get(group).map_or(0, HashSet::len)
    }

    #[cfg(test)]
    pub async fn client_count(&self) -> usize {
        self.inner.read().await.clients.len()
    }

    /// Forget every client and group. Dropping the queues ends each
    /// connection loop.
    async fn close(&self) {
        let mut inner = self.inner.write().await;
        let clients = inner.clients.len();
        inner.clients.clear();
        inner.groups.clear();
        info!(clients, "hub: closed");
    }
}

// =============================================================================
// HANDLE
// =============================================================================

/// Lifecycle of the process-wide hub.
#[derive(Clone, Default)]
pub enum HubSlot {
    /// Process is starting; no hub yet.
    #[default]
    Pending,
    Ready(Hub),
    /// Process is shutting down.
    Closed,
}

/// Injected handle to the single canonical hub. Every clone shares one slot.
#[derive(Clone, Default)]
pub struct HubHandle {
    slot: Arc<StdRwLock<HubSlot>>,
}

impl HubHandle {
    #[must_use]
    pub fn pending() -> Self {
        Self::default()
    }

    /// Install the hub. Only the first install while `Pending` takes effect,
    /// so a second instance can never shadow the one sockets are attached to.
    pub fn install(&self, hub: Hub) -> bool {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        match *slot {
            HubSlot::Pending => {
                *slot = HubSlot::Ready(hub);
                info!("hub: installed");
                true
            }
            HubSlot::Ready(_) => {
                warn!("hub: install ignored; a hub is already installed");
                false
            }
            HubSlot::Closed => {
                warn!("hub: install ignored; process is shutting down");
                false
            }
        }
    }

    /// The hub, if installed and not shut down.
    #[must_use]
    pub fn current(&self) -> Option<Hub> {
        match &*self.slot.read().unwrap_or_else(PoisonError::into_inner) {
            HubSlot::Ready(hub) => Some(hub.clone()),
            HubSlot::Pending | HubSlot::Closed => None,
        }
    }

    #[cfg(test)]
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(*self.slot.read().unwrap_or_else(PoisonError::into_inner), HubSlot::Ready(_))
    }

    /// Mark the slot closed and release every client. Idempotent.
    pub async fn shutdown(&self) {
        let previous = {
            let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *slot, HubSlot::Closed)
        };
        if let HubSlot::Ready(hub) = previous {
            hub.close().await;
        }
    }
}

#[cfg(test)]
#[path = "hub_test.rs"]
mod tests;
