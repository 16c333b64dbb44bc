//! Client connection manager.
//!
//! DESIGN
//! ======
//! One actor task per session owns every piece of mutable state: the current
//! mode (connecting, a live link, a polling timer, or offline), the published
//! `ConnectionState`, and the event sender. Transitions run only inside that
//! task, so a reconnect always finishes tearing down the previous link or
//! polling timer before negotiation restarts. Two live links or two polling
//! timers can never coexist.
//!
//! The task sleeps on a single `select!` over:
//! - handle commands (`reconnect`, `stop`)
//! - network online/offline changes
//! - the current mode's wake-up (next push, next poll tick, finished cycle)
//!
//! Negotiation walks the candidate list in order. Each attempt is bounded by
//! the handshake timeout and raced against commands and the network going
//! offline; dropping a superseded attempt drops its half-open connection, so
//! a late handshake can never be activated.
//!
//! Polling cycles run as spawned tasks so a slow fetch never blocks the
//! state machine. Cycles may overlap; whichever write lands last wins.
//! Leaving polling aborts in-flight cycles.
//!
//! ERROR HANDLING
//! ==============
//! Handshake, transport and fetch failures are logged and resolved by moving
//! to a less-live tier. Nothing here returns an error to the consumer; the
//! published state is the only user-visible signal.

use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use events::{Action, Category, ClientSignal, DomainEvent, Origin, PushMessage, now_ms};
use futures_util::future::join_all;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::cache::{CacheStore, read_fresh, write_entry};
use crate::config::ManagerConfig;
use crate::dashboard::apply_record;
use crate::endpoints::live_url;
use crate::error::ClientError;
use crate::fetch::ResourceFetcher;
use crate::network::NetworkMonitor;
use crate::state::ConnectionState;
use crate::transport::{LiveConnector, LiveLink};

/// External collaborators injected into a session.
pub struct Collaborators {
    pub connector: Arc<dyn LiveConnector>,
    pub fetcher: Arc<dyn ResourceFetcher>,
    pub cache: Arc<dyn CacheStore>,
    pub network: NetworkMonitor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Reconnect,
    Stop,
}

// =============================================================================
// HANDLE
// =============================================================================

/// Owner-side handle to a running session. Dropping it stops the session.
pub struct ManagerHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ManagerHandle {
    /// Start a session. Events for the dashboard arrive on the returned
    /// receiver in delivery order.
    #[must_use]
    pub fn spawn(config: ManagerConfig, collaborators: Collaborators) -> (Self, mpsc::UnboundedReceiver<DomainEvent>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::initial());

        let Collaborators { connector, fetcher, cache, network } = collaborators;
        let session = Session {
            cache: config.cache_enabled.then_some(cache),
            config,
            connector,
            fetcher,
            network: network.subscribe(),
            network_open: true,
            commands: command_rx,
            events: event_tx,
            state: state_tx,
            mode: Mode::Connecting,
        };
        let task = tokio::spawn(session.run());

        let handle = Self { commands: command_tx, state: state_rx, task: Mutex::new(Some(task)) };
        (handle, event_rx)
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Tear down the current link or polling timer and negotiate again.
    pub fn reconnect(&self) {
        if self.commands.send(Command::Reconnect).is_err() {
            debug!("manager: reconnect after session ended");
        }
    }

    /// Stop polling, leave the dashboard group, close the link, and wait
    /// for the session to finish. Safe to call more than once.
    pub async fn stop(&self) {
        let _ = self.commands.send(Command::Stop);
        let task = self.task.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "manager: session task failed");
            }
        }
    }
}

// =============================================================================
// SESSION
// =============================================================================

enum Mode {
    Connecting,
    Live { endpoint: String, link: Box<dyn LiveLink> },
    Polling(Poller),
    Offline,
}

struct Poller {
    ticker: Interval,
    cycles: JoinSet<bool>,
}

enum Negotiation {
    Linked { endpoint: String, link: Box<dyn LiveLink> },
    Exhausted,
    NoNetwork,
    Superseded(Command),
}

enum Wake {
    Command(Option<Command>),
    NetworkChanged(Result<(), watch::error::RecvError>),
    Push(Option<Result<PushMessage, ClientError>>),
    Tick,
    CycleDone(Result<bool, JoinError>),
}

struct Session {
    config: ManagerConfig,
    connector: Arc<dyn LiveConnector>,
    fetcher: Arc<dyn ResourceFetcher>,
    /// `None` when caching is disabled: no reads and no writes.
    cache: Option<Arc<dyn CacheStore>>,
    network: watch::Receiver<bool>,
    network_open: bool,
    commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<DomainEvent>,
    state: watch::Sender<ConnectionState>,
    mode: Mode,
}

impl Session {
    async fn run(mut self) {
        let mut flow = self.connect().await;
        while flow.is_continue() {
            flow = match self.next_wake().await {
                Wake::Command(Some(Command::Reconnect)) => self.connect().await,
                Wake::Command(Some(Command::Stop) | None) => ControlFlow::Break(()),
                Wake::NetworkChanged(changed) => self.on_network_changed(changed).await,
                Wake::Push(push) => {
                    self.on_push(push).await;
                    ControlFlow::Continue(())
                }
                Wake::Tick => {
                    self.start_cycle();
                    ControlFlow::Continue(())
                }
                Wake::CycleDone(result) => {
                    self.on_cycle_done(result);
                    ControlFlow::Continue(())
                }
            };
        }
        self.teardown().await;
        self.publish(ConnectionState::offline);
        info!("manager: session stopped");
    }

    async fn next_wake(&mut self) -> Wake {
        let network_open = self.network_open;
        let network = &mut self.network;
        let commands = &mut self.commands;
        let mode = &mut self.mode;
        tokio::select! {
            command = commands.recv() => Wake::Command(command),
            changed = network.changed(), if network_open => Wake::NetworkChanged(changed),
            wake = mode_wake(mode) => wake,
        }
    }

    fn online(&self) -> bool {
        *self.network.borrow()
    }

    fn publish(&self, transition: impl FnOnce(&ConnectionState) -> ConnectionState) {
        self.state.send_modify(|state| {
            let next = transition(state);
            if next.phase != state.phase {
                debug!(from = ?state.phase, to = ?next.phase, retry_count = next.retry_count, "manager: transition");
            }
            *state = next;
        });
    }

    fn emit(&self, event: DomainEvent) {
        let _ = self.events.send(event);
    }

    // -------------------------------------------------------------------------
    // Transitions
    // -------------------------------------------------------------------------

    /// Enter `Connecting` and negotiate until a tier is reached.
    async fn connect(&mut self) -> ControlFlow<()> {
        loop {
            self.teardown().await;
            if !self.online() {
                self.enter_offline(true).await;
                return ControlFlow::Continue(());
            }
            self.publish(ConnectionState::connecting);

            match self.negotiate().await {
                Negotiation::Linked { endpoint, link } => {
                    self.enter_live(endpoint, link).await;
                    return ControlFlow::Continue(());
                }
                Negotiation::Exhausted => {
                    self.publish(ConnectionState::exhausted);
                    warn!(
                        candidates = self.config.endpoints.len(),
                        retry_count = self.state.borrow().retry_count,
                        "manager: no candidate completed a handshake"
                    );
                    if self.config.polling_enabled {
                        self.enter_polling();
                    } else {
                        self.enter_offline(false).await;
                    }
                    return ControlFlow::Continue(());
                }
                Negotiation::NoNetwork => {
                    self.enter_offline(true).await;
                    return ControlFlow::Continue(());
                }
                Negotiation::Superseded(Command::Reconnect) => {}
                Negotiation::Superseded(Command::Stop) => return ControlFlow::Break(()),
            }
        }
    }

    async fn negotiate(&mut self) -> Negotiation {
        let candidates = self.config.endpoints.clone();
        for endpoint in candidates {
            let url = live_url(&endpoint);
            let attempt = tokio::time::timeout(self.config.handshake_timeout, self.connector.connect(&url));
            let network_open = self.network_open;
            tokio::select! {
                biased;
                command = self.commands.recv() => {
                    debug!(%url, "manager: handshake superseded");
                    return Negotiation::Superseded(command.unwrap_or(Command::Stop));
                }
                () = went_offline(&mut self.network), if network_open => {
                    debug!(%url, "manager: network lost during handshake");
                    return Negotiation::NoNetwork;
                }
                result = attempt => match result {
                    Ok(Ok(link)) => return Negotiation::Linked { endpoint, link },
                    Ok(Err(e)) => warn!(%url, error = %e, "manager: handshake failed"),
                    Err(_) => warn!(%url, timeout = ?self.config.handshake_timeout, "manager: handshake timed out"),
                },
            }
        }
        Negotiation::Exhausted
    }

    async fn enter_live(&mut self, endpoint: String, mut link: Box<dyn LiveLink>) {
        if let Err(e) = link.send(ClientSignal::JoinDashboard).await {
            warn!(%endpoint, error = %e, "manager: join failed");
            link.close().await;
            self.on_link_lost();
            return;
        }
        info!(%endpoint, "manager: live");
        self.publish(|state| state.live(endpoint.clone(), now_ms()));
        self.mode = Mode::Live { endpoint, link };
    }

    fn enter_polling(&mut self) {
        let mut ticker = tokio::time::interval(self.config.polling_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.mode = Mode::Polling(Poller { ticker, cycles: JoinSet::new() });
        info!(interval = ?self.config.polling_interval, "manager: polling");
        self.publish(|state| state.polling(now_ms()));
    }

    /// `replay` serves every fresh cache entry, used when the device itself
    /// has no network.
    async fn enter_offline(&mut self, replay: bool) {
        self.mode = Mode::Offline;
        info!(replay, "manager: offline");
        self.publish(ConnectionState::offline);
        if !replay {
            return;
        }
        let Some(cache) = self.cache.clone() else {
            return;
        };
        let now = now_ms();
        for category in Category::ALL {
            let fresh = read_fresh(cache.as_ref(), category.cache_key(), now, self.config.freshness_window).await;
            if let Some(entry) = fresh {
                self.emit(DomainEvent::new(category, Action::Snapshot, entry.payload, Origin::Cache));
            }
        }
    }

    /// Stop polling, or leave and close the live link. Leaves the session in
    /// `Connecting` with nothing active.
    async fn teardown(&mut self) {
        match std::mem::replace(&mut self.mode, Mode::Connecting) {
            Mode::Polling(mut poller) => {
                poller.cycles.abort_all();
                debug!("manager: polling stopped");
            }
            Mode::Live { endpoint, mut link } => {
                if let Err(e) = link.send(ClientSignal::LeaveDashboard).await {
                    debug!(%endpoint, error = %e, "manager: leave not delivered");
                }
                link.close().await;
                debug!(%endpoint, "manager: live link closed");
            }
            Mode::Connecting | Mode::Offline => {}
        }
    }

    fn on_link_lost(&mut self) {
        self.mode = Mode::Connecting;
        self.publish(ConnectionState::offline);
        if self.config.polling_enabled {
            self.enter_polling();
        } else {
            self.mode = Mode::Offline;
        }
    }

    // -------------------------------------------------------------------------
    // Wake handlers
    // -------------------------------------------------------------------------

    async fn on_network_changed(&mut self, changed: Result<(), watch::error::RecvError>) -> ControlFlow<()> {
        if changed.is_err() {
            debug!("manager: network monitor gone; keeping last status");
            self.network_open = false;
            return ControlFlow::Continue(());
        }
        let online = *self.network.borrow_and_update();
        let offline = matches!(self.mode, Mode::Offline);
        match (offline, online) {
            (true, true) => self.connect().await,
            (true, false) | (false, true) => ControlFlow::Continue(()),
            (false, false) => {
                self.teardown().await;
                self.enter_offline(true).await;
                ControlFlow::Continue(())
            }
        }
    }

    async fn on_push(&mut self, push: Option<Result<PushMessage, ClientError>>) {
        let message = match push {
            None => {
                if let Mode::Live { endpoint, .. } = &self.mode {
                    warn!(%endpoint, "manager: live link dropped");
                }
                self.on_link_lost();
                return;
            }
            Some(Err(e)) => {
                debug!(error = %e, "manager: ignoring undecodable push");
                return;
            }
            Some(Ok(message)) => message,
        };
        let Some(event) = message.into_event(Origin::Live) else {
            return;
        };
        if let Some(cache) = &self.cache {
            cache_live_event(cache.as_ref(), &event, &self.config).await;
        }
        self.emit(event);
    }

    fn start_cycle(&mut self) {
        let cycle = PollCycle {
            fetcher: Arc::clone(&self.fetcher),
            cache: self.cache.clone(),
            events: self.events.clone(),
            freshness_window: self.config.freshness_window,
        };
        if let Mode::Polling(poller) = &mut self.mode {
            poller.cycles.spawn(cycle.run());
        }
    }

    fn on_cycle_done(&self, result: Result<bool, JoinError>) {
        match result {
            Ok(true) => self.publish(|state| state.touched(now_ms())),
            Ok(false) => debug!("manager: poll cycle reached no resource"),
            Err(e) if e.is_cancelled() => {}
            Err(e) => warn!(error = %e, "manager: poll cycle failed"),
        }
    }
}

async fn mode_wake(mode: &mut Mode) -> Wake {
    match mode {
        Mode::Live { link, .. } => Wake::Push(link.next_push().await),
        Mode::Polling(poller) => tokio::select! {
            _ = poller.ticker.tick() => Wake::Tick,
            Some(done) = poller.cycles.join_next() => Wake::CycleDone(done),
        },
        Mode::Connecting | Mode::Offline => std::future::pending().await,
    }
}

/// Resolves when the device reports offline. Pending forever if the monitor
/// is gone.
async fn went_offline(network: &mut watch::Receiver<bool>) {
    if network.wait_for(|online| !*online).await.is_err() {
        std::future::pending::<()>().await;
    }
}

async fn cache_live_event(cache: &dyn CacheStore, event: &DomainEvent, config: &ManagerConfig) {
    let key = event.category.cache_key();
    let now = now_ms();
    match (event.category, event.action) {
        (Category::DashboardStats, _) | (_, Action::Snapshot) => {
            write_entry(cache, key, event.payload.clone(), now).await;
        }
        (Category::Truck | Category::Maintenance, action) => {
            let mut list = read_fresh(cache, key, now, config.freshness_window)
                .await
                .and_then(|entry| match entry.payload {
                    Value::Array(items) => Some(items),
                    _ => None,
                })
                .unwrap_or_default();
            apply_record(&mut list, action, &event.payload, config.recent_limit);
            write_entry(cache, key, Value::Array(list), now).await;
        }
    }
}

// =============================================================================
// POLL CYCLE
// =============================================================================

struct PollCycle {
    fetcher: Arc<dyn ResourceFetcher>,
    cache: Option<Arc<dyn CacheStore>>,
    events: mpsc::UnboundedSender<DomainEvent>,
    freshness_window: Duration,
}

impl PollCycle {
    /// Fetch every tracked resource concurrently. Returns whether any fetch
    /// reached the server.
    async fn run(self) -> bool {
        let fetches = Category::ALL.map(|category| self.fetch_one(category));
        join_all(fetches).await.into_iter().any(|reached| reached)
    }

    async fn fetch_one(&self, category: Category) -> bool {
        let key = category.cache_key();
        match self.fetcher.fetch(category).await {
            Ok(payload) => {
                if let Some(cache) = &self.cache {
                    write_entry(cache.as_ref(), key, payload.clone(), now_ms()).await;
                }
                let _ = self.events.send(DomainEvent::new(category, Action::Snapshot, payload, Origin::Poll));
                true
            }
            Err(e) => {
                warn!(resource = key, error = %e, "manager: poll fetch failed");
                let fresh = match &self.cache {
                    Some(cache) => read_fresh(cache.as_ref(), key, now_ms(), self.freshness_window).await,
                    None => None,
                };
                if let Some(entry) = fresh {
                    let _ = self.events.send(DomainEvent::new(category, Action::Snapshot, entry.payload, Origin::Cache));
                }
                false
            }
        }
    }
}

#[cfg(test)]
#[path = "manager_test.rs"]
mod tests;
