//! Device connectivity signal.
//!
//! A watch channel of `online: bool` owned by whoever embeds the manager.
//! Native callers can attach a periodic TCP probe; tests flip it directly.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(30);
const PROBE_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct NetworkMonitor {
    tx: Arc<watch::Sender<bool>>,
}

impl NetworkMonitor {
    #[must_use]
    pub fn new(online: bool) -> Self {
        Self { tx: Arc::new(watch::Sender::new(online)) }
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Publish a connectivity change. Repeats of the current value are
    /// swallowed so subscribers only wake on real transitions.
    pub fn set_online(&self, online: bool) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            info!(online, "network: connectivity changed");
        }
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Periodically check that `target` (`host:port`) accepts TCP connections
    /// and publish the result. The task runs until aborted.
    #[must_use]
    pub fn spawn_probe(&self, target: String, interval: Duration) -> JoinHandle<()> {
        let monitor = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let reachable = matches!(
                    tokio::time::timeout(PROBE_CONNECT_TIMEOUT, TcpStream::connect(&target)).await,
                    Ok(Ok(_))
                );
                monitor.set_online(reachable);
            }
        })
    }
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn repeated_value_does_not_wake_subscribers() {
        let monitor = NetworkMonitor::new(true);
        let mut rx = monitor.subscribe();
        monitor.set_online(true);
        assert!(!rx.has_changed().expect("sender alive"));

        monitor.set_online(false);
        assert!(rx.has_changed().expect("sender alive"));
        rx.changed().await.expect("changed");
        assert!(!*rx.borrow());
        assert!(!monitor.is_online());
    }

    #[tokio::test]
    async fn probe_marks_unreachable_target_offline() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);

        let monitor = NetworkMonitor::new(true);
        let mut rx = monitor.subscribe();
        let probe = monitor.spawn_probe(addr.to_string(), Duration::from_secs(30));
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|online| !*online))
            .await
            .expect("probe timed out")
            .expect("sender alive");
        probe.abort();
    }
}
