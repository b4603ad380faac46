use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Fixed polling interval used by [`ConnectivityMonitor::wait_for_connection`].
pub const CONNECTION_POLL_INTERVAL: Duration = Duration::from_millis(100);

static SHARED: Lazy<Arc<ConnectivityMonitor>> = Lazy::new(|| Arc::new(ConnectivityMonitor::new()));

/// Interface the device is using to reach the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    Wifi,
    Cellular,
    Ethernet,
    #[default]
    Unknown,
}

impl ConnectionType {
    pub fn label(self) -> &'static str {
        match self {
            Self::Wifi => "WiFi",
            Self::Cellular => "Cellular",
            Self::Ethernet => "Ethernet",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One observation of the network path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkPath {
    pub connected: bool,
    /// Metered link (cellular data, personal hotspot).
    pub expensive: bool,
    /// Low-data mode or similar OS-level throttling.
    pub constrained: bool,
    pub connection_type: ConnectionType,
}

impl NetworkPath {
    pub fn online(connection_type: ConnectionType) -> Self {
        Self {
            connected: true,
            expensive: connection_type == ConnectionType::Cellular,
            constrained: false,
            connection_type,
        }
    }

    pub fn offline() -> Self {
        Self {
            connected: false,
            expensive: false,
            constrained: false,
            connection_type: ConnectionType::Unknown,
        }
    }

    #[must_use]
    pub fn constrained(mut self, constrained: bool) -> Self {
        self.constrained = constrained;
        self
    }
}

impl Default for NetworkPath {
    /// Optimistically connected until the first observation arrives.
    fn default() -> Self {
        Self::online(ConnectionType::Unknown)
    }
}

/// Narrow connectivity view consumed by the retry executor.
#[async_trait]
pub trait ConnectivityGate: Send + Sync {
    /// Synchronous snapshot of reachability.
    fn is_connected(&self) -> bool;

    /// Suspend until connected or `timeout` elapses. Returns whether the
    /// connection came back in time.
    async fn wait_for_connection(&self, timeout: Duration) -> bool;
}

/// Read-mostly reachability state published through a `watch` channel.
#[derive(Debug)]
pub struct ConnectivityMonitor {
    state: watch::Sender<NetworkPath>,
}

impl ConnectivityMonitor {
    pub fn new() -> Self {
        Self::with_path(NetworkPath::default())
    }

    pub fn with_path(initial: NetworkPath) -> Self {
        let (state, _) = watch::channel(initial);
        Self { state }
    }

    /// Lazily-initialised process-wide monitor.
    pub fn shared() -> Arc<Self> {
        Arc::clone(&SHARED)
    }

    /// Record a new path observation. Returns `true` when anything changed.
    ///
    /// Connectivity transitions are logged; they never trigger retries on
    /// their own.
    pub fn apply_path(&self, path: NetworkPath) -> bool {
        let mut previous = None;
        let changed = self.state.send_if_modified(|current| {
            if *current == path {
                return false;
            }
            previous = Some(*current);
            *current = path;
            true
        });

        if let Some(prev) = previous {
            if prev.connected != path.connected {
                if path.connected {
                    info!(connection_type = %path.connection_type, "network connected");
                } else {
                    warn!("network disconnected");
                }
            } else {
                debug!(
                    connection_type = %path.connection_type,
                    expensive = path.expensive,
                    constrained = path.constrained,
                    "network path updated"
                );
            }
        }

        changed
    }

    /// Drain a stream of path observations into the monitor until it ends.
    pub async fn follow<S>(&self, updates: S)
    where
        S: Stream<Item = NetworkPath> + Send,
    {
        futures::pin_mut!(updates);
        while let Some(path) = updates.next().await {
            self.apply_path(path);
        }
        debug!("network path stream ended");
    }

    pub fn current(&self) -> NetworkPath {
        *self.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state.borrow().connected
    }

    pub fn is_expensive(&self) -> bool {
        self.state.borrow().expensive
    }

    pub fn is_constrained(&self) -> bool {
        self.state.borrow().constrained
    }

    pub fn connection_type(&self) -> ConnectionType {
        self.state.borrow().connection_type
    }

    /// Connected and not in a low-data mode.
    pub fn is_suitable_for_upload(&self) -> bool {
        let path = self.state.borrow();
        path.connected && !path.constrained
    }

    pub fn subscribe(&self) -> watch::Receiver<NetworkPath> {
        self.state.subscribe()
    }

    /// Poll every [`CONNECTION_POLL_INTERVAL`] until connected or `timeout`
    /// elapses.
    pub async fn wait_for_connection(&self, timeout: Duration) -> bool {
        if self.is_connected() {
            return true;
        }

        info!(timeout_ms = timeout.as_millis() as u64, "waiting for network connection");
        let started = Instant::now();
        while !self.is_connected() {
            if started.elapsed() >= timeout {
                warn!("timed out waiting for network connection");
                return false;
            }
            tokio::time::sleep(CONNECTION_POLL_INTERVAL).await;
        }
        true
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConnectivityGate for ConnectivityMonitor {
    fn is_connected(&self) -> bool {
        ConnectivityMonitor::is_connected(self)
    }

    async fn wait_for_connection(&self, timeout: Duration) -> bool {
        ConnectivityMonitor::wait_for_connection(self, timeout).await
    }
}
