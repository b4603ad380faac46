//! TCP reachability probe feeding the connectivity monitor.
//!
//! Every interval the probe opens a TCP connection to a well-known host and
//! reports the result to [`ConnectivityMonitor::apply_path`]. A connect that
//! does not finish within the probe timeout counts as offline. The probe has
//! no view of the interface type, so online paths report
//! [`ConnectionType::Unknown`].

use std::sync::Arc;
use std::time::Duration;

use creditsync_common::network::{ConnectionType, ConnectivityMonitor, NetworkPath};
use creditsync_domain::ConnectivityConfig;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::errors::WorkerError;

const WORKER: &str = "reachability probe";

/// Periodic reachability check with explicit lifecycle management.
pub struct ReachabilityProbe {
    monitor: Arc<ConnectivityMonitor>,
    config: ConnectivityConfig,
    join_timeout: Duration,
    cancellation: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

impl ReachabilityProbe {
    pub fn new(monitor: Arc<ConnectivityMonitor>, config: ConnectivityConfig) -> Self {
        Self {
            monitor,
            config,
            join_timeout: Duration::from_secs(5),
            cancellation: CancellationToken::new(),
            task_handle: None,
        }
    }

    #[must_use]
    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }

    /// Spawn the probe loop. The first check runs immediately.
    #[instrument(skip(self), fields(host = %self.config.probe_host, port = self.config.probe_port))]
    pub fn start(&mut self) -> Result<(), WorkerError> {
        if self.is_running() {
            return Err(WorkerError::AlreadyStarted(WORKER));
        }

        self.cancellation = CancellationToken::new();

        let monitor = Arc::clone(&self.monitor);
        let config = self.config.clone();
        let cancel = self.cancellation.clone();

        self.task_handle = Some(tokio::spawn(async move {
            Self::probe_loop(monitor, config, cancel).await;
        }));

        info!("Reachability probe started");
        Ok(())
    }

    /// Cancel the loop and wait for it to finish.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> Result<(), WorkerError> {
        let Some(handle) = self.task_handle.take() else {
            return Err(WorkerError::NotRunning(WORKER));
        };

        self.cancellation.cancel();

        match tokio::time::timeout(self.join_timeout, handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!("Probe task panicked: {}", e);
                return Err(WorkerError::Panicked { worker: WORKER, message: e.to_string() });
            }
            Err(_) => {
                warn!("Probe task did not complete within timeout");
                return Err(WorkerError::JoinTimeout { worker: WORKER, timeout: self.join_timeout });
            }
        }

        info!("Reachability probe stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.task_handle.is_some()
    }

    async fn probe_loop(
        monitor: Arc<ConnectivityMonitor>,
        config: ConnectivityConfig,
        cancel: CancellationToken,
    ) {
        let mut ticker = tokio::time::interval(config.probe_interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Probe loop cancelled");
                    break;
                }
                _ = ticker.tick() => {
                    let reachable = tokio::select! {
                        _ = cancel.cancelled() => break,
                        reachable = probe_once(&config.probe_host, config.probe_port, config.probe_timeout()) => reachable,
                    };

                    let path = if reachable {
                        NetworkPath::online(ConnectionType::Unknown)
                    } else {
                        NetworkPath::offline()
                    };
                    monitor.apply_path(path);
                }
            }
        }
    }
}

impl Drop for ReachabilityProbe {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("ReachabilityProbe dropped while running; cancelling task");
            self.cancellation.cancel();
        }
    }
}

/// One TCP connect attempt bounded by `timeout`.
pub async fn probe_once(host: &str, port: u16, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(_stream)) => true,
        Ok(Err(e)) => {
            debug!(host, port, error = %e, "probe connect failed");
            false
        }
        Err(_) => {
            debug!(host, port, timeout_ms = timeout.as_millis() as u64, "probe connect timed out");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;

    use super::*;

    fn config(port: u16) -> ConnectivityConfig {
        ConnectivityConfig {
            probe_host: "127.0.0.1".to_string(),
            probe_port: port,
            probe_interval_ms: 20,
            probe_timeout_ms: 500,
            probe_enabled: true,
        }
    }

    async fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn open_port_is_reachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        assert!(probe_once("127.0.0.1", port, Duration::from_millis(500)).await);
        assert!(!probe_once("127.0.0.1", closed_port().await, Duration::from_millis(500)).await);
    }

    /// Validates the probe reports a refused connection as offline.
    ///
    /// Assertions:
    /// - The monitor flips from its optimistic default to disconnected
    /// - Stop joins the loop cleanly
    #[tokio::test]
    async fn refused_connection_marks_monitor_offline() {
        let monitor = Arc::new(ConnectivityMonitor::new());
        let mut rx = monitor.subscribe();
        let mut probe = ReachabilityProbe::new(monitor.clone(), config(closed_port().await));

        probe.start().unwrap();
        tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|path| !path.connected))
            .await
            .expect("probe never reported offline")
            .unwrap();

        assert!(!monitor.is_connected());
        probe.stop().await.unwrap();
        assert!(!probe.is_running());
    }

    #[tokio::test]
    async fn listener_comes_back_online() {
        let monitor = Arc::new(ConnectivityMonitor::with_path(NetworkPath::offline()));
        let mut rx = monitor.subscribe();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut probe =
            ReachabilityProbe::new(monitor.clone(), config(listener.local_addr().unwrap().port()));

        probe.start().unwrap();
        tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|path| path.connected))
            .await
            .expect("probe never reported online")
            .unwrap();

        assert_eq!(monitor.connection_type(), ConnectionType::Unknown);
        probe.stop().await.unwrap();
    }

    #[tokio::test]
    async fn lifecycle_errors() {
        let monitor = Arc::new(ConnectivityMonitor::new());
        let mut probe = ReachabilityProbe::new(monitor, config(closed_port().await));

        assert_eq!(probe.stop().await, Err(WorkerError::NotRunning(WORKER)));
        probe.start().unwrap();
        assert_eq!(probe.start(), Err(WorkerError::AlreadyStarted(WORKER)));
        probe.stop().await.unwrap();

        // the probe may be restarted after a clean stop
        probe.start().unwrap();
        probe.stop().await.unwrap();
    }
}
