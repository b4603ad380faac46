//! Application context - dependency injection container
//!
//! Builds the reconciler and its adapters from [`Config`], then starts the
//! background workers (transaction listener, reachability probe). The host
//! application supplies the purchase authority and the session.

use std::sync::Arc;

use creditsync_common::network::ConnectivityMonitor;
use creditsync_core::ports::{LedgerClient, LegacyStore, SecureStore};
use creditsync_core::{CreditReconciler, LocalCache, PurchaseAuthority, SessionProvider};
use creditsync_domain::{Config, CreditError, Result};
use creditsync_infra::{
    config, HttpLedgerClient, JsonPreferencesStore, KeychainSecureStore, ReachabilityProbe,
    TransactionListener,
};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Collaborators owned by the host application.
#[derive(Clone)]
pub struct HostServices {
    pub authority: Arc<dyn PurchaseAuthority>,
    pub session: Arc<dyn SessionProvider>,
}

impl HostServices {
    pub fn new(authority: Arc<dyn PurchaseAuthority>, session: Arc<dyn SessionProvider>) -> Self {
        Self { authority, session }
    }
}

/// Application context - holds all services and dependencies
pub struct AppContext {
    pub config: Config,
    pub connectivity: Arc<ConnectivityMonitor>,
    pub cache: Arc<LocalCache>,
    pub reconciler: CreditReconciler,

    listener: Mutex<TransactionListener>,
    probe: Mutex<Option<ReachabilityProbe>>,
}

impl AppContext {
    /// Create a context from `.env`, environment variables, or a config file.
    ///
    /// # Errors
    /// Returns `CreditError::Config` if no configuration can be loaded.
    pub async fn new(host: HostServices) -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => info!(path = %path.display(), "Loaded .env"),
            Err(e) => warn!(error = %e, "Could not load .env file"),
        }

        let config = config::load()?;
        Self::new_with_config(config, host).await
    }

    /// Create a context with production adapters: HTTP ledger with a
    /// keychain-stored API key, keychain-backed cache.
    pub async fn new_with_config(config: Config, host: HostServices) -> Result<Self> {
        let ledger = HttpLedgerClient::new(&config.ledger)
            .map_err(|e| CreditError::Config(format!("failed to build ledger client: {e}")))?;
        let store = KeychainSecureStore::new(config.cache.keychain_service.as_str());

        Self::with_adapters(config, host, Arc::new(ledger), Arc::new(store)).await
    }

    /// Create a context over caller-supplied ledger and secure store.
    ///
    /// Tests and embedders use this to avoid the network and the keychain.
    pub async fn with_adapters(
        config: Config,
        host: HostServices,
        ledger: Arc<dyn LedgerClient>,
        store: Arc<dyn SecureStore>,
    ) -> Result<Self> {
        let connectivity = Arc::new(ConnectivityMonitor::new());
        let cache = Arc::new(LocalCache::new(store));

        let mut builder = CreditReconciler::builder(
            ledger,
            Arc::clone(&host.authority),
            host.session,
            Arc::clone(&cache),
        )
        .connectivity(connectivity.clone())
        .attempt_timeout(config.ledger.request_timeout());

        if let Some(path) = &config.cache.legacy_preferences_path {
            let legacy: Arc<dyn LegacyStore> = Arc::new(JsonPreferencesStore::new(path));
            builder = builder.legacy_store(legacy);
        }
        let reconciler = builder.build();

        let mut listener =
            TransactionListener::new(host.authority, reconciler.clone(), config.listener.clone());
        listener.start().map_err(|e| {
            tracing::error!(error = %e, "failed to start transaction listener");
            CreditError::Internal(format!("failed to start transaction listener: {e}"))
        })?;

        let probe = if config.connectivity.probe_enabled {
            let mut probe = ReachabilityProbe::new(connectivity.clone(), config.connectivity.clone())
                .with_join_timeout(config.listener.join_timeout());
            probe.start().map_err(|e| {
                tracing::error!(error = %e, "failed to start reachability probe");
                CreditError::Internal(format!("failed to start reachability probe: {e}"))
            })?;
            Some(probe)
        } else {
            info!("reachability probe disabled");
            None
        };

        info!(ledger = %config.ledger.base_url, "AppContext initialized");

        Ok(Self {
            config,
            connectivity,
            cache,
            reconciler,
            listener: Mutex::new(listener),
            probe: Mutex::new(probe),
        })
    }

    pub async fn is_listening(&self) -> bool {
        self.listener.lock().await.is_running()
    }

    pub async fn is_probing(&self) -> bool {
        self.probe.lock().await.as_ref().is_some_and(ReachabilityProbe::is_running)
    }

    /// Stop the background workers.
    ///
    /// Idempotent. Workers that are not running are skipped; a worker that
    /// fails to join is logged and does not stop the rest of the shutdown.
    pub async fn shutdown(&self) -> Result<()> {
        info!("shutdown called on AppContext");

        {
            let mut listener = self.listener.lock().await;
            if listener.is_running() {
                if let Err(e) = listener.stop().await {
                    warn!(error = %e, "transaction listener did not stop cleanly");
                }
            }
        }

        if let Some(mut probe) = self.probe.lock().await.take() {
            if let Err(e) = probe.stop().await {
                warn!(error = %e, "reachability probe did not stop cleanly");
            }
        }

        info!("AppContext shut down");
        Ok(())
    }
}
