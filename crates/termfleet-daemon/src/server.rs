//! Server setup and lifecycle management

use crate::api::create_router;
use crate::api::rest::state::AppState;
use crate::config::DaemonConfig;
use crate::dns::{self, DnsProvider, DnsRegistrar, DnsResolver, SystemResolver};
use crate::error::{DaemonError, DaemonResult};
use crate::scheduler::Reconciler;
use crate::storage::{self, Storage};
use axum::Router;
use std::future::Future;
use std::sync::Arc;
use termfleet_health::{HealthProber, HttpProber};
use tokio::net::TcpListener;
use tokio::sync::watch;

/// Termfleet daemon server
pub struct Server {
    config: DaemonConfig,
    state: AppState,
}

impl Server {
    /// Create a new server with the backends selected in configuration
    pub async fn new(config: DaemonConfig) -> DaemonResult<Self> {
        let storage = storage::connect(&config.storage).await?;
        let provider = dns::build_provider(&config.dns)?;
        let prober: Arc<dyn HealthProber> = Arc::new(HttpProber::new(&config.scheduler.probe)?);
        let resolver: Arc<dyn DnsResolver> = Arc::new(SystemResolver::default());

        Ok(Self::with_components(
            config, storage, provider, resolver, prober,
        ))
    }

    /// Create a server around already-built collaborators
    pub fn with_components(
        config: DaemonConfig,
        storage: Arc<dyn Storage>,
        provider: Arc<dyn DnsProvider>,
        resolver: Arc<dyn DnsResolver>,
        prober: Arc<dyn HealthProber>,
    ) -> Self {
        let registrar = Arc::new(DnsRegistrar::new(
            storage.clone(),
            provider.clone(),
            resolver,
            config.dns.ttl_secs,
        ));
        let reconciler = Reconciler::new(
            config.scheduler.clone(),
            storage.clone(),
            prober,
            provider,
        );
        let state = AppState::new(storage, registrar, reconciler);

        Self { config, state }
    }

    /// Router serving this server's state
    pub fn router(&self) -> Router {
        create_router(self.state.clone(), self.config.server.enable_cors)
    }

    pub fn reconciler(&self) -> Arc<Reconciler> {
        self.state.reconciler.clone()
    }

    /// Run the server until Ctrl+C or SIGTERM
    pub async fn run(self) -> DaemonResult<()> {
        let addr = self.config.server.listen_addr;
        let listener = TcpListener::bind(addr).await?;

        tracing::info!("Termfleet daemon listening on {}", addr);
        tracing::info!("Fleet base domain: {}", self.config.dns.base_domain);

        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on `listener` until `shutdown` resolves, then stop the reconciler
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> DaemonResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.router();

        // Start reconciler in background
        let (stop_tx, stop_rx) = watch::channel(false);
        let reconciler = tokio::spawn(self.reconciler().start(stop_rx));

        // Run server with graceful shutdown
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| DaemonError::Server(e.to_string()));

        tracing::info!("Termfleet daemon shutting down");

        // Stop reconciler; a tick in flight finishes first
        let _ = stop_tx.send(true);
        if let Err(e) = reconciler.await {
            tracing::error!(error = %e, "Reconciler task failed");
        }

        served
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
