//! Axum-based RPC server.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::service::produce_blocks;
use crate::{handlers, LedgerMetrics, LedgerService, RpcError, ServerConfig, ShutdownController};

/// `POST /` for ledger actions, `GET /health` and `GET /metrics`.
pub fn router(service: Arc<LedgerService>) -> Router {
    Router::new()
        .route("/", post(handlers::rpc))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .layer(CorsLayer::permissive())
        .with_state(service)
}

pub struct RpcServer {
    listener: TcpListener,
    service: Arc<LedgerService>,
    block_interval: Duration,
}

impl RpcServer {
    /// Build the service from `config` and bind its listener.
    pub async fn bind(config: &ServerConfig) -> Result<Self, RpcError> {
        let mut service = LedgerService::from_genesis(&config.allocations()?)?
            .with_status_retention(config.status_retention_blocks);
        if config.enable_metrics {
            service = service.with_metrics(Arc::new(LedgerMetrics::new()?));
        }
        let listener = TcpListener::bind(config.listen_addr()).await?;
        Ok(Self::with_listener(
            listener,
            Arc::new(service),
            config.block_interval(),
        ))
    }

    pub fn with_listener(
        listener: TcpListener,
        service: Arc<LedgerService>,
        block_interval: Duration,
    ) -> Self {
        Self {
            listener,
            service,
            block_interval,
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr, RpcError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn service(&self) -> Arc<LedgerService> {
        self.service.clone()
    }

    /// Serve requests and produce blocks until `shutdown` fires.
    pub fn run(
        self,
        shutdown: &ShutdownController,
    ) -> impl Future<Output = Result<(), RpcError>> + Send + 'static {
        let producer_stop = shutdown.subscribe();
        let mut server_stop = shutdown.subscribe();
        async move {
            let addr = self.listener.local_addr()?;
            info!(%addr, "ledger service listening");

            let producer = tokio::spawn(produce_blocks(
                self.service.clone(),
                self.block_interval,
                producer_stop,
            ));

            let served = axum::serve(self.listener, router(self.service))
                .with_graceful_shutdown(async move { server_stop.triggered().await })
                .await;
            if let Err(e) = &served {
                error!(error = %e, "ledger service failed, stopping block producer");
            }
            join_producer(producer, served.is_err()).await;
            served?;

            info!("ledger service stopped");
            Ok(())
        }
    }
}

/// Wait for the block producer to exit, aborting it first when `abort` is set.
/// Returns whether it finished without panicking.
async fn join_producer(producer: JoinHandle<()>, abort: bool) -> bool {
    if abort {
        producer.abort();
    }
    match producer.await {
        Ok(()) => true,
        Err(e) if e.is_cancelled() => true,
        Err(e) => {
            error!(error = %e, "block producer task failed");
            false
        }
    }
}
