//! Synod RPC - HTTP API
//!
//! This crate exposes a Paxos node to clients (`/submit`, `/status`) and to
//! the proposers of other members (`/paxos/*`).

pub mod error;
pub mod http;
pub mod scenario;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use synod_consensus::PaxosNode;
use tracing::info;

use http::{create_router, AppState};

pub use error::RpcError;
pub use http::handlers::{SubmitRequest, SubmitResponse, SubmitStatus};
pub use scenario::Scenario;

/// RPC server configuration
#[derive(Debug, Clone)]
pub struct RpcConfig {
    /// HTTP bind address
    pub http_addr: SocketAddr,
}

impl Default for RpcConfig {
    fn default() -> Self {
        RpcConfig {
            http_addr: SocketAddr::from(([127, 0, 0, 1], 8000)),
        }
    }
}

/// RPC server
pub struct RpcServer {
    config: RpcConfig,
    app_state: Arc<AppState>,
}

impl RpcServer {
    /// Create a new RPC server
    pub fn new(config: RpcConfig, node: Arc<PaxosNode>) -> Self {
        let app_state = Arc::new(AppState { node });
        RpcServer { config, app_state }
    }

    pub fn router(&self) -> Router {
        create_router(Arc::clone(&self.app_state))
    }

    /// Run the RPC server until `shutdown` resolves
    pub async fn run<F>(self, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = self.router();
        let addr = self.config.http_addr;

        info!("Starting RPC server on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
    }
}
