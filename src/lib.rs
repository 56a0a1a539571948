//! picture-api - numbered JPEG image server
//!
//! Serves `<id>.jpg` files from a directory, by id or at random, with
//! content-hash ETags for cache validation.

pub mod api;
pub mod config;
pub mod images;
pub mod logging;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

pub use config::Config;
use images::ImageStore;

/// The picture-api server instance
pub struct Server {
    config: Config,
    images: Arc<ImageStore>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Server {
    /// Create a new server instance
    pub fn new(config: Config) -> Self {
        let images = Arc::new(ImageStore::new(config.images.root.clone()));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            config,
            images,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Build the router
    pub fn router(&self) -> Router {
        let state = api::AppState {
            images: self.images.clone(),
            request_timeout: self.config.server.request_timeout(),
        };
        api::router(state, &self.config.images.favicon)
    }

    /// Bind the configured address
    pub async fn bind(&self) -> Result<TcpListener> {
        let addr = self.bind_addr();
        if self.config.server.port.trim().is_empty() {
            warn!("No port configured, binding an ephemeral port");
        }
        Ok(TcpListener::bind(addr.as_str()).await?)
    }

    /// Run the server until shutdown
    pub async fn run(&self) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener until shutdown
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let local_addr = listener.local_addr()?;
        log_urls(local_addr);
        info!("Serving images from {}", self.config.images.root.display());

        let router = self.router();
        let mut shutdown_rx = self.shutdown_rx.clone();

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.wait_for(|stop| *stop).await;
        })
        .await?;

        info!("picture-api shutdown complete");
        Ok(())
    }

    /// Signal the server to shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> String {
        self.config.server.bind_addr()
    }
}

fn log_urls(local_addr: SocketAddr) {
    info!("picture-api listening, you can visit:");
    info!("http://localhost:{}", local_addr.port());
    info!("http://{}", local_addr);
}
