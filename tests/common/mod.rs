//! Common test utilities - TestServer harness for end-to-end testing

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use picture_api::{Config, Server};
use reqwest::{Client, Method};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Test harness that runs a real picture-api server on a random port
/// against a temporary image directory
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: Client,
    /// Directory served as the image root
    pub images_dir: PathBuf,
    server: Arc<Server>,
    /// Holds the image root and favicon (cleaned up on drop)
    temp_dir: TempDir,
    _handle: JoinHandle<()>,
}

impl TestServer {
    /// Start a new test server with an empty image store
    pub async fn start() -> Result<Self> {
        Self::start_with_images(&[]).await
    }

    /// Start a test server whose store holds the given `(id, bytes)` images
    pub async fn start_with_images(images: &[(&str, &[u8])]) -> Result<Self> {
        Self::start_with_config(images, |_| {}).await
    }

    /// Start a test server, letting the caller adjust the config first
    pub async fn start_with_config(
        images: &[(&str, &[u8])],
        configure: impl FnOnce(&mut Config),
    ) -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let images_dir = temp_dir.path().join("images");
        std::fs::create_dir(&images_dir)?;
        for (id, data) in images {
            std::fs::write(images_dir.join(format!("{}.jpg", id)), data)?;
        }

        let favicon = temp_dir.path().join("favicon.ico");
        std::fs::write(&favicon, b"icon")?;

        let mut config = Config::default();
        config.server.host = "127.0.0.1".to_string();
        config.images.root = images_dir.clone();
        config.images.favicon = favicon;
        config.log.dir = None;
        configure(&mut config);

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let server = Arc::new(Server::new(config));
        let server_clone = server.clone();

        // Spawn the server in a background task
        let handle = tokio::spawn(async move {
            if let Err(e) = server_clone.serve(listener).await {
                eprintln!("Server error: {}", e);
            }
        });

        let client = Client::builder().timeout(Duration::from_secs(5)).build()?;

        // Poll until server is ready (max 2 seconds)
        let mut ready = false;
        for _ in 0..20 {
            if client
                .get(format!("http://{}/health", addr))
                .send()
                .await
                .is_ok()
            {
                ready = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        if !ready {
            panic!("Server failed to start within 2 seconds");
        }

        Ok(Self {
            addr,
            client,
            images_dir,
            server,
            temp_dir,
            _handle: handle,
        })
    }

    /// Get the base URL for the server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Scratch directory that contains the image root
    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Write (or overwrite) `<id>.jpg` in the image root
    pub fn put_image(&self, id: &str, data: &[u8]) -> PathBuf {
        let path = self.images_dir.join(format!("{}.jpg", id));
        std::fs::write(&path, data).expect("Failed to write image");
        path
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Result<reqwest::Response> {
        Ok(self
            .client
            .get(format!("{}{}", self.base_url(), path))
            .send()
            .await?)
    }

    /// Make a GET request carrying an `If-None-Match` validator
    pub async fn get_if_none_match(&self, path: &str, etag: &str) -> Result<reqwest::Response> {
        Ok(self
            .client
            .get(format!("{}{}", self.base_url(), path))
            .header("If-None-Match", etag)
            .send()
            .await?)
    }

    /// Make a request with an arbitrary method
    pub async fn request(&self, method: Method, path: &str) -> Result<reqwest::Response> {
        Ok(self
            .client
            .request(method, format!("{}{}", self.base_url(), path))
            .send()
            .await?)
    }

    /// Shutdown the server gracefully
    pub fn shutdown(&self) {
        self.server.shutdown();
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.server.shutdown();
    }
}

/// Read a response header as a string (empty when absent)
pub fn header(resp: &reqwest::Response, name: &str) -> String {
    resp.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}
