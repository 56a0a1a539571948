//! picture-api - numbered JPEG image server

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use picture_api::config::{Config, DEFAULT_CONFIG_PATH};
use picture_api::{logging, Server};
use tracing::{error, info};

/// Serve numbered JPEG images by id or at random
#[derive(Parser, Debug)]
#[command(name = "picture-api", version, about)]
struct Args {
    /// Path to the YAML config file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Listen address (host:port), overrides server.host and server.port
    #[arg(short, long)]
    bind: Option<String>,

    /// Image directory, overrides images.root
    #[arg(short, long)]
    images: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config errors are reported once logging is up
    let (mut config, config_error) = match Config::load(&args.config) {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };

    let _log_guard = match logging::init(&config.log) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            None
        }
    };

    if let Some(e) = config_error {
        error!("Failed to load configuration, continuing with defaults: {}", e);
    }

    if let Some(bind) = &args.bind {
        config.server.set_bind(bind);
    }
    if let Some(images) = args.images {
        config.images.root = images;
    }

    let server = Arc::new(Server::new(config));
    info!("Binding {}", server.bind_addr());

    let signal_server = server.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
            signal_server.shutdown();
        }
    });

    server.run().await
}
