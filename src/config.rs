//! Server configuration
//!
//! Loaded once at startup from a YAML document, layered with
//! `PICTURE_API_*` environment variables (nested keys split on `__`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use serde::{Deserialize, Deserializer};
use thiserror::Error;

/// Default location of the YAML document
pub const DEFAULT_CONFIG_PATH: &str = "resources/config.yaml";

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "PICTURE_API_";

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {}", .0.display())]
    Missing(PathBuf),

    #[error("invalid config: {0}")]
    Invalid(#[from] Box<figment::Error>),
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub images: ImagesConfig,
    pub log: LogConfig,
}

/// Listener settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind; empty binds every interface
    #[serde(deserialize_with = "string_or_number")]
    pub host: String,
    /// Port to bind; empty binds an ephemeral port
    #[serde(deserialize_with = "string_or_number")]
    pub port: String,
    /// Upper bound on resolving a single image request (default: 30s)
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: String::new(),
            request_timeout_secs: 30,
        }
    }
}

impl ServerConfig {
    /// Address string for the listener, filling in empty host/port
    pub fn bind_addr(&self) -> String {
        let host = match self.host.trim() {
            "" => "0.0.0.0",
            host => host,
        };
        let port = match self.port.trim() {
            "" => "0",
            port => port,
        };

        if host.contains(':') && !host.starts_with('[') {
            format!("[{}]:{}", host, port)
        } else {
            format!("{}:{}", host, port)
        }
    }

    /// Override host and port from a `host:port` string
    pub fn set_bind(&mut self, bind: &str) {
        match bind.rsplit_once(':') {
            Some((host, port)) => {
                self.host = host.trim_start_matches('[').trim_end_matches(']').to_string();
                self.port = port.to_string();
            }
            None => self.host = bind.to_string(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Image directory settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ImagesConfig {
    /// Directory of `<id>.jpg` files
    pub root: PathBuf,
    /// File served at `/favicon.ico`
    pub favicon: PathBuf,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("resources/images"),
            favicon: PathBuf::from("resources/public/favicon.ico"),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directives, used when `RUST_LOG` is unset
    pub filter: Option<String>,
    /// Directory for the daily rolling log files; console only when null
    pub dir: Option<PathBuf>,
    /// Rolled files kept before the oldest is deleted (default: 7)
    pub max_files: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: None,
            dir: Some(PathBuf::from("logs")),
            max_files: 7,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file plus environment overrides
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.is_file() {
            return Err(ConfigError::Missing(path.to_path_buf()));
        }

        Figment::new()
            .merge(Yaml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| ConfigError::Invalid(Box::new(e)))
    }
}

/// Accept `port: 8080` as well as `port: "8080"`
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        String(String),
        Number(u64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::String(s) => s,
        Raw::Number(n) => n.to_string(),
    })
}
