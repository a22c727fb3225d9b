use std::path::Path;

use serde::Deserialize;

use petal_broker::BrokerConfig;
use petal_meta::MetaConfig;
use petal_object::ObjectStoreConfig;

use crate::error::ServerError;

/// Top-level configuration, loaded from a YAML file.
///
/// Secrets never live in the file: object-store credentials come from
/// `MINIO_ROOT_USER` / `MINIO_ROOT_PASSWORD`, and `DATABASE_URI` /
/// `BROKER_URI` override the file's connection strings when set.
#[derive(Debug, Deserialize)]
pub struct PetalConfig {
    /// HTTP server bind configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Object store (MinIO) configuration.
    pub object_store: ObjectStoreConfig,
    /// Metadata store (MongoDB) configuration.
    pub metadata: MetaConfig,
    /// Broker (Redis stream) configuration.
    pub broker: BrokerConfig,
}

/// HTTP server bind configuration.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public base URL used when building blob URLs in responses.
    /// Defaults to `http://<host>:<port>`.
    pub public_url: Option<String>,
    /// Seconds granted to in-flight requests during shutdown before the
    /// process exits anyway.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_seconds: u64,
    /// Request body ceiling in bytes.
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
    /// Sustained request rate allowed per client, per second.
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_second: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: None,
            shutdown_timeout_seconds: default_shutdown_timeout(),
            body_limit_bytes: default_body_limit(),
            rate_limit_per_second: default_rate_limit(),
        }
    }
}

impl ServerConfig {
    /// Base URL for content-addressed URLs in upload/list responses.
    pub fn public_address(&self) -> String {
        self.public_url
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}", self.host, self.port))
    }
}

fn default_host() -> String {
    "127.0.0.1".to_owned()
}

fn default_port() -> u16 {
    3000
}

fn default_shutdown_timeout() -> u64 {
    10
}

fn default_body_limit() -> usize {
    50 * 1024 * 1024
}

fn default_rate_limit() -> u32 {
    20
}

impl PetalConfig {
    /// Load the YAML file at `path` and apply environment overrides.
    pub fn load(path: &Path) -> Result<Self, ServerError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))?;
        let mut config: Self = serde_yaml::from_str(&contents)
            .map_err(|e| ServerError::Config(e.to_string()))?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(user) = std::env::var("MINIO_ROOT_USER") {
            self.object_store.access_key = user;
        }
        if let Ok(password) = std::env::var("MINIO_ROOT_PASSWORD") {
            self.object_store.secret_key = password;
        }
        if let Ok(uri) = std::env::var("DATABASE_URI") {
            self.metadata.uri = uri;
        }
        if let Ok(uri) = std::env::var("BROKER_URI") {
            self.broker.uri = uri;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r"
object_store:
  endpoint: http://localhost:9000
metadata:
  uri: mongodb://localhost:27017
broker:
  uri: redis://localhost:6379
";

    #[test]
    fn minimal_config_parses_with_defaults() {
        let config: PetalConfig = serde_yaml::from_str(MINIMAL).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.body_limit_bytes, 50 * 1024 * 1024);
        assert_eq!(config.server.shutdown_timeout_seconds, 10);
        assert_eq!(config.object_store.bucket, "blobs");
        assert_eq!(config.metadata.database, "petal");
        assert_eq!(config.broker.stream, "petal-blobs");
    }

    #[test]
    fn public_address_defaults_to_bind_address() {
        let config: PetalConfig = serde_yaml::from_str(MINIMAL).unwrap();
        assert_eq!(config.server.public_address(), "http://127.0.0.1:3000");
    }

    #[test]
    fn explicit_public_url_wins() {
        let yaml = format!("{MINIMAL}server:\n  public_url: https://blobs.example.com\n");
        let config: PetalConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config.server.public_address(), "https://blobs.example.com");
    }
}
