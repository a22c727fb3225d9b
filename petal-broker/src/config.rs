use serde::Deserialize;

/// Configuration for the Redis stream broker.
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    /// Connection URL, e.g. `redis://localhost:6379`; overridable via the
    /// `BROKER_URI` environment variable.
    pub uri: String,

    /// Stream new blob hashes are appended to.
    #[serde(default = "default_stream")]
    pub stream: String,

    /// Consumer group created alongside the stream.
    #[serde(default = "default_group")]
    pub group: String,

    /// Per-publish timeout in milliseconds.
    #[serde(default = "default_publish_timeout_ms")]
    pub publish_timeout_ms: u64,

    /// Connection pool size.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

fn default_stream() -> String {
    "petal-blobs".to_owned()
}

fn default_group() -> String {
    "petal-processors".to_owned()
}

fn default_publish_timeout_ms() -> u64 {
    500
}

fn default_pool_size() -> usize {
    8
}
