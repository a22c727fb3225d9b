use serde::Deserialize;

/// Configuration for the MongoDB metadata store.
#[derive(Debug, Clone, Deserialize)]
pub struct MetaConfig {
    /// Connection string; overridable via the `DATABASE_URI` environment
    /// variable.
    pub uri: String,

    /// Database name.
    #[serde(default = "default_database")]
    pub database: String,

    /// Client connection timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Per-operation query timeout in milliseconds.
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,
}

fn default_database() -> String {
    "petal".to_owned()
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_query_timeout_ms() -> u64 {
    2_000
}
