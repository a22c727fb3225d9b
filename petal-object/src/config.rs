use serde::Deserialize;

/// Configuration for the S3/MinIO object store.
///
/// Credentials are not part of the file; they come from the
/// `MINIO_ROOT_USER` / `MINIO_ROOT_PASSWORD` environment variables and are
/// filled in by the server's config loader.
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectStoreConfig {
    /// Endpoint URL, e.g. `http://localhost:9000`.
    pub endpoint: String,

    /// Bucket holding both final objects and transient staging chunks.
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Base URL clients are redirected to for reads. Defaults to `endpoint`.
    pub public_url: Option<String>,

    /// Budget for one whole ingest (read + stage + compose), in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Region name; MinIO accepts anything here.
    #[serde(default = "default_region")]
    pub region: String,

    #[serde(skip)]
    pub access_key: String,

    #[serde(skip)]
    pub secret_key: String,
}

impl ObjectStoreConfig {
    /// Base URL used when building object URLs returned to clients.
    pub fn public_base(&self) -> &str {
        self.public_url.as_deref().unwrap_or(&self.endpoint)
    }
}

fn default_bucket() -> String {
    "blobs".to_owned()
}

fn default_timeout_ms() -> u64 {
    60_000
}

fn default_region() -> String {
    "us-east-1".to_owned()
}
