use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::instrument;

use petal_core::blob::BlobDescriptor;
use petal_core::error::ServiceError;
use petal_core::store::MetadataStore;

/// Read coordinator for GET /list/:pk.
pub struct Lister {
    meta: Arc<dyn MetadataStore>,
    public_address: String,
}

impl Lister {
    pub fn new(meta: Arc<dyn MetadataStore>, public_address: impl Into<String>) -> Self {
        Self {
            meta,
            public_address: public_address.into(),
        }
    }

    /// Descriptors owned by `owner`, optionally bounded by upload time.
    /// Order is unspecified; callers must not assume one.
    #[instrument(skip(self))]
    pub async fn list_blobs(
        &self,
        owner: &str,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<Vec<BlobDescriptor>, ServiceError> {
        let records = self
            .meta
            .list(owner, since, until)
            .await
            .map_err(|e| ServiceError::Internal(e.to_string()))?;

        Ok(records
            .iter()
            .map(|r| r.to_descriptor(&self.public_address))
            .collect())
    }
}
