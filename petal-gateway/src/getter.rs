use std::sync::Arc;

use tracing::instrument;

use petal_core::blob::BlobRecord;
use petal_core::error::ServiceError;
use petal_core::store::MetadataStore;

/// Read coordinator for GET/HEAD: a descriptor lookup by content hash.
pub struct Getter {
    meta: Arc<dyn MetadataStore>,
}

impl Getter {
    pub fn new(meta: Arc<dyn MetadataStore>) -> Self {
        Self { meta }
    }

    #[instrument(skip(self))]
    pub async fn get_blob(&self, hash: &str) -> Result<BlobRecord, ServiceError> {
        match self.meta.get(hash).await {
            Ok(Some(record)) => Ok(record),
            Ok(None) => Err(ServiceError::NotFound("blob not found".to_owned())),
            Err(e) => Err(ServiceError::Internal(e.to_string())),
        }
    }
}
