use std::sync::Arc;

use tracing::instrument;

use petal_core::error::ServiceError;
use petal_core::store::{MetadataStore, ObjectStore};

/// Delete coordinator: object-store object first, then the descriptor, so a
/// failure partway leaves a descriptor whose object is gone rather than an
/// unreachable orphaned object.
pub struct Deleter {
    objects: Arc<dyn ObjectStore>,
    meta: Arc<dyn MetadataStore>,
}

impl Deleter {
    pub fn new(objects: Arc<dyn ObjectStore>, meta: Arc<dyn MetadataStore>) -> Self {
        Self { objects, meta }
    }

    #[instrument(skip(self))]
    pub async fn delete_blob(&self, hash: &str) -> Result<(), ServiceError> {
        let record = match self.meta.get(hash).await {
            Ok(Some(record)) => record,
            Ok(None) => return Err(ServiceError::NotFound("blob not found".to_owned())),
            Err(e) => return Err(ServiceError::Internal(e.to_string())),
        };

        if self.objects.remove(&record.bucket, &record.id).await.is_err() {
            return Err(ServiceError::Internal(
                "failed to remove blob from storage".to_owned(),
            ));
        }

        if self.meta.remove(hash).await.is_err() {
            return Err(ServiceError::Internal(
                "failed to remove blob from database".to_owned(),
            ));
        }

        Ok(())
    }
}
