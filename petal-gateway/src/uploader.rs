use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, instrument};

use petal_core::blob::{BlobDescriptor, BlobRecord};
use petal_core::error::{MetaError, ServiceError};
use petal_core::store::{BodyStream, EventPublisher, MetadataStore, ObjectStore};

/// The upload orchestrator.
///
/// Commit order is rigid: object first (a partial upload never leaves a
/// dangling descriptor), descriptor second (a found descriptor always has
/// bytes), announcement last (downstream processors only ever see committed
/// blobs). Each later step compensates by undoing the earlier ones, so from
/// the outside the three sinks either all hold the blob or none do.
pub struct Uploader {
    objects: Arc<dyn ObjectStore>,
    meta: Arc<dyn MetadataStore>,
    publisher: Arc<dyn EventPublisher>,
    public_address: String,
}

impl Uploader {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        meta: Arc<dyn MetadataStore>,
        publisher: Arc<dyn EventPublisher>,
        public_address: impl Into<String>,
    ) -> Self {
        Self {
            objects,
            meta,
            publisher,
            public_address: public_address.into(),
        }
    }

    /// Run a validated upload through the full commit sequence.
    ///
    /// `expected_hash` is the capability's body-hash commitment, already
    /// checked against the buffered body by the auth middleware; the ingest
    /// verifies it again against the bytes it actually stores.
    #[instrument(skip(self, body), fields(hash = %expected_hash, owner = %owner))]
    pub async fn upload(
        &self,
        body: BodyStream,
        declared_size: i64,
        expected_hash: &str,
        declared_type: &str,
        owner: &str,
    ) -> Result<BlobDescriptor, ServiceError> {
        // Advisory dedup: the insert's primary-key uniqueness is the
        // authority under races.
        match self.meta.get(expected_hash).await {
            Ok(Some(_)) => {
                return Err(ServiceError::BadRequest(
                    "a blob with the same hash already exists".to_owned(),
                ));
            }
            Ok(None) => {}
            Err(e) => return Err(ServiceError::Internal(e.to_string())),
        }

        let ingested = self
            .objects
            .ingest(body, declared_size, expected_hash, declared_type)
            .await
            .map_err(|e| {
                if e.is_payload_fault() {
                    ServiceError::BadRequest(e.to_string())
                } else {
                    error!(error = %e, "ingest failed");
                    ServiceError::Internal(e.to_string())
                }
            })?;

        let record = BlobRecord {
            id: expected_hash.to_owned(),
            bucket: ingested.bucket.clone(),
            object_url: ingested.url.clone(),
            upload_time: Utc::now(),
            owner: owner.to_owned(),
            media_type: ingested.media_type.clone(),
            size: ingested.size,
            duration: None,
            dimensions: None,
            blurhash: None,
            tags: None,
        };

        if let Err(e) = self.meta.write(&record).await {
            self.remove_object(&ingested.bucket, expected_hash).await;
            return Err(match e {
                // Lost the race against a concurrent identical upload; the
                // bytes are identical so removing our copy is harmless.
                MetaError::Duplicate => ServiceError::BadRequest(e.to_string()),
                _ => {
                    error!(error = %e, "descriptor insert failed");
                    ServiceError::Internal("couldn't add blob to database".to_owned())
                }
            });
        }

        if let Err(e) = self.publisher.publish(expected_hash).await {
            error!(error = %e, "failed to publish announcement for further processing");
            self.remove_object(&ingested.bucket, expected_hash).await;
            self.remove_record(expected_hash).await;
            return Err(ServiceError::Internal(
                "failed to publish blob to queue for further processing".to_owned(),
            ));
        }

        info!(size = ingested.size, media_type = %ingested.media_type, "blob committed");
        Ok(record.to_descriptor(&self.public_address))
    }

    /// Compensation: best-effort object removal, logged but never retried.
    async fn remove_object(&self, bucket: &str, key: &str) {
        if let Err(e) = self.objects.remove(bucket, key).await {
            error!(key = %key, error = %e, "failed to remove object during compensation");
        }
    }

    /// Compensation: best-effort descriptor removal.
    async fn remove_record(&self, id: &str) {
        if let Err(e) = self.meta.remove(id).await {
            error!(id = %id, error = %e, "failed to remove descriptor during compensation");
        }
    }
}
