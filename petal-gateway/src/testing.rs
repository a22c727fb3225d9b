//! In-memory implementations of the sink traits, with failure injection.
//!
//! These honor the same contracts as the real backends (ingest validation,
//! duplicate detection, idempotent deletes) so the orchestrators and the
//! HTTP layer can be exercised end to end without MinIO, MongoDB, or Redis.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use petal_core::blob::BlobRecord;
use petal_core::error::{BrokerError, IngestError, MetaError, ObjectStoreError};
use petal_core::media;
use petal_core::store::{
    BodyStream, EventPublisher, IngestedObject, MetadataStore, ObjectStore,
};

/// Wrap a byte slice as a request body stream.
pub fn body_from(bytes: &[u8]) -> BodyStream {
    let chunk = Bytes::copy_from_slice(bytes);
    Box::pin(futures::stream::once(async move { Ok(chunk) }))
}

/// A sample record for tests; `seed` must be two hex characters.
pub fn sample_record(seed: &str) -> BlobRecord {
    let id = seed.repeat(32);
    BlobRecord {
        id: id.clone(),
        bucket: "blobs".to_owned(),
        object_url: format!("http://localhost:9000/blobs/{id}"),
        upload_time: Utc::now(),
        owner: "a".repeat(64),
        media_type: "text/plain; charset=utf-8".to_owned(),
        size: 4,
        duration: None,
        dimensions: None,
        blurhash: None,
        tags: None,
    }
}

/// In-memory [`ObjectStore`].
#[derive(Clone)]
pub struct MemoryObjectStore {
    bucket: String,
    objects: Arc<Mutex<HashMap<(String, String), Bytes>>>,
    fail_ingest: Arc<Mutex<bool>>,
    fail_remove: Arc<Mutex<bool>>,
}

impl MemoryObjectStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: Arc::new(Mutex::new(HashMap::new())),
            fail_ingest: Arc::new(Mutex::new(false)),
            fail_remove: Arc::new(Mutex::new(false)),
        }
    }

    pub async fn put(&self, bucket: &str, key: &str, data: Bytes) {
        self.objects
            .lock()
            .await
            .insert((bucket.to_owned(), key.to_owned()), data);
    }

    pub async fn contains(&self, bucket: &str, key: &str) -> bool {
        self.objects
            .lock()
            .await
            .contains_key(&(bucket.to_owned(), key.to_owned()))
    }

    pub async fn object(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.objects
            .lock()
            .await
            .get(&(bucket.to_owned(), key.to_owned()))
            .cloned()
    }

    /// Make the next ingest fail after validation, as a backend fault.
    pub async fn fail_next_ingest(&self) {
        *self.fail_ingest.lock().await = true;
    }

    /// Make the next remove fail.
    pub async fn fail_next_remove(&self) {
        *self.fail_remove.lock().await = true;
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn ingest(
        &self,
        mut body: BodyStream,
        declared_size: i64,
        expected_hash: &str,
        declared_type: &str,
    ) -> Result<IngestedObject, IngestError> {
        let mut buf = Vec::new();
        while let Some(frame) = body.next().await {
            let frame = frame.map_err(|e| IngestError::Read(e.to_string()))?;
            buf.extend_from_slice(&frame);
        }

        if buf.is_empty() {
            return Err(IngestError::EmptyBody);
        }

        let detected = media::detect_media_type(&buf);
        if !media::satisfies_declared(&detected, declared_type) {
            return Err(IngestError::TypeMismatch {
                declared: declared_type.to_owned(),
                detected,
            });
        }

        let observed = buf.len() as i64;
        if declared_size != -1 && observed != declared_size {
            return Err(IngestError::SizeMismatch {
                expected: declared_size,
                actual: observed,
            });
        }

        let computed = hex::encode(Sha256::digest(&buf));
        if computed != expected_hash {
            return Err(IngestError::HashMismatch {
                expected: expected_hash.to_owned(),
                computed,
            });
        }

        if std::mem::take(&mut *self.fail_ingest.lock().await) {
            return Err(IngestError::Store(ObjectStoreError::Backend(
                "injected ingest failure".to_owned(),
            )));
        }

        let bucket = self.bucket.clone();
        self.put(&bucket, &computed, Bytes::from(buf)).await;

        Ok(IngestedObject {
            url: format!("http://localhost:9000/{}/{computed}", self.bucket),
            bucket: self.bucket.clone(),
            media_type: detected,
            size: observed,
        })
    }

    async fn remove(&self, bucket: &str, key: &str) -> Result<(), ObjectStoreError> {
        if std::mem::take(&mut *self.fail_remove.lock().await) {
            return Err(ObjectStoreError::Backend(
                "injected remove failure".to_owned(),
            ));
        }
        // Deleting an absent object succeeds, as in S3.
        self.objects
            .lock()
            .await
            .remove(&(bucket.to_owned(), key.to_owned()));
        Ok(())
    }
}

/// In-memory [`MetadataStore`].
#[derive(Clone)]
pub struct MemoryMetadataStore {
    records: Arc<Mutex<HashMap<String, BlobRecord>>>,
    fail_write: Arc<Mutex<bool>>,
    duplicate_on_write: Arc<Mutex<bool>>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(HashMap::new())),
            fail_write: Arc::new(Mutex::new(false)),
            duplicate_on_write: Arc::new(Mutex::new(false)),
        }
    }

    /// Seed a record directly, bypassing the trait.
    pub async fn insert(&self, record: BlobRecord) {
        self.records.lock().await.insert(record.id.clone(), record);
    }

    /// Make the next write fail as a backend fault.
    pub async fn fail_next_write(&self) {
        *self.fail_write.lock().await = true;
    }

    /// Make the next write report a duplicate key, simulating a lost race
    /// against a concurrent identical upload.
    pub async fn inject_duplicate_on_write(&self) {
        *self.duplicate_on_write.lock().await = true;
    }
}

impl Default for MemoryMetadataStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn write(&self, record: &BlobRecord) -> Result<(), MetaError> {
        if std::mem::take(&mut *self.fail_write.lock().await) {
            return Err(MetaError::Backend("injected write failure".to_owned()));
        }
        if std::mem::take(&mut *self.duplicate_on_write.lock().await) {
            return Err(MetaError::Duplicate);
        }

        let mut records = self.records.lock().await;
        if records.contains_key(&record.id) {
            return Err(MetaError::Duplicate);
        }
        records.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<BlobRecord>, MetaError> {
        Ok(self.records.lock().await.get(id).cloned())
    }

    async fn remove(&self, id: &str) -> Result<(), MetaError> {
        self.records.lock().await.remove(id);
        Ok(())
    }

    async fn list(
        &self,
        owner: &str,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<Vec<BlobRecord>, MetaError> {
        Ok(self
            .records
            .lock()
            .await
            .values()
            .filter(|r| r.owner == owner)
            .filter(|r| since.is_none_or(|s| r.upload_time >= s))
            .filter(|r| until.is_none_or(|u| r.upload_time <= u))
            .cloned()
            .collect())
    }
}

/// In-memory [`EventPublisher`] that records every announcement.
#[derive(Clone)]
pub struct MemoryPublisher {
    messages: Arc<Mutex<Vec<String>>>,
    fail: Arc<Mutex<bool>>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self {
            messages: Arc::new(Mutex::new(Vec::new())),
            fail: Arc::new(Mutex::new(false)),
        }
    }

    pub async fn messages(&self) -> Vec<String> {
        self.messages.lock().await.clone()
    }

    /// Make the next publish fail.
    pub async fn fail_next(&self) {
        *self.fail.lock().await = true;
    }
}

impl Default for MemoryPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for MemoryPublisher {
    async fn publish(&self, hash: &str) -> Result<(), BrokerError> {
        if std::mem::take(&mut *self.fail.lock().await) {
            return Err(BrokerError::Backend("injected publish failure".to_owned()));
        }
        self.messages.lock().await.push(hash.to_owned());
        Ok(())
    }
}
