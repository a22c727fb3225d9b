//! Traits the upload pipeline is orchestrated over.
//!
//! Backends (S3/MinIO, MongoDB, Redis Streams) implement these; the gateway
//! crate is written purely against them so it can be exercised with
//! in-memory doubles.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::Stream;
use std::pin::Pin;

use crate::blob::BlobRecord;
use crate::error::{BrokerError, IngestError, MetaError, ObjectStoreError};

/// A request body as an in-flight stream of byte chunks.
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// What the streaming ingest hands back on success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestedObject {
    /// Absolute URL the object store serves the bytes at.
    pub url: String,
    /// Bucket the object was composed into.
    pub bucket: String,
    /// MIME type sniffed from the first chunk.
    pub media_type: String,
    /// Byte count observed while streaming.
    pub size: i64,
}

/// Byte storage for blob content.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stream `body` into the store under the key `expected_hash`.
    ///
    /// The implementation chunks the stream, computes a rolling SHA-256,
    /// sniffs the media type from the first chunk against `declared_type`,
    /// and refuses the payload on empty body, size mismatch (unless
    /// `declared_size` is `-1`), hash mismatch, or type mismatch. On any
    /// failure no object named after the hash remains.
    async fn ingest(
        &self,
        body: BodyStream,
        declared_size: i64,
        expected_hash: &str,
        declared_type: &str,
    ) -> Result<IngestedObject, IngestError>;

    /// Remove the object `key` from `bucket`.
    async fn remove(&self, bucket: &str, key: &str) -> Result<(), ObjectStoreError>;
}

/// Persistence for blob metadata records.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert exactly one record. A primary-key collision yields
    /// [`MetaError::Duplicate`].
    async fn write(&self, record: &BlobRecord) -> Result<(), MetaError>;

    /// Exact-match lookup by content hash.
    async fn get(&self, id: &str) -> Result<Option<BlobRecord>, MetaError>;

    /// Delete one record by content hash.
    async fn remove(&self, id: &str) -> Result<(), MetaError>;

    /// Records owned by `owner`, optionally bounded by upload time.
    /// The result order is unspecified.
    async fn list(
        &self,
        owner: &str,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<Vec<BlobRecord>, MetaError>;
}

/// Post-upload announcement stream.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Append one message whose body is the blob's content hash.
    async fn publish(&self, hash: &str) -> Result<(), BrokerError>;
}
