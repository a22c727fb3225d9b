use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::media;

/// Persisted metadata record for one blob, keyed by its content hash.
///
/// The record is created exclusively by the upload orchestrator after all
/// three sinks have succeeded, and deleted only by the deleter (object store
/// first, then this record). The optional fields are reserved for the
/// downstream stream consumer and are always absent at ingest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlobRecord {
    /// Lowercase hex SHA-256 of the stored bytes; primary key.
    #[serde(rename = "_id")]
    pub id: String,

    /// Bucket the object lives in.
    pub bucket: String,

    /// Absolute URL the object store serves the bytes at.
    pub object_url: String,

    /// Server wall-clock at commit.
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub upload_time: DateTime<Utc>,

    /// Public key from the upload capability (64-char hex).
    pub owner: String,

    /// MIME type as sniffed at ingest, not as declared.
    pub media_type: String,

    /// Byte count observed at ingest.
    pub size: i64,

    /// Media duration in seconds, set by post-processing for audio/video.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<i32>,

    /// Pixel dimensions, set by post-processing for images/video.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Dimensions>,

    /// Blurhash placeholder string, set by post-processing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blurhash: Option<String>,

    /// Free-form key/value tags, set by post-processing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<MetaTag>>,
}

impl BlobRecord {
    /// Build the client-facing descriptor for this record.
    ///
    /// The URL is `<address>/<id><ext>` where the extension comes from the
    /// fixed media-type table (`.bin` when unknown).
    pub fn to_descriptor(&self, address: &str) -> BlobDescriptor {
        BlobDescriptor {
            url: format!(
                "{}/{}{}",
                address,
                self.id,
                media::extension_for(&self.media_type)
            ),
            sha256: self.id.clone(),
            size: self.size,
            media_type: self.media_type.clone(),
            uploaded: self.upload_time.timestamp(),
        }
    }
}

/// Pixel dimensions of an image or video blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: i32,
    pub height: i32,
}

/// One key/value tag attached to a record by post-processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaTag {
    pub key: String,
    pub value: String,
}

/// Wire DTO returned by the upload and list endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlobDescriptor {
    pub url: String,
    pub sha256: String,
    pub size: i64,
    #[serde(rename = "type")]
    pub media_type: String,
    /// Unix seconds.
    pub uploaded: i64,
}
