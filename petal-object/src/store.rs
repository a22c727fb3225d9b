use std::time::Duration;

use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use bytes::Bytes;
use futures::StreamExt;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use petal_core::error::{IngestError, ObjectStoreError};
use petal_core::media;
use petal_core::store::{BodyStream, IngestedObject, ObjectStore};

use crate::chunk::{CHUNK_SIZE, ChunkAssembler};
use crate::config::ObjectStoreConfig;

/// Budget for sweeping staging chunks and other compensating deletes.
/// Deliberately independent of the ingest budget so cleanup still runs when
/// the ingest deadline has already expired.
const CLEANUP_TIMEOUT: Duration = Duration::from_secs(5);

/// S3/MinIO-backed [`ObjectStore`].
#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    public_base: String,
    timeout: Duration,
}

impl std::fmt::Debug for S3ObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3ObjectStore")
            .field("bucket", &self.bucket)
            .field("public_base", &self.public_base)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl S3ObjectStore {
    /// Build a client against the configured endpoint with static
    /// credentials and path-style addressing (MinIO does not serve
    /// virtual-hosted buckets).
    pub async fn connect(config: &ObjectStoreConfig) -> Self {
        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "StaticCredentialsProvider",
        );

        let shared = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .load()
            .await;

        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .endpoint_url(&config.endpoint)
            .force_path_style(true)
            .build();

        info!(endpoint = %config.endpoint, bucket = %config.bucket, "connected to object store");

        Self {
            client: Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
            public_base: config.public_base().trim_end_matches('/').to_owned(),
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.public_base, self.bucket, key)
    }

    fn staging_name(index: usize) -> String {
        format!("chunk-{}-{}", Uuid::new_v4(), index)
    }

    async fn stage_chunk(
        &self,
        chunk: Bytes,
        staged: &mut Vec<String>,
        media_type: &mut Option<String>,
        declared_type: &str,
    ) -> Result<(), IngestError> {
        let index = staged.len();
        if index == 0 {
            let detected = media::detect_media_type(&chunk);
            if !media::satisfies_declared(&detected, declared_type) {
                return Err(IngestError::TypeMismatch {
                    declared: declared_type.to_owned(),
                    detected,
                });
            }
            *media_type = Some(detected);
        }

        let name = Self::staging_name(index);
        // Record the name first so a failed put is still swept.
        staged.push(name.clone());

        debug!(chunk = %name, size = chunk.len(), "staging chunk");
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&name)
            .content_type(media_type.as_deref().unwrap_or("application/octet-stream"))
            .body(ByteStream::from(chunk))
            .send()
            .await
            .map_err(|e| {
                warn!(chunk = %name, error = %e, "failed to stage chunk");
                IngestError::Store(ObjectStoreError::Backend(e.to_string()))
            })?;

        Ok(())
    }

    async fn stage_and_compose(
        &self,
        mut body: BodyStream,
        declared_size: i64,
        expected_hash: &str,
        declared_type: &str,
        staged: &mut Vec<String>,
    ) -> Result<IngestedObject, IngestError> {
        let mut assembler = ChunkAssembler::new(CHUNK_SIZE);
        let mut hasher = Sha256::new();
        let mut observed: i64 = 0;
        let mut media_type: Option<String> = None;

        while let Some(frame) = body.next().await {
            let frame = frame.map_err(|e| IngestError::Read(e.to_string()))?;
            hasher.update(&frame);
            observed += frame.len() as i64;
            for chunk in assembler.push(&frame) {
                self.stage_chunk(chunk, staged, &mut media_type, declared_type)
                    .await?;
            }
        }
        if let Some(last) = assembler.finish() {
            self.stage_chunk(last, staged, &mut media_type, declared_type)
                .await?;
        }

        if staged.is_empty() {
            return Err(IngestError::EmptyBody);
        }
        if declared_size != -1 && observed != declared_size {
            return Err(IngestError::SizeMismatch {
                expected: declared_size,
                actual: observed,
            });
        }
        let computed = hex::encode(hasher.finalize());
        if computed != expected_hash {
            return Err(IngestError::HashMismatch {
                expected: expected_hash.to_owned(),
                computed,
            });
        }

        // Guaranteed by the non-empty staging list.
        let media_type = media_type.unwrap_or_else(|| "application/octet-stream".to_owned());

        self.compose(staged, &computed, &media_type).await?;

        info!(hash = %computed, size = observed, media_type = %media_type, "object composed");

        Ok(IngestedObject {
            url: self.object_url(&computed),
            bucket: self.bucket.clone(),
            media_type,
            size: observed,
        })
    }

    /// Server-side assembly of the staged chunks into the final object.
    ///
    /// Multipart copy preserves the staging order, so the composed bytes are
    /// byte-identical to the original stream and the pre-compose hash check
    /// holds for the final object.
    async fn compose(
        &self,
        staged: &[String],
        key: &str,
        content_type: &str,
    ) -> Result<(), IngestError> {
        let backend =
            |e: String| IngestError::Store(ObjectStoreError::Backend(e));

        let created = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| backend(e.to_string()))?;
        let upload_id = created.upload_id().unwrap_or_default().to_owned();

        let mut parts = Vec::with_capacity(staged.len());
        for (i, name) in staged.iter().enumerate() {
            let part_number = i as i32 + 1;
            let copied = match self
                .client
                .upload_part_copy()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(&upload_id)
                .part_number(part_number)
                .copy_source(format!("{}/{}", self.bucket, name))
                .send()
                .await
            {
                Ok(copied) => copied,
                Err(e) => {
                    self.abort_compose(key, &upload_id).await;
                    return Err(backend(e.to_string()));
                }
            };

            let e_tag = copied
                .copy_part_result()
                .and_then(|r| r.e_tag())
                .unwrap_or_default()
                .to_owned();
            parts.push(
                CompletedPart::builder()
                    .part_number(part_number)
                    .e_tag(e_tag)
                    .build(),
            );
        }

        if let Err(e) = self
            .client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(&upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .send()
            .await
        {
            self.abort_compose(key, &upload_id).await;
            return Err(backend(e.to_string()));
        }

        Ok(())
    }

    async fn abort_compose(&self, key: &str, upload_id: &str) {
        if let Err(e) = self
            .client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
        {
            warn!(key = %key, error = %e, "failed to abort multipart compose");
        }
    }

    /// Best-effort removal of every staged chunk. Leftovers from a crash are
    /// never read by the GET path and can be swept out-of-band.
    async fn sweep_staging(&self, staged: &[String]) {
        for name in staged {
            let delete = self
                .client
                .delete_object()
                .bucket(&self.bucket)
                .key(name)
                .send();
            match tokio::time::timeout(CLEANUP_TIMEOUT, delete).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => warn!(chunk = %name, error = %e, "failed to delete staging chunk"),
                Err(_) => warn!(chunk = %name, "timed out deleting staging chunk"),
            }
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    #[instrument(skip(self, body), fields(bucket = %self.bucket, hash = %expected_hash))]
    async fn ingest(
        &self,
        body: BodyStream,
        declared_size: i64,
        expected_hash: &str,
        declared_type: &str,
    ) -> Result<IngestedObject, IngestError> {
        let mut staged = Vec::new();

        let result = match tokio::time::timeout(
            self.timeout,
            self.stage_and_compose(body, declared_size, expected_hash, declared_type, &mut staged),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(IngestError::Store(ObjectStoreError::Timeout)),
        };

        // Staged chunks are transient on every path, success included; the
        // sweep runs under its own deadline so an expired ingest budget does
        // not leave them behind.
        self.sweep_staging(&staged).await;

        result
    }

    #[instrument(skip(self))]
    async fn remove(&self, bucket: &str, key: &str) -> Result<(), ObjectStoreError> {
        let delete = self.client.delete_object().bucket(bucket).key(key).send();
        match tokio::time::timeout(self.timeout, delete).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(ObjectStoreError::Backend(e.to_string())),
            Err(_) => Err(ObjectStoreError::Timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staging_names_carry_prefix_and_index() {
        let name = S3ObjectStore::staging_name(3);
        assert!(name.starts_with("chunk-"));
        assert!(name.ends_with("-3"));
        // chunk- + uuid (36) + -3
        assert_eq!(name.len(), "chunk-".len() + 36 + 2);
    }

    #[test]
    fn staging_names_are_unique() {
        assert_ne!(S3ObjectStore::staging_name(0), S3ObjectStore::staging_name(0));
    }
}
