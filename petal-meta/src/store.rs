use std::time::Duration;

use async_trait::async_trait;
use bson::doc;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{ClientOptions, ServerApi, ServerApiVersion};
use mongodb::{Client, Collection, IndexModel};
use tracing::{info, instrument};

use petal_core::blob::BlobRecord;
use petal_core::error::MetaError;
use petal_core::store::MetadataStore;

use crate::config::MetaConfig;

const BLOB_COLLECTION: &str = "blob";

/// MongoDB error code for a duplicate `_id` insert.
const DUPLICATE_KEY: i32 = 11000;

/// MongoDB error code when the collection already exists.
const NAMESPACE_EXISTS: i32 = 48;

/// MongoDB-backed [`MetadataStore`].
#[derive(Clone)]
pub struct MetaStore {
    client: Client,
    db_name: String,
    query_timeout: Duration,
}

impl std::fmt::Debug for MetaStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetaStore")
            .field("db_name", &self.db_name)
            .field("query_timeout", &self.query_timeout)
            .finish_non_exhaustive()
    }
}

impl MetaStore {
    /// Connect, ping, and bootstrap the `blob` collection if absent.
    pub async fn connect(config: &MetaConfig) -> Result<Self, MetaError> {
        let mut options = ClientOptions::parse(&config.uri)
            .await
            .map_err(|e| MetaError::Backend(e.to_string()))?;
        options.server_api = Some(
            ServerApi::builder()
                .version(ServerApiVersion::V1)
                .build(),
        );
        options.connect_timeout = Some(Duration::from_millis(config.connect_timeout_ms));

        let client =
            Client::with_options(options).map_err(|e| MetaError::Backend(e.to_string()))?;

        let store = Self {
            client,
            db_name: config.database.clone(),
            query_timeout: Duration::from_millis(config.query_timeout_ms),
        };

        store
            .timed(store.client.database(&store.db_name).run_command(doc! { "ping": 1 }))
            .await?
            .map_err(|e| MetaError::Backend(e.to_string()))?;

        store.init_blob_collection().await?;

        info!(database = %store.db_name, "connected to metadata store");
        Ok(store)
    }

    fn collection(&self) -> Collection<BlobRecord> {
        self.client
            .database(&self.db_name)
            .collection(BLOB_COLLECTION)
    }

    /// Create the `blob` collection with its schema validator and `owner`
    /// index. Racing creators are tolerated: "namespace exists" is swallowed.
    async fn init_blob_collection(&self) -> Result<(), MetaError> {
        let db = self.client.database(&self.db_name);

        let names = self
            .timed(db.list_collection_names())
            .await?
            .map_err(|e| MetaError::Backend(e.to_string()))?;
        if !names.iter().any(|n| n == BLOB_COLLECTION) {
            let created = self
                .timed(db.create_collection(BLOB_COLLECTION).validator(doc! {
                    "$jsonSchema": {
                        "bsonType": "object",
                        "required": ["_id", "bucket", "object_url", "upload_time", "owner", "media_type"],
                        "properties": {
                            "_id": {
                                "bsonType": "string",
                                "minLength": 64,
                                "maxLength": 64,
                                "description": "must be a 64-character SHA-256 hash"
                            },
                            "bucket": { "bsonType": "string" },
                            "object_url": { "bsonType": "string" },
                            "upload_time": { "bsonType": "date" },
                            "owner": {
                                "bsonType": "string",
                                "pattern": "^[a-fA-F0-9]{64}$"
                            },
                            "media_type": { "bsonType": "string" },
                            "size": { "bsonType": "long" },
                            "duration": { "bsonType": ["int", "null"] },
                            "dimensions": {
                                "bsonType": ["object", "null"],
                                "properties": {
                                    "width": { "bsonType": "int" },
                                    "height": { "bsonType": "int" }
                                }
                            },
                            "blurhash": { "bsonType": "string" },
                            "tags": {
                                "bsonType": "array",
                                "items": {
                                    "bsonType": "object",
                                    "required": ["key", "value"],
                                    "properties": {
                                        "key": { "bsonType": "string" },
                                        "value": { "bsonType": "string" }
                                    }
                                }
                            }
                        }
                    }
                }))
                .await?;
            match created {
                Ok(()) => {}
                Err(e) if is_namespace_exists(&e) => {}
                Err(e) => return Err(MetaError::Backend(e.to_string())),
            }
        }

        self.timed(
            self.collection()
                .create_index(IndexModel::builder().keys(doc! { "owner": 1 }).build()),
        )
        .await?
        .map_err(|e| MetaError::Backend(e.to_string()))?;

        Ok(())
    }

    /// Run `op` under the query timeout; the outer error is the deadline.
    async fn timed<F>(&self, op: F) -> Result<F::Output, MetaError>
    where
        F: std::future::IntoFuture,
    {
        tokio::time::timeout(self.query_timeout, op)
            .await
            .map_err(|_| MetaError::Timeout)
    }
}

#[async_trait]
impl MetadataStore for MetaStore {
    #[instrument(skip(self, record), fields(id = %record.id))]
    async fn write(&self, record: &BlobRecord) -> Result<(), MetaError> {
        match self.timed(self.collection().insert_one(record)).await? {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Err(MetaError::Duplicate),
            Err(e) => Err(MetaError::Backend(e.to_string())),
        }
    }

    #[instrument(skip(self))]
    async fn get(&self, id: &str) -> Result<Option<BlobRecord>, MetaError> {
        self.timed(self.collection().find_one(doc! { "_id": id }))
            .await?
            .map_err(|e| MetaError::Backend(e.to_string()))
    }

    #[instrument(skip(self))]
    async fn remove(&self, id: &str) -> Result<(), MetaError> {
        self.timed(self.collection().delete_one(doc! { "_id": id }))
            .await?
            .map(|_| ())
            .map_err(|e| MetaError::Backend(e.to_string()))
    }

    #[instrument(skip(self))]
    async fn list(
        &self,
        owner: &str,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<Vec<BlobRecord>, MetaError> {
        let mut filter = doc! { "owner": owner };
        if since.is_some() || until.is_some() {
            let mut bounds = doc! {};
            if let Some(since) = since {
                bounds.insert("$gte", bson::DateTime::from_chrono(since));
            }
            if let Some(until) = until {
                bounds.insert("$lte", bson::DateTime::from_chrono(until));
            }
            filter.insert("upload_time", bounds);
        }

        let cursor = self
            .timed(self.collection().find(filter))
            .await?
            .map_err(|e| MetaError::Backend(e.to_string()))?;

        self.timed(cursor.try_collect())
            .await?
            .map_err(|e| MetaError::Backend(e.to_string()))
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        *err.kind,
        ErrorKind::Write(WriteFailure::WriteError(ref we)) if we.code == DUPLICATE_KEY
    )
}

fn is_namespace_exists(err: &mongodb::error::Error) -> bool {
    matches!(*err.kind, ErrorKind::Command(ref c) if c.code == NAMESPACE_EXISTS)
}
