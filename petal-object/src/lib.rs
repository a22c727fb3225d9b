//! S3-compatible object storage backend for petal.
//!
//! Implements [`ObjectStore`](petal_core::ObjectStore) against any S3
//! endpoint (MinIO in production). The interesting part is the streaming
//! ingest: the request body is cut into fixed 5 MiB staging objects while a
//! rolling SHA-256 runs over it, the media type is sniffed from the first
//! chunk, and the final content-addressed object is assembled with a
//! server-side multipart copy over the staging objects. Every failure branch
//! sweeps the staging objects best-effort; crash leftovers are tolerated
//! because nothing on the read path ever touches `chunk-*` keys.

mod chunk;
mod config;
mod store;

pub use config::ObjectStoreConfig;
pub use store::S3ObjectStore;
