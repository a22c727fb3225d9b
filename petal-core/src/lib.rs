//! Core domain types for the petal blob service.
//!
//! This crate defines the blob record and descriptor DTO, the traits the
//! upload pipeline is orchestrated over ([`ObjectStore`], [`MetadataStore`],
//! [`EventPublisher`]), the error taxonomy surfaced to clients, and the
//! content-hash and media-type helpers shared by every other crate.

pub mod blob;
pub mod error;
pub mod hash;
pub mod media;
pub mod store;

pub use blob::{BlobDescriptor, BlobRecord, Dimensions, MetaTag};
pub use error::{BrokerError, IngestError, MetaError, ObjectStoreError, ServiceError};
pub use store::{BodyStream, EventPublisher, IngestedObject, MetadataStore, ObjectStore};
