//! Orchestration for the petal blob service.
//!
//! The [`Uploader`] owns the three-sink commit sequence (object store →
//! metadata store → broker) and all of its compensations; [`Getter`],
//! [`Lister`], and [`Deleter`] are the simpler read/delete coordinators
//! built on the same stores. Everything here is written against the traits
//! in `petal-core`, so the whole pipeline runs unchanged against the
//! in-memory doubles in [`testing`].

mod deleter;
mod getter;
mod lister;
pub mod testing;
mod uploader;

pub use deleter::Deleter;
pub use getter::Getter;
pub use lister::Lister;
pub use uploader::Uploader;
