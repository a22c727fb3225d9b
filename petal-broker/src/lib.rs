//! Redis Streams backend for post-upload announcements.
//!
//! One named stream, one named consumer group, created on connect if absent.
//! The only runtime operation is a single `XADD` per accepted blob, carrying
//! the content hash in a `body` field, under a millisecond-scale deadline.
//! The downstream consumer is a separate service.

mod config;
mod publisher;

pub use config::BrokerConfig;
pub use publisher::RedisPublisher;
