//! HTTP server for the petal content-addressed blob service.
//!
//! The binary in `main.rs` wires the real backends (MinIO, MongoDB, Redis)
//! into the router built here; integration tests wire the in-memory doubles
//! from `petal-gateway` instead.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod ratelimit;
