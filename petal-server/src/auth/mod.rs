//! Per-verb capability enforcement at the HTTP edge.
//!
//! Each protected route group carries a [`CapabilityLayer`] bound to its
//! verb (or, for the `/{sha256}` routes, to the request method). The layer
//! runs the full admission ladder from `petal-auth` plus the verb-specific
//! resource checks, and attaches the validated
//! [`Capability`](petal_auth::Capability) to the request.

mod middleware;

pub use middleware::CapabilityLayer;
