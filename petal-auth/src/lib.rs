//! Capability authorization for petal.
//!
//! Every request carries a short-lived signed event in the `Authorization`
//! header (`Nostr <base64(json)>`) that authorizes exactly one verb against
//! exactly one resource. This crate models the event, recomputes and
//! verifies its Schnorr signature, and enforces the per-verb admission
//! rules. The HTTP middleware in `petal-server` drives [`verify_header`]
//! and the verb-specific resource checks, then attaches the resulting
//! [`Capability`] to the request.
//!
//! Trust is derived from the signature alone: nothing here touches a
//! session, a database, or any other server-side state.

pub mod event;
pub mod verifier;

pub use event::Event;
pub use verifier::{
    AuthError, Capability, Verb, check_delete_target, check_fetch_target,
    check_upload_commitment, verify_header,
};
