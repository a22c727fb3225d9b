use std::fmt;

use base64::Engine;
use thiserror::Error;

use petal_core::hash;

use crate::event::{CAPABILITY_KIND, Event};

/// The verb a capability authorizes. Bound to a route by the middleware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Upload,
    Get,
    Head,
    List,
    Delete,
}

impl Verb {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Get => "get",
            Self::Head => "head",
            Self::List => "list",
            Self::Delete => "delete",
        }
    }

    /// Whether this verb binds the capability to a resource hash.
    fn requires_resource(self) -> bool {
        matches!(self, Self::Upload | Self::Delete)
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated capability, attached to the request for downstream handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capability {
    /// Caller identity (64-char hex public key).
    pub pubkey: String,
    /// The verb the event was issued for.
    pub verb: Verb,
    /// The `x` tag: the resource hash the capability is bound to.
    pub resource: Option<String>,
    /// The `server` tag, honored for get/head.
    pub server: Option<String>,
    /// Expiration instant, unix seconds.
    pub expiration: i64,
}

/// Admission failures. Every variant renders as the one-phrase diagnostic
/// written into the `X-Reason` response header alongside a 401.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing Authorization header")]
    MissingHeader,

    #[error("missing Nostr header prefix")]
    MissingPrefix,

    #[error("decode base64 event failed: {0}")]
    Base64(String),

    #[error("json decode failed: {0}")]
    Json(String),

    #[error("invalid signature")]
    Signature,

    #[error("invalid kind")]
    Kind,

    #[error("invalid created_at")]
    CreatedAt,

    #[error("empty expiration tag")]
    MissingExpiration,

    #[error("invalid expiration")]
    Expiration,

    #[error("empty t tag")]
    MissingVerb,

    #[error("invalid action")]
    VerbMismatch,

    #[error("{0} requires 'x' tag")]
    MissingResource(Verb),

    #[error("invalid sha256 hash as 'x' tag")]
    InvalidResource,

    #[error("could not read request body: {0}")]
    BodyRead(String),

    #[error("x tag mismatch with URL sha256 for delete action")]
    DeleteMismatch,

    #[error("invalid 'x' and 'server' tag")]
    FetchMismatch,

    #[error("invalid SHA256 hash")]
    InvalidHashParam,
}

/// Parse and validate the `Authorization` header for `verb` at wall-clock
/// `now` (unix seconds).
///
/// Runs the verb-independent admission ladder: header shape, base64 + JSON
/// decode, signature, kind, freshness window, verb binding, and the
/// resource-tag requirement for upload/delete. The verb-specific resource
/// checks ([`check_upload_commitment`], [`check_delete_target`],
/// [`check_fetch_target`]) need request context and are run by the
/// middleware afterwards.
pub fn verify_header(
    header: Option<&str>,
    verb: Verb,
    now: i64,
) -> Result<Capability, AuthError> {
    let header = header.ok_or(AuthError::MissingHeader)?;
    let encoded = header
        .strip_prefix("Nostr ")
        .ok_or(AuthError::MissingPrefix)?;

    let raw = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| AuthError::Base64(e.to_string()))?;
    let event: Event =
        serde_json::from_slice(&raw).map_err(|e| AuthError::Json(e.to_string()))?;

    if !event.verify_signature() {
        return Err(AuthError::Signature);
    }
    if event.kind != CAPABILITY_KIND {
        return Err(AuthError::Kind);
    }
    // Strictly past; an event stamped "now" is rejected.
    if event.created_at >= now {
        return Err(AuthError::CreatedAt);
    }

    let expiration = event
        .tag_value("expiration")
        .ok_or(AuthError::MissingExpiration)?;
    let expiration: i64 = expiration.parse().map_err(|_| AuthError::Expiration)?;
    if expiration <= now {
        return Err(AuthError::Expiration);
    }

    let t = event.tag_value("t").ok_or(AuthError::MissingVerb)?;
    if t != verb.as_str() {
        return Err(AuthError::VerbMismatch);
    }

    let resource = event.tag_value("x").map(str::to_owned);
    if verb.requires_resource() {
        match resource.as_deref() {
            None => return Err(AuthError::MissingResource(verb)),
            Some(x) if !is_lowercase_sha256(x) => return Err(AuthError::InvalidResource),
            Some(_) => {}
        }
    }

    Ok(Capability {
        pubkey: event.pubkey.clone(),
        verb,
        resource,
        server: event.tag_value("server").map(str::to_owned),
        expiration,
    })
}

/// Rule for uploads: the capability must commit to the body's hash.
///
/// Without this check a captured capability would authorize any payload of
/// the bearer's choosing for its whole window.
pub fn check_upload_commitment(capability: &Capability, body_hash: &str) -> Result<(), AuthError> {
    if capability.resource.as_deref() == Some(body_hash) {
        Ok(())
    } else {
        Err(AuthError::InvalidResource)
    }
}

/// Rule for deletes: the capability's resource must equal the URL hash.
pub fn check_delete_target(capability: &Capability, url_hash: &str) -> Result<(), AuthError> {
    if capability.resource.as_deref() == Some(url_hash) {
        Ok(())
    } else {
        Err(AuthError::DeleteMismatch)
    }
}

/// Rule for get/head: the capability must be bound to either the requested
/// resource or the serving host (pre-signed shareable URLs).
pub fn check_fetch_target(
    capability: &Capability,
    url_hash: &str,
    server_url: &str,
) -> Result<(), AuthError> {
    if !hash::is_sha256_hex(url_hash) {
        return Err(AuthError::InvalidHashParam);
    }
    if capability.resource.as_deref() == Some(url_hash)
        || capability.server.as_deref() == Some(server_url)
    {
        Ok(())
    } else {
        Err(AuthError::FetchMismatch)
    }
}

fn is_lowercase_sha256(s: &str) -> bool {
    s.len() == 64
        && s.bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
