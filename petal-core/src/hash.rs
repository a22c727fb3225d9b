//! Content-hash helpers shared by the auth layer and the handlers.

use sha2::{Digest, Sha256};

/// Whether `s` is a 64-character hex string (either case).
pub fn is_sha256_hex(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Strip a trailing file extension from a hash path parameter.
///
/// A suffix of `.` followed by 1–4 characters is removed when the remainder
/// is a valid 64-character hex hash; anything else is returned untouched.
pub fn strip_extension(param: &str) -> &str {
    if let Some(dot) = param.rfind('.')
        && param.len() - dot <= 5
        && is_sha256_hex(&param[..dot])
    {
        return &param[..dot];
    }
    param
}
