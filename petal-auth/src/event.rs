use secp256k1::schnorr::Signature;
use secp256k1::{Message, Secp256k1, XOnlyPublicKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// The event class tag for blob-service capabilities.
pub const CAPABILITY_KIND: u32 = 24242;

/// A signed capability event as carried in the `Authorization` header.
///
/// Tags are arrays of strings; the ones this service recognizes are
/// `["expiration", "<unix>"]`, `["t", "<verb>"]`, `["x", "<hex-sha256>"]`,
/// and `["server", "<url>"]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub pubkey: String,
    pub created_at: i64,
    pub kind: u32,
    #[serde(default)]
    pub tags: Vec<Vec<String>>,
    #[serde(default)]
    pub content: String,
    pub sig: String,
}

impl Event {
    /// First value of the tag named `name`, if any.
    ///
    /// Only two-element tags count; a bare `["x"]` is treated as absent.
    pub fn tag_value(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|tag| tag.len() == 2 && tag[0] == name)
            .map(|tag| tag[1].as_str())
    }

    /// SHA-256 of the canonical serialization
    /// `[0, pubkey, created_at, kind, tags, content]`.
    ///
    /// The signature is always checked against this recomputed digest, never
    /// against the `id` field the client sent.
    pub fn canonical_id(&self) -> [u8; 32] {
        let serialized = serde_json::to_vec(&(
            0u8,
            &self.pubkey,
            self.created_at,
            self.kind,
            &self.tags,
            &self.content,
        ))
        .unwrap_or_default();
        Sha256::digest(&serialized).into()
    }

    /// Verify the BIP-340 Schnorr signature against the declared pubkey.
    pub fn verify_signature(&self) -> bool {
        let Ok(pubkey_bytes) = hex::decode(&self.pubkey) else {
            return false;
        };
        let Ok(pubkey) = XOnlyPublicKey::from_slice(&pubkey_bytes) else {
            return false;
        };
        let Ok(sig_bytes) = hex::decode(&self.sig) else {
            return false;
        };
        let Ok(sig) = Signature::from_slice(&sig_bytes) else {
            return false;
        };

        let msg = Message::from_digest(self.canonical_id());
        Secp256k1::verification_only()
            .verify_schnorr(&sig, &msg, &pubkey)
            .is_ok()
    }
}
