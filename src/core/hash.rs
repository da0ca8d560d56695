//! Hashing and Keyed Tags
//!
//! SHA-256 digests rendered as lowercase hex, HMAC-SHA256 keyed tags,
//! and constant-time comparison for anything secret-derived.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Hex-encoded SHA-256 digest (64 lowercase characters).
pub type HexDigest = String;

/// SHA-256 of the concatenation of `parts`, hex encoded.
pub fn sha256_hex(parts: &[&[u8]]) -> HexDigest {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hex::encode(hasher.finalize())
}

/// HMAC-SHA256 of the concatenation of `parts` under `key`, hex encoded.
pub fn keyed_hash(key: &[u8], parts: &[&[u8]]) -> HexDigest {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
        .unwrap_or_else(|_| unreachable!("hmac accepts keys of any length"));
    for part in parts {
        mac.update(part);
    }
    hex::encode(mac.finalize().into_bytes())
}

/// Compare two digests without short-circuiting on the first mismatch.
pub fn digests_equal(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Short prefix of an identifier for logs and previews.
#[inline]
pub fn short(id: &str) -> &str {
    let end = id.char_indices().nth(8).map(|(i, _)| i).unwrap_or(id.len());
    &id[..end]
}
