//! Commitment Codec
//!
//! Two commitment schemes:
//! - Hash commitments `SHA256(msg || nonce)` bind moves and votes until reveal.
//! - Pedersen commitments `G2^v * H2^r mod P2` back victory proofs and are
//!   additively homomorphic in `v`.

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::core::group::PedersenGroup;
use crate::core::hash::{digests_equal, sha256_hex, HexDigest};

// =============================================================================
// HASH COMMITMENT
// =============================================================================

/// Hiding, binding commitment to a string message.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HashCommitment {
    /// Hex digest of `msg || nonce`.
    pub digest: HexDigest,
}

impl HashCommitment {
    /// Commit to `msg` under `nonce`.
    pub fn commit(msg: &str, nonce: &str) -> Self {
        Self {
            digest: sha256_hex(&[msg.as_bytes(), nonce.as_bytes()]),
        }
    }

    /// Check that `(msg, nonce)` opens this commitment.
    pub fn open(&self, msg: &str, nonce: &str) -> bool {
        let recomputed = Self::commit(msg, nonce);
        digests_equal(&recomputed.digest, &self.digest)
    }

    /// First six hex characters, for user-facing previews.
    pub fn preview(&self) -> &str {
        &self.digest[..self.digest.len().min(6)]
    }
}

// =============================================================================
// PEDERSEN COMMITMENT
// =============================================================================

/// Pedersen commitment in the arena's Pedersen group.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PedersenCommitment {
    /// Group element `G2^v * H2^r mod P2`.
    pub point: BigUint,
}

impl PedersenCommitment {
    /// Commit to `value` with blinding factor `blinding`.
    pub fn commit(value: &BigUint, blinding: &BigUint) -> Self {
        Self {
            point: PedersenGroup::standard().commit(value, blinding),
        }
    }

    /// Recompute from `(value, blinding)` and compare.
    pub fn open(&self, value: &BigUint, blinding: &BigUint) -> bool {
        Self::commit(value, blinding) == *self
    }

    /// Homomorphic sum: commits to `v1 + v2` under `r1 + r2`.
    pub fn combine(&self, other: &Self) -> Self {
        Self {
            point: PedersenGroup::standard().mul(&self.point, &other.point),
        }
    }

    /// Commitment to zero with zero blinding, the identity for [`combine`](Self::combine).
    pub fn identity() -> Self {
        Self { point: BigUint::from(1u32) }
    }
}
