//! Schnorr Proof of Knowledge
//!
//! Non-interactive (Fiat-Shamir) proof of knowledge of `x` with `y = G^x mod P`:
//!
//! ```text
//! prove(x):   r <- [0, P-2]
//!             t  = G^r mod P
//!             c  = SHA256(decimal(t)) mod P
//!             s  = (r + c*x) mod (P-1)
//!
//! verify:     G^s == t * y^c  (mod P)
//! ```
//!
//! ## Known limitation
//!
//! The challenge hashes `t` alone. It binds neither the public key nor any
//! session context, so a proof observed once verifies again for the same key
//! and carries no freshness. Authentication in this crate is therefore only as
//! strong as the channel that delivers the proof.

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::core::group::SchnorrGroup;
use crate::core::rng::ArenaRng;

/// Non-interactive Schnorr proof `(t, s)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchnorrProof {
    /// Prover commitment `t = G^r mod P`.
    pub commitment: BigUint,
    /// Response `s = (r + c*x) mod (P-1)`.
    pub response: BigUint,
}

/// Produces and checks [`SchnorrProof`]s over a fixed group.
#[derive(Clone, Copy, Debug)]
pub struct ZkpAuthenticator {
    group: &'static SchnorrGroup,
}

impl Default for ZkpAuthenticator {
    fn default() -> Self {
        Self::new(SchnorrGroup::standard())
    }
}

impl ZkpAuthenticator {
    /// Authenticator over `group`.
    pub fn new(group: &'static SchnorrGroup) -> Self {
        Self { group }
    }

    /// Public key for `secret`.
    pub fn public_key(&self, secret: &BigUint) -> BigUint {
        self.group.exp_generator(secret)
    }

    /// Prove knowledge of `secret`.
    pub fn prove(&self, secret: &BigUint, rng: &mut ArenaRng) -> SchnorrProof {
        let order = self.group.exponent_modulus();
        let r = rng.below(&order);
        let t = self.group.exp_generator(&r);
        let c = self.group.challenge_for(&t);
        let s = (r + c * secret) % &order;

        SchnorrProof {
            commitment: t,
            response: s,
        }
    }

    /// Check `proof` against `public_key`.
    pub fn verify(&self, proof: &SchnorrProof, public_key: &BigUint) -> bool {
        if proof.commitment >= self.group.modulus || *public_key >= self.group.modulus {
            return false;
        }
        let c = self.group.challenge_for(&proof.commitment);
        let left = self.group.exp_generator(&proof.response);
        let right = self
            .group
            .mul(&proof.commitment, &self.group.pow(public_key, &c));
        left == right
    }
}
