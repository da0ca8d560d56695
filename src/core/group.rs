//! Fixed Prime Groups
//!
//! Two multiplicative groups modulo large primes back all arena cryptography:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Schnorr group   P  = 2^256 - 2^32 - 977,  G  = 2           │
//! │                  auth keypairs, proofs of knowledge         │
//! │                                                             │
//! │  Pedersen group  P2 (257-bit),  G2 = 2,  H2 = 3             │
//! │                  homomorphic victory commitments            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Exponents for the Schnorr group are reduced modulo `P - 1`.

use std::sync::OnceLock;

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Big-endian bytes of `P = 2^256 - 2^32 - 977`.
const SCHNORR_MODULUS: [u8; 32] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xfe, 0xff, 0xff, 0xfc, 0x2f,
];

/// Schnorr generator.
const SCHNORR_GENERATOR: u32 = 2;

/// Big-endian bytes of
/// `P2 = 208351617316091241234326746312124448251235562226470491514186331217050270460481`.
const PEDERSEN_MODULUS: [u8; 33] = [
    0x01, 0xcc, 0xa2, 0xd6, 0x1c, 0x8b, 0x90, 0x93,
    0xf4, 0x73, 0xc1, 0xfa, 0x8e, 0x3c, 0x7c, 0x65,
    0x4a, 0x8a, 0x66, 0xb1, 0x62, 0x6d, 0xa7, 0x8d,
    0x23, 0x42, 0x92, 0x11, 0x7d, 0xd7, 0xd4, 0x6a,
    0x41,
];

/// Pedersen value generator.
const PEDERSEN_G: u32 = 2;

/// Pedersen blinding generator.
const PEDERSEN_H: u32 = 3;

// =============================================================================
// SCHNORR GROUP
// =============================================================================

/// Cyclic group `Z_P^*` generated by `G`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchnorrGroup {
    /// Prime modulus.
    pub modulus: BigUint,
    /// Generator.
    pub generator: BigUint,
}

impl SchnorrGroup {
    /// The arena's authentication group.
    pub fn standard() -> &'static SchnorrGroup {
        static GROUP: OnceLock<SchnorrGroup> = OnceLock::new();
        GROUP.get_or_init(|| SchnorrGroup {
            modulus: BigUint::from_bytes_be(&SCHNORR_MODULUS),
            generator: BigUint::from(SCHNORR_GENERATOR),
        })
    }

    /// Exponent modulus `P - 1`.
    pub fn exponent_modulus(&self) -> BigUint {
        &self.modulus - 1u32
    }

    /// `G^exponent mod P`.
    pub fn exp_generator(&self, exponent: &BigUint) -> BigUint {
        self.generator.modpow(exponent, &self.modulus)
    }

    /// `base^exponent mod P`.
    pub fn pow(&self, base: &BigUint, exponent: &BigUint) -> BigUint {
        base.modpow(exponent, &self.modulus)
    }

    /// `a * b mod P`.
    pub fn mul(&self, a: &BigUint, b: &BigUint) -> BigUint {
        (a * b) % &self.modulus
    }

    /// Hash the decimal rendering of `value` and reduce it into `[0, P)`.
    pub fn challenge_for(&self, value: &BigUint) -> BigUint {
        hash_to_int(value.to_str_radix(10).as_bytes()) % &self.modulus
    }
}

// =============================================================================
// PEDERSEN GROUP
// =============================================================================

/// Group `Z_P2^*` with two independent generators `G2`, `H2`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PedersenGroup {
    /// Modulus.
    pub modulus: BigUint,
    /// Value generator.
    pub g: BigUint,
    /// Blinding generator.
    pub h: BigUint,
}

impl PedersenGroup {
    /// The arena's victory-commitment group.
    pub fn standard() -> &'static PedersenGroup {
        static GROUP: OnceLock<PedersenGroup> = OnceLock::new();
        GROUP.get_or_init(|| PedersenGroup {
            modulus: BigUint::from_bytes_be(&PEDERSEN_MODULUS),
            g: BigUint::from(PEDERSEN_G),
            h: BigUint::from(PEDERSEN_H),
        })
    }

    /// `G2^value * H2^blinding mod P2`.
    pub fn commit(&self, value: &BigUint, blinding: &BigUint) -> BigUint {
        let gv = self.g.modpow(value, &self.modulus);
        let hr = self.h.modpow(blinding, &self.modulus);
        (gv * hr) % &self.modulus
    }

    /// `a * b mod P2`.
    pub fn mul(&self, a: &BigUint, b: &BigUint) -> BigUint {
        (a * b) % &self.modulus
    }
}

/// Interpret a SHA-256 digest of `data` as a big-endian integer.
pub fn hash_to_int(data: &[u8]) -> BigUint {
    let digest = Sha256::digest(data);
    BigUint::from_bytes_be(&digest)
}
