//! Core cryptographic primitives.
//!
//! Group arithmetic, hashing and randomness shared by the credential,
//! commitment and proof layers.

pub mod group;
pub mod hash;
pub mod rng;

// Re-export core types
pub use group::{PedersenGroup, SchnorrGroup};
pub use hash::{keyed_hash, sha256_hex, HexDigest};
pub use rng::ArenaRng;
