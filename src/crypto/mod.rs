//! Credential and Commitment Layer
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    CRYPTO                                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  credential.rs  - anonId derivation, keypairs, tagged creds │
//! │  zkp.rs         - Fiat-Shamir Schnorr proof of knowledge    │
//! │  commitment.rs  - hash and Pedersen commitments             │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod commitment;
pub mod credential;
pub mod zkp;

// Re-export key types
pub use commitment::{HashCommitment, PedersenCommitment};
pub use credential::{AnonId, AuthKeypair, Credential, CredentialIssuer, Participant};
pub use zkp::{SchnorrProof, ZkpAuthenticator};
