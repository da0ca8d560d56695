//! # RPS Arena Server
//!
//! Anonymous single-elimination tournament for rock-paper-scissors style
//! games. Players join with an unlinkable credential, vote on a game
//! variant, then play commit-reveal matches until one champion remains.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    RPS ARENA SERVER                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Shared primitives                         │
//! │  ├── group.rs    - Schnorr and Pedersen group parameters     │
//! │  ├── hash.rs     - SHA-256 and HMAC helpers                  │
//! │  └── rng.rs      - Seedable randomness source                │
//! │                                                              │
//! │  crypto/         - Credentials and commitments               │
//! │  ├── credential.rs - anonId derivation and issuance          │
//! │  ├── zkp.rs      - Schnorr proof of key knowledge            │
//! │  └── commitment.rs - hash and Pedersen commitments           │
//! │                                                              │
//! │  tournament/     - Game logic                                │
//! │  ├── voting.rs   - variant ballots                           │
//! │  ├── bracket.rs  - pairing and byes                          │
//! │  ├── engine.rs   - commit-reveal matches                     │
//! │  ├── ledger.rs   - victory proofs                            │
//! │  └── coordinator.rs - tournament state machine               │
//! │                                                              │
//! │  network/        - WebSocket transport                       │
//! │  ├── server.rs   - accept loop and connections               │
//! │  ├── protocol.rs - message types                             │
//! │  └── session.rs  - command dispatch and routing              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Anonymity
//!
//! The coordinator only ever stores `anonId = HMAC(secret, identity)`.
//! Transport identities stop at the credential issuer.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod core;
pub mod crypto;
pub mod error;
pub mod network;
pub mod tournament;

// Re-export commonly used types
pub use config::{ArenaConfig, ConfigError};
pub use core::rng::ArenaRng;
pub use crypto::{AnonId, Credential, CredentialIssuer, SchnorrProof, ZkpAuthenticator};
pub use error::{ArenaError, ArenaResult};
pub use tournament::{TournamentCoordinator, TournamentState, Variant};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
