//! Anonymous Credential Issuance
//!
//! The issuer maps each real identity to a pseudonymous [`AnonId`] with a keyed
//! hash under its secret, generates a discrete-log authentication keypair and
//! a per-participant MAC key, and tags `(anonId, publicKey)` so the credential
//! can later be checked by anyone holding the issuer secret.
//!
//! The identity itself is only a lookup key: records, logs and notifications
//! refer to participants by `AnonId`.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::group::SchnorrGroup;
use crate::core::hash::{digests_equal, keyed_hash, short, HexDigest};
use crate::core::rng::ArenaRng;
use crate::crypto::zkp::ZkpAuthenticator;
use crate::error::{ArenaError, ArenaResult};

/// Length of a participant MAC key in bytes.
pub const MAC_KEY_LEN: usize = 32;

// =============================================================================
// ANON ID
// =============================================================================

/// Stable pseudonym: hex HMAC-SHA256 of the identity under the issuer secret.
///
/// Implements Ord for deterministic BTreeMap ordering.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AnonId(String);

impl AnonId {
    /// Wrap an already derived pseudonym.
    pub fn new(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    /// Full hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Eight-character prefix for logs and previews.
    pub fn short(&self) -> &str {
        short(&self.0)
    }
}

impl fmt::Display for AnonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// CREDENTIAL
// =============================================================================

/// Public credential `{anonId, publicKey, tag}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Participant pseudonym.
    pub anon_id: AnonId,
    /// Authentication public key `G^secret mod P`.
    pub public_key: BigUint,
    /// `KeyedHash(issuerSecret, anonId || decimal(publicKey))`.
    pub tag: HexDigest,
}

impl Credential {
    /// Short preview shown to the participant at registration.
    pub fn preview(&self) -> String {
        format!("{}…/{}…", self.anon_id.short(), short(&self.tag))
    }
}

/// Discrete-log keypair used for proofs of knowledge.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthKeypair {
    secret: BigUint,
    /// Public key `G^secret mod P`.
    pub public_key: BigUint,
}

impl AuthKeypair {
    /// Fresh keypair with `secret` uniform in `[0, P-2]`.
    pub fn generate(rng: &mut ArenaRng) -> Self {
        let group = SchnorrGroup::standard();
        let secret = rng.below(&group.exponent_modulus());
        Self::from_secret(secret)
    }

    /// Keypair for a known secret.
    pub fn from_secret(secret: BigUint) -> Self {
        let public_key = ZkpAuthenticator::default().public_key(&secret);
        Self { secret, public_key }
    }

    /// The authentication secret.
    pub fn secret(&self) -> &BigUint {
        &self.secret
    }
}

impl fmt::Debug for AuthKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthKeypair")
            .field("secret", &"<redacted>")
            .field("public_key", &self.public_key)
            .finish()
    }
}

/// Registered participant record.
#[derive(Clone)]
pub struct Participant {
    /// Issued credential.
    pub credential: Credential,
    /// Authentication keypair.
    pub auth: AuthKeypair,
    /// Per-participant key for vote tags.
    pub mac_key: [u8; MAC_KEY_LEN],
    /// Cosmetic display label.
    pub alias: String,
    /// Registration time.
    pub registered_at: DateTime<Utc>,
}

impl Participant {
    /// Participant pseudonym.
    pub fn anon_id(&self) -> &AnonId {
        &self.credential.anon_id
    }
}

impl fmt::Debug for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Participant")
            .field("anon_id", &self.credential.anon_id)
            .field("alias", &self.alias)
            .field("registered_at", &self.registered_at)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// ISSUER
// =============================================================================

/// Issues and verifies credentials; owns the participant table.
pub struct CredentialIssuer {
    secret: Vec<u8>,
    /// identity -> participant. BTreeMap for deterministic iteration.
    participants: BTreeMap<String, Participant>,
}

impl CredentialIssuer {
    /// Issuer keyed with `secret`.
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
            participants: BTreeMap::new(),
        }
    }

    /// `anonId = KeyedHash(issuerSecret, identity)`.
    pub fn anon_id_for(&self, identity: &str) -> AnonId {
        AnonId(keyed_hash(&self.secret, &[identity.as_bytes()]))
    }

    /// Tag over `(anonId, publicKey)`.
    pub fn tag_for(&self, anon_id: &AnonId, public_key: &BigUint) -> HexDigest {
        let pk = public_key.to_str_radix(10);
        keyed_hash(&self.secret, &[anon_id.as_str().as_bytes(), pk.as_bytes()])
    }

    /// Register `identity` under `alias`.
    pub fn register(
        &mut self,
        identity: &str,
        alias: String,
        rng: &mut ArenaRng,
    ) -> ArenaResult<Credential> {
        if self.participants.contains_key(identity) {
            return Err(ArenaError::AlreadyRegistered);
        }

        let anon_id = self.anon_id_for(identity);
        let auth = AuthKeypair::generate(rng);
        let tag = self.tag_for(&anon_id, &auth.public_key);

        let mut mac_key = [0u8; MAC_KEY_LEN];
        rand::RngCore::fill_bytes(rng, &mut mac_key);

        let credential = Credential {
            anon_id,
            public_key: auth.public_key.clone(),
            tag,
        };

        debug!("Issued credential for {}", credential.anon_id.short());

        self.participants.insert(
            identity.to_string(),
            Participant {
                credential: credential.clone(),
                auth,
                mac_key,
                alias,
                registered_at: Utc::now(),
            },
        );

        Ok(credential)
    }

    /// Constant-time check of the credential tag under the current secret.
    pub fn verify_credential(&self, credential: &Credential) -> bool {
        let expected = self.tag_for(&credential.anon_id, &credential.public_key);
        digests_equal(&expected, &credential.tag)
    }

    /// Participant registered under `identity`.
    pub fn participant(&self, identity: &str) -> ArenaResult<&Participant> {
        self.participants.get(identity).ok_or(ArenaError::NotRegistered)
    }

    /// Mutable participant registered under `identity`.
    pub fn participant_mut(&mut self, identity: &str) -> ArenaResult<&mut Participant> {
        self.participants
            .get_mut(identity)
            .ok_or(ArenaError::NotRegistered)
    }

    /// Participant with pseudonym `anon_id`.
    pub fn by_anon_id(&self, anon_id: &AnonId) -> Option<&Participant> {
        self.participants.values().find(|p| p.anon_id() == anon_id)
    }

    /// All participants in identity order.
    pub fn participants(&self) -> impl Iterator<Item = &Participant> {
        self.participants.values()
    }

    /// Number of registered participants.
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    /// Whether nobody has registered.
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }
}

impl fmt::Debug for CredentialIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialIssuer")
            .field("participants", &self.participants.len())
            .finish_non_exhaustive()
    }
}
