//! Mode Voting
//!
//! One commitment-backed ballot per participant for the rule variant.
//! Re-voting replaces the earlier ballot in place. Once the configured
//! threshold is reached the ballots are tallied by plurality.
//!
//! Ties go to the variant that first received a vote, scanning ballots in
//! the order they were first cast. No randomness is involved.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::hash::{digests_equal, keyed_hash, HexDigest};
use crate::core::rng::ArenaRng;
use crate::crypto::commitment::HashCommitment;
use crate::crypto::credential::AnonId;
use crate::error::{ArenaError, ArenaResult};
use crate::tournament::rules::Variant;

/// Bytes of randomness per vote nonce.
pub const VOTE_NONCE_BYTES: usize = 16;

/// When a tally is triggered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TallyPolicy {
    /// As soon as the number of voters reaches the quorum.
    Quorum,
    /// Quorum reached and every registered participant has voted.
    Unanimous,
}

impl TallyPolicy {
    /// Parse `quorum` / `unanimous`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "quorum" => Some(Self::Quorum),
            "unanimous" => Some(Self::Unanimous),
            _ => None,
        }
    }
}

/// A stored ballot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    /// Voter pseudonym.
    pub anon_id: AnonId,
    /// Chosen variant name.
    pub variant: String,
    /// Fresh per-ballot nonce.
    pub nonce: String,
    /// `KeyedHash(macKey, variant || nonce)`.
    pub tag: HexDigest,
    /// `Hash(variant || nonce)`.
    pub commitment: HashCommitment,
}

/// Result of submitting a ballot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VoteOutcome {
    /// Threshold not reached yet.
    Pending {
        /// Distinct voters so far.
        votes: usize,
        /// Required quorum.
        quorum: usize,
    },
    /// Threshold reached; the winning variant is locked in.
    Decided {
        /// Winning variant.
        variant: Variant,
        /// Distinct voters.
        votes: usize,
        /// Per-variant counts in first-vote order.
        counts: Vec<(String, usize)>,
    },
}

/// Collects ballots and decides the rule variant.
#[derive(Clone, Debug)]
pub struct ModeVotingService {
    variants: Vec<Variant>,
    quorum: usize,
    policy: TallyPolicy,
    /// Ballots in first-cast order.
    votes: Vec<Vote>,
}

impl ModeVotingService {
    /// Service over `variants` with the given threshold.
    pub fn new(variants: Vec<Variant>, quorum: usize, policy: TallyPolicy) -> Self {
        Self {
            variants,
            quorum,
            policy,
            votes: Vec::new(),
        }
    }

    /// Configured variants.
    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    /// Required quorum.
    pub fn quorum(&self) -> usize {
        self.quorum
    }

    /// Number of distinct voters.
    pub fn vote_count(&self) -> usize {
        self.votes.len()
    }

    /// Ballot cast by `anon_id`.
    pub fn vote_of(&self, anon_id: &AnonId) -> Option<&Vote> {
        self.votes.iter().find(|v| &v.anon_id == anon_id)
    }

    /// Record or replace the ballot of `anon_id`.
    ///
    /// `registered` is the current number of registered participants, used by
    /// [`TallyPolicy::Unanimous`].
    pub fn submit_vote(
        &mut self,
        anon_id: &AnonId,
        mac_key: &[u8],
        variant: &str,
        registered: usize,
        rng: &mut ArenaRng,
    ) -> ArenaResult<VoteOutcome> {
        if !self.variants.iter().any(|v| v.name == variant) {
            return Err(ArenaError::InvalidVote(variant.to_string()));
        }

        let nonce = rng.random_hex(VOTE_NONCE_BYTES);
        let vote = Vote {
            anon_id: anon_id.clone(),
            variant: variant.to_string(),
            tag: keyed_hash(mac_key, &[variant.as_bytes(), nonce.as_bytes()]),
            commitment: HashCommitment::commit(variant, &nonce),
            nonce,
        };

        match self.votes.iter_mut().find(|v| &v.anon_id == anon_id) {
            Some(existing) => *existing = vote,
            None => self.votes.push(vote),
        }

        let votes = self.votes.len();
        debug!("Vote from {} recorded ({}/{})", anon_id.short(), votes, self.quorum);

        if !self.threshold_reached(registered) {
            return Ok(VoteOutcome::Pending {
                votes,
                quorum: self.quorum,
            });
        }

        match self.tally() {
            Some((variant, counts)) => Ok(VoteOutcome::Decided {
                variant,
                votes,
                counts,
            }),
            None => Ok(VoteOutcome::Pending {
                votes,
                quorum: self.quorum,
            }),
        }
    }

    /// Whether the configured threshold is met.
    pub fn threshold_reached(&self, registered: usize) -> bool {
        let votes = self.votes.len();
        match self.policy {
            TallyPolicy::Quorum => votes >= self.quorum,
            TallyPolicy::Unanimous => votes >= self.quorum && votes == registered,
        }
    }

    /// Plurality winner and per-variant counts, `None` without ballots.
    pub fn tally(&self) -> Option<(Variant, Vec<(String, usize)>)> {
        let mut counts: Vec<(String, usize)> = Vec::new();
        for vote in &self.votes {
            match counts.iter_mut().find(|(name, _)| *name == vote.variant) {
                Some((_, count)) => *count += 1,
                None => counts.push((vote.variant.clone(), 1)),
            }
        }

        let mut winner: Option<&(String, usize)> = None;
        for entry in &counts {
            if winner.map_or(true, |best| entry.1 > best.1) {
                winner = Some(entry);
            }
        }

        let name = winner?.0.clone();
        let variant = self.variants.iter().find(|v| v.name == name)?.clone();
        Some((variant, counts))
    }

    /// Check a ballot's tag under the voter's MAC key.
    pub fn verify_vote(vote: &Vote, mac_key: &[u8]) -> bool {
        let expected = keyed_hash(mac_key, &[vote.variant.as_bytes(), vote.nonce.as_bytes()]);
        digests_equal(&expected, &vote.tag) && vote.commitment.open(&vote.variant, &vote.nonce)
    }

    /// Drop all ballots.
    pub fn clear(&mut self) {
        self.votes.clear();
    }
}
