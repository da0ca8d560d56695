//! Victory Proof Ledger
//!
//! Every won match appends a Pedersen commitment to the value 1 under a fresh
//! blinding factor. A proof is valid when `PedersenCommit(1, r)` recomputes
//! to the stored commitment.
//!
//! Known limitation: a trophy claim succeeds with a single valid proof, not
//! one per round required to win the bracket.

use std::collections::BTreeMap;

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::group::PedersenGroup;
use crate::core::rng::ArenaRng;
use crate::crypto::commitment::PedersenCommitment;
use crate::crypto::credential::AnonId;
use crate::error::{ArenaError, ArenaResult};

/// Pedersen proof of one won match.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VictoryProof {
    /// `G2^1 * H2^r mod P2`.
    pub commitment: PedersenCommitment,
    /// Blinding factor `r`.
    pub blinding: BigUint,
}

impl VictoryProof {
    /// Whether the stored commitment opens to 1 under the stored blinding.
    pub fn is_valid(&self) -> bool {
        self.commitment.open(&BigUint::from(1u32), &self.blinding)
    }
}

/// Product of a participant's victory commitments.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateProof {
    /// Homomorphic sum of all commitments.
    pub commitment: PedersenCommitment,
    /// Sum of the blinding factors.
    pub blinding_sum: BigUint,
    /// Number of recorded wins.
    pub wins: usize,
}

impl AggregateProof {
    /// Whether the aggregate opens to `wins`.
    pub fn verify(&self) -> bool {
        self.commitment
            .open(&BigUint::from(self.wins), &self.blinding_sum)
    }
}

/// Per-participant victory proofs.
#[derive(Clone, Debug, Default)]
pub struct VictoryProofLedger {
    proofs: BTreeMap<AnonId, Vec<VictoryProof>>,
}

impl VictoryProofLedger {
    /// Empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fresh proof for `anon_id`.
    pub fn record_win(&mut self, anon_id: &AnonId, rng: &mut ArenaRng) -> VictoryProof {
        let blinding = rng.below(&PedersenGroup::standard().modulus);
        let proof = VictoryProof {
            commitment: PedersenCommitment::commit(&BigUint::from(1u32), &blinding),
            blinding,
        };
        let list = self.proofs.entry(anon_id.clone()).or_default();
        list.push(proof.clone());
        debug!("Victory proof #{} recorded for {}", list.len(), anon_id.short());
        proof
    }

    /// Proofs recorded for `anon_id`.
    pub fn proofs_of(&self, anon_id: &AnonId) -> &[VictoryProof] {
        self.proofs.get(anon_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Mutable proofs, for audits and tests that tamper with the record.
    pub fn proofs_of_mut(&mut self, anon_id: &AnonId) -> Option<&mut Vec<VictoryProof>> {
        self.proofs.get_mut(anon_id)
    }

    /// Number of proofs for `anon_id` that recompute correctly.
    pub fn valid_count(&self, anon_id: &AnonId) -> usize {
        self.proofs_of(anon_id).iter().filter(|p| p.is_valid()).count()
    }

    /// Check the claim of `anon_id`; at least one valid proof grants the trophy.
    ///
    /// Returns the number of valid proofs. Does not clear anything; the
    /// coordinator performs the reset.
    pub fn claim_trophy(&self, anon_id: &AnonId) -> ArenaResult<usize> {
        match self.valid_count(anon_id) {
            0 => Err(ArenaError::NoValidVictoryProof),
            valid => Ok(valid),
        }
    }

    /// Fold all proofs of `anon_id` into one commitment, `None` without proofs.
    pub fn aggregate(&self, anon_id: &AnonId) -> Option<AggregateProof> {
        let proofs = self.proofs_of(anon_id);
        if proofs.is_empty() {
            return None;
        }
        let commitment = proofs
            .iter()
            .fold(PedersenCommitment::identity(), |acc, p| acc.combine(&p.commitment));
        let blinding_sum = proofs
            .iter()
            .fold(BigUint::from(0u32), |acc, p| acc + &p.blinding);
        Some(AggregateProof {
            commitment,
            blinding_sum,
            wins: proofs.len(),
        })
    }

    /// Total proofs across all participants.
    pub fn len(&self) -> usize {
        self.proofs.values().map(Vec::len).sum()
    }

    /// Whether no proof has been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every proof.
    pub fn clear(&mut self) {
        self.proofs.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anon(tag: &str) -> AnonId {
        AnonId::new(tag.repeat(32))
    }

    #[test]
    fn test_record_and_claim() {
        let mut ledger = VictoryProofLedger::new();
        let mut rng = ArenaRng::seeded(1);
        let a = anon("a1");

        let proof = ledger.record_win(&a, &mut rng);
        assert!(proof.is_valid());
        assert_eq!(ledger.claim_trophy(&a), Ok(1));
    }

    #[test]
    fn test_claim_without_proofs_rejected() {
        let ledger = VictoryProofLedger::new();
        assert_eq!(
            ledger.claim_trophy(&anon("b2")),
            Err(ArenaError::NoValidVictoryProof)
        );
    }

    #[test]
    fn test_tampered_blinding_rejected() {
        let mut ledger = VictoryProofLedger::new();
        let mut rng = ArenaRng::seeded(2);
        let a = anon("a1");
        ledger.record_win(&a, &mut rng);

        ledger.proofs_of_mut(&a).unwrap()[0].blinding += 1u32;

        assert_eq!(ledger.valid_count(&a), 0);
        assert_eq!(ledger.claim_trophy(&a), Err(ArenaError::NoValidVictoryProof));
    }

    #[test]
    fn test_single_valid_proof_is_enough() {
        let mut ledger = VictoryProofLedger::new();
        let mut rng = ArenaRng::seeded(3);
        let a = anon("a1");
        ledger.record_win(&a, &mut rng);
        ledger.record_win(&a, &mut rng);

        ledger.proofs_of_mut(&a).unwrap()[1].blinding += 7u32;
        assert_eq!(ledger.claim_trophy(&a), Ok(1));
    }

    #[test]
    fn test_aggregate_opens_to_win_count() {
        let mut ledger = VictoryProofLedger::new();
        let mut rng = ArenaRng::seeded(4);
        let a = anon("a1");
        for _ in 0..3 {
            ledger.record_win(&a, &mut rng);
        }

        let aggregate = ledger.aggregate(&a).unwrap();
        assert_eq!(aggregate.wins, 3);
        assert!(aggregate.verify());

        let mut forged = aggregate;
        forged.wins = 4;
        assert!(!forged.verify());

        assert!(ledger.aggregate(&anon("b2")).is_none());
    }

    #[test]
    fn test_clear() {
        let mut ledger = VictoryProofLedger::new();
        let mut rng = ArenaRng::seeded(5);
        ledger.record_win(&anon("a1"), &mut rng);
        ledger.record_win(&anon("b2"), &mut rng);
        assert_eq!(ledger.len(), 2);

        ledger.clear();
        assert!(ledger.is_empty());
    }
}
