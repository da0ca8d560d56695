//! Commit-Reveal Match Engine
//!
//! Runs every match of the current round. Per participant:
//!
//! ```text
//! NoMove --submit_move--> Committed --reveal--> Revealed
//!    ^                       |  ^                  |
//!    |                       +--+ (re-commit)      |
//!    +------------- tie replay / match resolved ---+
//! ```
//!
//! Only the hash commitment is meant to be observable before both sides have
//! committed; the clear move and nonce stay with the engine until adjudication.
//! When the last match of a round resolves, the engine asks the scheduler for
//! the next bracket and installs it, clearing all move state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::rng::ArenaRng;
use crate::crypto::commitment::HashCommitment;
use crate::crypto::credential::AnonId;
use crate::error::{ArenaError, ArenaResult};
use crate::tournament::bracket::{Bracket, BracketScheduler, RoundTransition};
use crate::tournament::ledger::{VictoryProof, VictoryProofLedger};
use crate::tournament::rules::{normalize_move, Move, Outcome, Variant};

/// Bytes of randomness per move nonce.
pub const MOVE_NONCE_BYTES: usize = 8;

// =============================================================================
// RECORDS
// =============================================================================

/// A committed, not yet adjudicated move.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingMove {
    /// Owner.
    pub anon_id: AnonId,
    /// `Hash(move || nonce)`.
    pub commitment: HashCommitment,
    /// Clear move, retained for adjudication.
    #[serde(skip_serializing)]
    pub mv: Move,
    /// Commitment nonce.
    #[serde(skip_serializing)]
    pub nonce: String,
}

/// A reveal that opened its commitment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reveal {
    /// Owner.
    pub anon_id: AnonId,
    /// Revealed move.
    pub mv: Move,
    /// Revealed nonce.
    pub nonce: String,
}

/// Where a participant stands in the current attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveState {
    /// Nothing submitted.
    NoMove,
    /// Commitment stored, awaiting reveal.
    Committed,
    /// Reveal accepted, awaiting the opponent.
    Revealed,
}

/// Returned to the participant after a successful commit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MoveReceipt {
    /// The commitment that was stored.
    pub commitment: HashCommitment,
    /// Nonce needed to reveal.
    pub nonce: String,
    /// Normalized move.
    pub mv: Move,
    /// Opponent in the active match.
    pub opponent: AnonId,
    /// Whether the opponent has committed too.
    pub both_committed: bool,
}

/// A decisive match.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchResult {
    /// Round the match belonged to.
    pub round: u32,
    /// Winning side.
    pub winner: AnonId,
    /// Winning move.
    pub winner_move: Move,
    /// Eliminated side.
    pub loser: AnonId,
    /// Losing move.
    pub loser_move: Move,
    /// Proof appended to the winner's ledger entry.
    pub proof: VictoryProof,
    /// Set when this result completed the round.
    pub transition: Option<RoundTransition>,
}

/// Outcome of an accepted reveal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RevealOutcome {
    /// Opponent has not revealed yet.
    Waiting {
        /// Opponent in the match.
        opponent: AnonId,
    },
    /// Neither move defeats the other; both sides were reset.
    Tie {
        /// Opponent in the match.
        opponent: AnonId,
        /// Revealer's move.
        mv: Move,
        /// Opponent's move.
        opponent_move: Move,
    },
    /// The match was decided.
    Decided(MatchResult),
}

// =============================================================================
// ENGINE
// =============================================================================

/// Commit-reveal state for one round under one variant.
#[derive(Clone, Debug)]
pub struct CommitRevealMatchEngine {
    variant: Variant,
    bracket: Bracket,
    pending: BTreeMap<AnonId, PendingMove>,
    reveals: BTreeMap<AnonId, Reveal>,
}

impl CommitRevealMatchEngine {
    /// Engine playing `bracket` under `variant`.
    pub fn new(variant: Variant, bracket: Bracket) -> Self {
        Self {
            variant,
            bracket,
            pending: BTreeMap::new(),
            reveals: BTreeMap::new(),
        }
    }

    /// Selected rule variant.
    pub fn variant(&self) -> &Variant {
        &self.variant
    }

    /// Current bracket.
    pub fn bracket(&self) -> &Bracket {
        &self.bracket
    }

    /// Install the next round's bracket, dropping all move state.
    pub fn start_round(&mut self, bracket: Bracket) {
        self.bracket = bracket;
        self.pending.clear();
        self.reveals.clear();
    }

    /// Commit-reveal state of `anon_id`.
    pub fn move_state(&self, anon_id: &AnonId) -> MoveState {
        if self.reveals.contains_key(anon_id) {
            MoveState::Revealed
        } else if self.pending.contains_key(anon_id) {
            MoveState::Committed
        } else {
            MoveState::NoMove
        }
    }

    /// Stored commitment of `anon_id`.
    pub fn pending_move(&self, anon_id: &AnonId) -> Option<&PendingMove> {
        self.pending.get(anon_id)
    }

    /// Commit to `raw` under a fresh nonce.
    pub fn submit_move(
        &mut self,
        anon_id: &AnonId,
        raw: &str,
        rng: &mut ArenaRng,
    ) -> ArenaResult<MoveReceipt> {
        let nonce = rng.random_hex(MOVE_NONCE_BYTES);
        self.commit_move(anon_id, raw, &nonce)
    }

    /// Commit to `raw` under a caller-chosen nonce.
    ///
    /// Re-committing before revealing replaces the earlier commitment.
    pub fn commit_move(
        &mut self,
        anon_id: &AnonId,
        raw: &str,
        nonce: &str,
    ) -> ArenaResult<MoveReceipt> {
        let mv = self.variant.parse_move(raw)?;
        let opponent = self.opponent_of(anon_id)?;
        if self.reveals.contains_key(anon_id) {
            return Err(ArenaError::MoveAlreadyRevealed);
        }
        let nonce = nonce.trim();

        let commitment = HashCommitment::commit(mv.as_str(), nonce);
        self.pending.insert(
            anon_id.clone(),
            PendingMove {
                anon_id: anon_id.clone(),
                commitment: commitment.clone(),
                mv: mv.clone(),
                nonce: nonce.to_string(),
            },
        );

        let both_committed = self.pending.contains_key(&opponent);
        debug!(
            "{} committed {}{}",
            anon_id.short(),
            commitment.preview(),
            if both_committed { " (both sides in)" } else { "" }
        );

        Ok(MoveReceipt {
            commitment,
            nonce: nonce.to_string(),
            mv,
            opponent,
            both_committed,
        })
    }

    /// Open the stored commitment and adjudicate once both sides revealed.
    pub fn reveal(
        &mut self,
        anon_id: &AnonId,
        raw: &str,
        nonce: &str,
        ledger: &mut VictoryProofLedger,
        rng: &mut ArenaRng,
    ) -> ArenaResult<RevealOutcome> {
        let opponent = self.opponent_of(anon_id)?;
        if self.reveals.contains_key(anon_id) {
            return Err(ArenaError::MoveAlreadyRevealed);
        }
        let pending = self.pending.get(anon_id).ok_or(ArenaError::NoPendingMove)?;

        let normalized = normalize_move(raw);
        let nonce = nonce.trim();
        if !pending.commitment.open(&normalized, nonce) {
            return Err(ArenaError::CommitmentMismatch);
        }

        let mv = pending.mv.clone();
        self.reveals.insert(
            anon_id.clone(),
            Reveal {
                anon_id: anon_id.clone(),
                mv: mv.clone(),
                nonce: nonce.to_string(),
            },
        );

        let opponent_move = match self.reveals.get(&opponent) {
            Some(reveal) => reveal.mv.clone(),
            None => return Ok(RevealOutcome::Waiting { opponent }),
        };

        let (winner, winner_move, loser_move) = match self.variant.adjudicate(&mv, &opponent_move) {
            Outcome::FirstWins => (anon_id.clone(), mv, opponent_move),
            Outcome::SecondWins => (opponent.clone(), opponent_move, mv),
            Outcome::Tie => {
                self.clear_sides(anon_id, &opponent);
                debug!("Tie {} vs {}, replay", anon_id.short(), opponent.short());
                return Ok(RevealOutcome::Tie {
                    opponent,
                    mv,
                    opponent_move,
                });
            }
        };

        let round = self.bracket.round;
        let loser = self
            .bracket
            .resolve(&winner)
            .ok_or(ArenaError::NotInActiveMatch)?;
        let proof = ledger.record_win(&winner, rng);
        self.clear_sides(&winner, &loser);

        info!(
            "Round {}: {} ({}) beat {} ({})",
            round,
            winner.short(),
            winner_move,
            loser.short(),
            loser_move
        );

        let transition = BracketScheduler::advance_round(&self.bracket, rng);
        if let Some(RoundTransition::Next(next)) = &transition {
            self.start_round(next.clone());
        }

        Ok(RevealOutcome::Decided(MatchResult {
            round,
            winner,
            winner_move,
            loser,
            loser_move,
            proof,
            transition,
        }))
    }

    fn opponent_of(&self, anon_id: &AnonId) -> ArenaResult<AnonId> {
        self.bracket
            .match_of(anon_id)
            .and_then(|m| m.opponent_of(anon_id))
            .cloned()
            .ok_or(ArenaError::NotInActiveMatch)
    }

    fn clear_sides(&mut self, a: &AnonId, b: &AnonId) {
        for side in [a, b] {
            self.pending.remove(side);
            self.reveals.remove(side);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tournament::bracket::Match;
    use crate::tournament::rules::{builtin_variants, FIRE_WELL};

    fn anon(tag: &str) -> AnonId {
        AnonId::new(tag.repeat(32))
    }

    fn fire_well() -> Variant {
        builtin_variants()
            .into_iter()
            .find(|v| v.name == FIRE_WELL)
            .unwrap()
    }

    fn single_match(a: &AnonId, b: &AnonId) -> Bracket {
        Bracket {
            round: 1,
            matches: vec![Match {
                first: a.clone(),
                second: b.clone(),
            }],
            bye: None,
            winners: Vec::new(),
        }
    }

    fn two_matches(ids: &[AnonId; 4]) -> Bracket {
        Bracket {
            round: 1,
            matches: vec![
                Match {
                    first: ids[0].clone(),
                    second: ids[1].clone(),
                },
                Match {
                    first: ids[2].clone(),
                    second: ids[3].clone(),
                },
            ],
            bye: None,
            winners: Vec::new(),
        }
    }

    #[test]
    fn test_rock_beats_scissors_scenario() {
        let (a, b) = (anon("a1"), anon("b2"));
        let mut engine = CommitRevealMatchEngine::new(fire_well(), two_matches(&[
            a.clone(),
            b.clone(),
            anon("c3"),
            anon("d4"),
        ]));
        let mut ledger = VictoryProofLedger::new();
        let mut rng = ArenaRng::seeded(1);

        let receipt = engine.commit_move(&a, "Rock", "n1").unwrap();
        assert_eq!(
            receipt.commitment.digest,
            "e3726bab8c1317d1139b899687af6afe2935fea2b217ff6755ec60735bb36a2a"
        );
        assert!(!receipt.both_committed);
        assert!(engine.commit_move(&b, "Scissors", "n2").unwrap().both_committed);

        let first = engine.reveal(&a, "Rock", "n1", &mut ledger, &mut rng).unwrap();
        assert_eq!(first, RevealOutcome::Waiting { opponent: b.clone() });

        match engine.reveal(&b, "Scissors", "n2", &mut ledger, &mut rng).unwrap() {
            RevealOutcome::Decided(result) => {
                assert_eq!(result.winner, a);
                assert_eq!(result.loser, b);
                assert_eq!(result.winner_move.as_str(), "Rock");
                assert!(result.proof.is_valid());
                assert!(result.transition.is_none());
            }
            other => panic!("expected decision, got {:?}", other),
        }

        assert_eq!(ledger.proofs_of(&a).len(), 1);
        assert!(ledger.proofs_of(&b).is_empty());
        assert_eq!(engine.bracket().matches.len(), 1);
        assert!(!engine.bracket().is_active(&a));
        assert_eq!(
            engine.submit_move(&b, "Rock", &mut rng),
            Err(ArenaError::NotInActiveMatch)
        );
    }

    #[test]
    fn test_padded_nonce_commits_and_reveals_trimmed() {
        let (a, b) = (anon("a1"), anon("b2"));
        let mut engine = CommitRevealMatchEngine::new(fire_well(), single_match(&a, &b));
        let mut ledger = VictoryProofLedger::new();
        let mut rng = ArenaRng::seeded(9);

        let receipt = engine.commit_move(&a, "Rock", "  n1 ").unwrap();
        assert_eq!(receipt.nonce, "n1");
        assert_eq!(receipt.commitment, HashCommitment::commit("Rock", "n1"));
        assert_eq!(engine.pending_move(&a).unwrap().nonce, "n1");

        assert_eq!(
            engine.reveal(&a, "Rock", " n1\t", &mut ledger, &mut rng),
            Ok(RevealOutcome::Waiting { opponent: b })
        );
    }

    #[test]
    fn test_tie_forces_fresh_commit() {
        let (a, b) = (anon("a1"), anon("b2"));
        let mut engine = CommitRevealMatchEngine::new(fire_well(), single_match(&a, &b));
        let mut ledger = VictoryProofLedger::new();
        let mut rng = ArenaRng::seeded(2);

        let ra = engine.submit_move(&a, "paper", &mut rng).unwrap();
        let rb = engine.submit_move(&b, "PAPER", &mut rng).unwrap();
        assert_eq!(ra.nonce.len(), 2 * MOVE_NONCE_BYTES);

        engine.reveal(&a, "Paper", &ra.nonce, &mut ledger, &mut rng).unwrap();
        let outcome = engine.reveal(&b, "Paper", &rb.nonce, &mut ledger, &mut rng).unwrap();
        assert!(matches!(outcome, RevealOutcome::Tie { .. }));

        assert_eq!(engine.bracket().matches.len(), 1);
        assert_eq!(engine.move_state(&a), MoveState::NoMove);
        assert_eq!(engine.move_state(&b), MoveState::NoMove);
        assert_eq!(
            engine.reveal(&a, "Paper", &ra.nonce, &mut ledger, &mut rng),
            Err(ArenaError::NoPendingMove)
        );

        let ra = engine.submit_move(&a, "Well", &mut rng).unwrap();
        assert_eq!(
            engine.reveal(&a, "Well", &ra.nonce, &mut ledger, &mut rng),
            Ok(RevealOutcome::Waiting { opponent: b })
        );
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_reveal_mismatch_keeps_state() {
        let (a, b) = (anon("a1"), anon("b2"));
        let mut engine = CommitRevealMatchEngine::new(fire_well(), single_match(&a, &b));
        let mut ledger = VictoryProofLedger::new();
        let mut rng = ArenaRng::seeded(3);

        engine.commit_move(&a, "Rock", "n1").unwrap();
        assert_eq!(
            engine.reveal(&a, "Paper", "n1", &mut ledger, &mut rng),
            Err(ArenaError::CommitmentMismatch)
        );
        assert_eq!(
            engine.reveal(&a, "Rock", "n9", &mut ledger, &mut rng),
            Err(ArenaError::CommitmentMismatch)
        );
        assert_eq!(engine.move_state(&a), MoveState::Committed);

        assert!(engine.reveal(&a, "rock", "n1", &mut ledger, &mut rng).is_ok());
        assert_eq!(engine.move_state(&a), MoveState::Revealed);
    }

    #[test]
    fn test_invalid_and_out_of_match() {
        let (a, b) = (anon("a1"), anon("b2"));
        let mut engine = CommitRevealMatchEngine::new(fire_well(), single_match(&a, &b));
        let mut ledger = VictoryProofLedger::new();
        let mut rng = ArenaRng::seeded(4);

        assert_eq!(
            engine.submit_move(&a, "Spock", &mut rng),
            Err(ArenaError::InvalidMove("Spock".into()))
        );
        assert_eq!(
            engine.submit_move(&anon("c3"), "Rock", &mut rng),
            Err(ArenaError::NotInActiveMatch)
        );
        assert_eq!(
            engine.reveal(&b, "Rock", "n1", &mut ledger, &mut rng),
            Err(ArenaError::NoPendingMove)
        );
    }

    #[test]
    fn test_recommit_rules() {
        let (a, b) = (anon("a1"), anon("b2"));
        let mut engine = CommitRevealMatchEngine::new(fire_well(), single_match(&a, &b));
        let mut ledger = VictoryProofLedger::new();
        let mut rng = ArenaRng::seeded(5);

        engine.commit_move(&a, "Rock", "n1").unwrap();
        engine.commit_move(&a, "Fire", "n2").unwrap();
        assert_eq!(engine.pending_move(&a).unwrap().mv.as_str(), "Fire");

        engine.reveal(&a, "Fire", "n2", &mut ledger, &mut rng).unwrap();
        assert_eq!(
            engine.commit_move(&a, "Well", "n3"),
            Err(ArenaError::MoveAlreadyRevealed)
        );
        assert_eq!(
            engine.reveal(&a, "Fire", "n2", &mut ledger, &mut rng),
            Err(ArenaError::MoveAlreadyRevealed)
        );
    }

    #[test]
    fn test_final_match_crowns_champion() {
        let (a, b) = (anon("a1"), anon("b2"));
        let mut engine = CommitRevealMatchEngine::new(fire_well(), single_match(&a, &b));
        let mut ledger = VictoryProofLedger::new();
        let mut rng = ArenaRng::seeded(6);

        engine.commit_move(&a, "Rock", "x").unwrap();
        engine.commit_move(&b, "Well", "y").unwrap();
        engine.reveal(&a, "Rock", "x", &mut ledger, &mut rng).unwrap();

        match engine.reveal(&b, "Well", "y", &mut ledger, &mut rng).unwrap() {
            RevealOutcome::Decided(result) => {
                assert_eq!(result.winner, b);
                assert_eq!(result.transition, Some(RoundTransition::Champion(b.clone())));
            }
            other => panic!("expected decision, got {:?}", other),
        }
        assert!(engine.bracket().is_complete());
    }

    #[test]
    fn test_round_completion_installs_next_bracket() {
        let ids = [anon("a1"), anon("b2"), anon("c3"), anon("d4")];
        let mut engine = CommitRevealMatchEngine::new(fire_well(), two_matches(&ids));
        let mut ledger = VictoryProofLedger::new();
        let mut rng = ArenaRng::seeded(7);

        // a1 beats b2, c3 beats d4
        for (winner, loser) in [(&ids[0], &ids[1]), (&ids[2], &ids[3])] {
            engine.commit_move(winner, "Paper", "w").unwrap();
            engine.commit_move(loser, "Rock", "l").unwrap();
            engine.reveal(winner, "Paper", "w", &mut ledger, &mut rng).unwrap();
            engine.reveal(loser, "Rock", "l", &mut ledger, &mut rng).unwrap();
        }

        let bracket = engine.bracket();
        assert_eq!(bracket.round, 2);
        assert_eq!(bracket.matches.len(), 1);
        assert!(bracket.is_active(&ids[0]));
        assert!(bracket.is_active(&ids[2]));
        assert_eq!(engine.move_state(&ids[0]), MoveState::NoMove);
    }
}
