//! Bracket Scheduling
//!
//! Single-elimination pairing. Each round:
//! 1. With an odd field, one participant drawn uniformly at random gets a bye
//!    and advances without playing.
//! 2. The rest are shuffled uniformly and paired consecutively.
//! 3. When every match is resolved, winners plus the bye holder form the next
//!    field. A field of one is the champion.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::rng::ArenaRng;
use crate::crypto::credential::AnonId;

/// An unordered pairing of two participants.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    /// First side.
    pub first: AnonId,
    /// Second side.
    pub second: AnonId,
}

impl Match {
    /// Whether `anon_id` plays in this match.
    pub fn contains(&self, anon_id: &AnonId) -> bool {
        &self.first == anon_id || &self.second == anon_id
    }

    /// The other side, if `anon_id` plays in this match.
    pub fn opponent_of(&self, anon_id: &AnonId) -> Option<&AnonId> {
        if &self.first == anon_id {
            Some(&self.second)
        } else if &self.second == anon_id {
            Some(&self.first)
        } else {
            None
        }
    }

    /// Both sides.
    pub fn sides(&self) -> [&AnonId; 2] {
        [&self.first, &self.second]
    }
}

/// Pairings for one round.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bracket {
    /// Round number, starting at 1.
    pub round: u32,
    /// Unresolved matches.
    pub matches: Vec<Match>,
    /// Participant sitting this round out.
    pub bye: Option<AnonId>,
    /// Winners of resolved matches, in resolution order.
    pub winners: Vec<AnonId>,
}

impl Bracket {
    /// Active match containing `anon_id`.
    pub fn match_of(&self, anon_id: &AnonId) -> Option<&Match> {
        self.matches.iter().find(|m| m.contains(anon_id))
    }

    /// Whether `anon_id` still has a match to play this round.
    pub fn is_active(&self, anon_id: &AnonId) -> bool {
        self.match_of(anon_id).is_some()
    }

    /// Remove the match containing `winner` and record the win.
    ///
    /// Returns the loser, or `None` if `winner` had no active match.
    pub fn resolve(&mut self, winner: &AnonId) -> Option<AnonId> {
        let index = self.matches.iter().position(|m| m.contains(winner))?;
        let resolved = self.matches.remove(index);
        let loser = resolved.opponent_of(winner)?.clone();
        self.winners.push(winner.clone());
        Some(loser)
    }

    /// Whether every match of the round is resolved.
    pub fn is_complete(&self) -> bool {
        self.matches.is_empty()
    }

    /// Field for the next round: winners, then the bye holder.
    pub fn advancing(&self) -> Vec<AnonId> {
        let mut field = self.winners.clone();
        if let Some(bye) = &self.bye {
            field.push(bye.clone());
        }
        field
    }
}

/// What follows a completed round.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RoundTransition {
    /// Another round with these pairings.
    Next(Bracket),
    /// A single participant remains.
    Champion(AnonId),
}

/// Builds and advances brackets.
#[derive(Clone, Copy, Debug, Default)]
pub struct BracketScheduler;

impl BracketScheduler {
    /// Pair `field` for `round`.
    pub fn build_bracket(round: u32, field: Vec<AnonId>, rng: &mut ArenaRng) -> Bracket {
        let mut field = dedup(field);

        let bye = if field.len() % 2 == 1 {
            rng.index(field.len()).map(|i| field.remove(i))
        } else {
            None
        };

        rng.shuffle(&mut field);

        let matches = field
            .chunks_exact(2)
            .map(|pair| Match {
                first: pair[0].clone(),
                second: pair[1].clone(),
            })
            .collect::<Vec<_>>();

        debug!(
            "Round {} bracket: {} matches{}",
            round,
            matches.len(),
            if bye.is_some() { ", 1 bye" } else { "" }
        );

        Bracket {
            round,
            matches,
            bye,
            winners: Vec::new(),
        }
    }

    /// Next round from a completed bracket.
    ///
    /// Returns `None` if the bracket has unresolved matches or nobody advanced.
    pub fn advance_round(bracket: &Bracket, rng: &mut ArenaRng) -> Option<RoundTransition> {
        if !bracket.is_complete() {
            return None;
        }
        let mut field = bracket.advancing();
        match field.len() {
            0 => None,
            1 => field.pop().map(RoundTransition::Champion),
            _ => Some(RoundTransition::Next(Self::build_bracket(
                bracket.round + 1,
                field,
                rng,
            ))),
        }
    }
}

/// Drop repeated ids, keeping first occurrences.
fn dedup(field: Vec<AnonId>) -> Vec<AnonId> {
    let mut seen = std::collections::BTreeSet::new();
    field.into_iter().filter(|id| seen.insert(id.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn field(n: usize) -> Vec<AnonId> {
        (0..n).map(|i| AnonId::new(format!("{:064x}", i))).collect()
    }

    fn covered(bracket: &Bracket) -> Vec<AnonId> {
        bracket
            .matches
            .iter()
            .flat_map(|m| [m.first.clone(), m.second.clone()])
            .collect()
    }

    #[test]
    fn test_even_field_pairs_everyone() {
        let mut rng = ArenaRng::seeded(1);
        let bracket = BracketScheduler::build_bracket(1, field(8), &mut rng);

        assert_eq!(bracket.matches.len(), 4);
        assert!(bracket.bye.is_none());
        let ids: BTreeSet<_> = covered(&bracket).into_iter().collect();
        assert_eq!(ids, field(8).into_iter().collect());
    }

    #[test]
    fn test_odd_field_gets_one_bye() {
        let mut rng = ArenaRng::seeded(2);
        let bracket = BracketScheduler::build_bracket(1, field(5), &mut rng);

        assert_eq!(bracket.matches.len(), 2);
        let bye = bracket.bye.clone().unwrap();
        assert!(!bracket.is_active(&bye));
        assert!(!covered(&bracket).contains(&bye));
    }

    #[test]
    fn test_duplicates_removed() {
        let mut rng = ArenaRng::seeded(3);
        let mut ids = field(4);
        ids.push(ids[0].clone());
        let bracket = BracketScheduler::build_bracket(1, ids, &mut rng);
        assert_eq!(bracket.matches.len(), 2);
        assert!(bracket.bye.is_none());
    }

    #[test]
    fn test_resolve_and_advance() {
        let mut rng = ArenaRng::seeded(4);
        let mut bracket = BracketScheduler::build_bracket(1, field(4), &mut rng);

        let first = bracket.matches[0].clone();
        let second = bracket.matches[1].clone();

        assert_eq!(bracket.resolve(&first.first), Some(first.second.clone()));
        assert!(BracketScheduler::advance_round(&bracket, &mut rng).is_none());
        assert_eq!(bracket.resolve(&second.second), Some(second.first.clone()));
        assert!(bracket.is_complete());

        match BracketScheduler::advance_round(&bracket, &mut rng) {
            Some(RoundTransition::Next(next)) => {
                assert_eq!(next.round, 2);
                assert_eq!(next.matches.len(), 1);
                assert!(next.matches[0].contains(&first.first));
                assert!(next.matches[0].contains(&second.second));
            }
            other => panic!("expected next round, got {:?}", other),
        }
    }

    #[test]
    fn test_bye_holder_advances() {
        let mut rng = ArenaRng::seeded(5);
        let mut bracket = BracketScheduler::build_bracket(1, field(3), &mut rng);
        let bye = bracket.bye.clone().unwrap();
        let winner = bracket.matches[0].first.clone();
        bracket.resolve(&winner);

        assert_eq!(bracket.advancing(), vec![winner, bye]);
    }

    #[test]
    fn test_last_one_standing_is_champion() {
        let mut rng = ArenaRng::seeded(6);
        let mut bracket = BracketScheduler::build_bracket(3, field(2), &mut rng);
        let winner = bracket.matches[0].second.clone();
        bracket.resolve(&winner);

        assert_eq!(
            BracketScheduler::advance_round(&bracket, &mut rng),
            Some(RoundTransition::Champion(winner))
        );
    }

    #[test]
    fn test_resolve_unknown_is_noop() {
        let mut rng = ArenaRng::seeded(7);
        let mut bracket = BracketScheduler::build_bracket(1, field(2), &mut rng);
        assert_eq!(bracket.resolve(&AnonId::new("ff")), None);
        assert_eq!(bracket.matches.len(), 1);
        assert!(bracket.winners.is_empty());
    }

    proptest! {
        #[test]
        fn prop_pairing_is_disjoint_cover(n in 0usize..40, seed in any::<u64>()) {
            let mut rng = ArenaRng::seeded(seed);
            let bracket = BracketScheduler::build_bracket(1, field(n), &mut rng);

            prop_assert_eq!(bracket.matches.len(), n / 2);
            prop_assert_eq!(bracket.bye.is_some(), n % 2 == 1);

            let mut all = covered(&bracket);
            all.extend(bracket.bye.clone());
            let unique: BTreeSet<_> = all.iter().cloned().collect();
            prop_assert_eq!(unique.len(), all.len());
            prop_assert_eq!(unique, field(n).into_iter().collect::<BTreeSet<_>>());
        }
    }
}
