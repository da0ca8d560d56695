//! Tournament notifications.
//!
//! The coordinator queues these for the transport, which routes them by
//! [`AnonId`]. They carry aliases, never real identities.

use serde::{Deserialize, Serialize};

use crate::crypto::credential::AnonId;

/// Who receives a notification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "to", content = "anon_id", rename_all = "snake_case")]
pub enum Recipient {
    /// One participant.
    Participant(AnonId),
    /// Every registered participant.
    All,
}

/// Something the participants should hear about.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    /// Votes so far are below the threshold.
    QuorumNotMet {
        /// Ballots cast.
        votes: usize,
        /// Ballots required.
        quorum: usize,
    },
    /// Voting finished and the rule variant is locked in.
    VariantSelected {
        /// Winning variant name.
        variant: String,
        /// Rule summary for the variant.
        rules: String,
        /// Vote count per variant.
        counts: Vec<(String, usize)>,
    },
    /// A round's bracket was built.
    RoundStarted {
        /// Round number, starting at 1.
        round: u32,
        /// Matches in the round, byes excluded.
        matches: usize,
    },
    /// Recipient was paired against `opponent`.
    MatchAnnounced {
        /// Round number.
        round: u32,
        /// Opponent's alias.
        opponent: String,
    },
    /// Recipient sits this round out and advances.
    Bye {
        /// Round number.
        round: u32,
    },
    /// Both sides of the recipient's match have committed.
    BothCommitted,
    /// Decisive match result.
    MatchResult {
        /// Winner's alias.
        winner: String,
        /// Move the winner revealed.
        winner_move: String,
        /// Loser's alias.
        loser: String,
        /// Move the loser revealed.
        loser_move: String,
    },
    /// Recipient lost and is out of the tournament.
    Eliminated,
    /// Mutually non-defeating moves; both sides must submit again.
    TieReplay {
        /// Recipient's move.
        your_move: String,
        /// Opponent's move.
        opponent_move: String,
    },
    /// Recipient won the tournament.
    Champion,
    /// The tournament has a winner.
    TournamentOver {
        /// Champion's alias.
        champion: String,
    },
    /// A trophy was granted and the tournament state was cleared.
    TournamentReset {
        /// Alias of the champion who claimed it.
        champion: String,
    },
}

/// A routed event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Target.
    pub recipient: Recipient,
    /// Payload.
    pub event: Event,
}

impl Notification {
    /// Event for a single participant.
    pub fn to(anon_id: &AnonId, event: Event) -> Self {
        Self {
            recipient: Recipient::Participant(anon_id.clone()),
            event,
        }
    }

    /// Event for everyone.
    pub fn broadcast(event: Event) -> Self {
        Self {
            recipient: Recipient::All,
            event,
        }
    }

    /// Whether `anon_id` should receive this notification.
    pub fn is_for(&self, anon_id: &AnonId) -> bool {
        match &self.recipient {
            Recipient::All => true,
            Recipient::Participant(target) => target == anon_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routing() {
        let a = AnonId::new("aa");
        let b = AnonId::new("bb");

        assert!(Notification::to(&a, Event::Eliminated).is_for(&a));
        assert!(!Notification::to(&a, Event::Eliminated).is_for(&b));
        assert!(Notification::broadcast(Event::BothCommitted).is_for(&b));
    }

    #[test]
    fn test_json_shape() {
        let n = Notification::to(&AnonId::new("aa"), Event::Bye { round: 2 });
        let json = serde_json::to_string(&n).unwrap();
        assert!(json.contains(r#""to":"participant""#));
        assert!(json.contains(r#""event":"bye""#));

        let back: Notification = serde_json::from_str(&json).unwrap();
        assert_eq!(back, n);
    }
}
