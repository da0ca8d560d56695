//! Tournament Engine
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    TOURNAMENT                               │
//! ├─────────────────────────────────────────────────────────────┤
//! │  rules.rs        - variants, moves, defeat tables           │
//! │  voting.rs       - commitment-backed variant ballots        │
//! │  bracket.rs      - single-elimination pairing with byes     │
//! │  engine.rs       - commit-reveal match play                 │
//! │  ledger.rs       - Pedersen victory proofs                  │
//! │  events.rs       - notifications for the transport          │
//! │  coordinator.rs  - the top-level state machine              │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod bracket;
pub mod coordinator;
pub mod engine;
pub mod events;
pub mod ledger;
pub mod rules;
pub mod voting;

pub use bracket::{Bracket, BracketScheduler, Match, RoundTransition};
pub use coordinator::{Registration, StatusReport, TournamentCoordinator, TournamentState, TrophyGrant};
pub use engine::{CommitRevealMatchEngine, MatchResult, MoveReceipt, MoveState, RevealOutcome};
pub use events::{Event, Notification, Recipient};
pub use ledger::{AggregateProof, VictoryProof, VictoryProofLedger};
pub use rules::{builtin_variants, Move, Outcome, Variant};
pub use voting::{ModeVotingService, TallyPolicy, Vote, VoteOutcome};
