//! Tournament error taxonomy.
//!
//! Every variant is reported to the participant that triggered it and leaves
//! tournament state exactly as it was before the rejected action.

use thiserror::Error;

/// Errors returned by tournament operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArenaError {
    /// Identity already holds a credential.
    #[error("already registered")]
    AlreadyRegistered,

    /// Identity has no credential.
    #[error("not registered")]
    NotRegistered,

    /// Credential tag does not verify under the issuer secret.
    #[error("invalid credential")]
    InvalidCredential,

    /// Proof of knowledge of the authentication secret was rejected.
    #[error("authentication failed")]
    AuthenticationFailure,

    /// Vote for a variant outside the configured set.
    #[error("unknown rule variant: {0}")]
    InvalidVote(String),

    /// Votes are only accepted before a bracket is running.
    #[error("voting is closed")]
    VotingClosed,

    /// Free-text vote without a prior successful authentication.
    #[error("no ballot open, authenticate first")]
    BallotNotOpen,

    /// Move outside the selected variant's move set.
    #[error("invalid move: {0}")]
    InvalidMove(String),

    /// Participant has no active match (eliminated, bye, or no round).
    #[error("not in an active match")]
    NotInActiveMatch,

    /// Reveal without a committed move.
    #[error("no committed move to reveal")]
    NoPendingMove,

    /// Commit after revealing within the same attempt.
    #[error("move already revealed")]
    MoveAlreadyRevealed,

    /// `Hash(move || nonce)` does not equal the stored commitment.
    #[error("reveal does not match commitment")]
    CommitmentMismatch,

    /// Trophy claim before a champion has been decided.
    #[error("tournament is not finished")]
    TournamentNotFinished,

    /// Trophy claim without a single valid victory proof.
    #[error("no valid victory proof")]
    NoValidVictoryProof,

    /// Malformed command from the transport.
    #[error("invalid command: {0}")]
    InvalidCommand(String),
}

impl ArenaError {
    /// Stable machine-readable code for the wire protocol.
    pub fn code(&self) -> &'static str {
        match self {
            Self::AlreadyRegistered => "already_registered",
            Self::NotRegistered => "not_registered",
            Self::InvalidCredential => "invalid_credential",
            Self::AuthenticationFailure => "authentication_failure",
            Self::InvalidVote(_) => "invalid_vote",
            Self::VotingClosed => "voting_closed",
            Self::BallotNotOpen => "ballot_not_open",
            Self::InvalidMove(_) => "invalid_move",
            Self::NotInActiveMatch => "not_in_active_match",
            Self::NoPendingMove => "no_pending_move",
            Self::MoveAlreadyRevealed => "move_already_revealed",
            Self::CommitmentMismatch => "commitment_mismatch",
            Self::TournamentNotFinished => "tournament_not_finished",
            Self::NoValidVictoryProof => "no_valid_victory_proof",
            Self::InvalidCommand(_) => "invalid_command",
        }
    }
}

/// Result alias for tournament operations.
pub type ArenaResult<T> = Result<T, ArenaError>;
