//! Protocol Messages
//!
//! Wire format between chat clients and the arena over WebSocket.
//! Messages are JSON for debugging ease; `to_bytes`/`from_bytes` offer
//! bincode for the flat request structs.
//!
//! Clients either send structured commands or a `text` message holding a
//! chat-style command line (`/submit_move rock`). Text that is not a command
//! is treated as a free-text ballot reply.

use serde::{Deserialize, Serialize};

use crate::error::ArenaError;
use crate::tournament::coordinator::StatusReport;
use crate::tournament::events::Event;

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Bind this connection to a transport identity.
    Auth(AuthRequest),

    /// Request an anonymous credential.
    Register,

    /// Prove the credential and open a ballot.
    AuthenticateAndVote,

    /// Ballot reply naming a variant.
    Vote {
        /// Variant name or ballot number.
        choice: String,
    },

    /// Commit to a move.
    SubmitMove {
        /// Move name.
        #[serde(rename = "move")]
        mv: String,
    },

    /// Open the commitment.
    RevealMove {
        /// Committed move.
        #[serde(rename = "move")]
        mv: String,
        /// Nonce returned at commit time.
        nonce: String,
    },

    /// Current bracket.
    Status,

    /// Redeem victory proofs.
    ClaimTrophy,

    /// Change display alias.
    SetAlias {
        /// Requested alias.
        alias: String,
    },

    /// Command listing.
    Help,

    /// Chat-style command line or free-text reply.
    Text {
        /// Raw line as typed.
        text: String,
    },

    /// Ping for latency measurement.
    Ping {
        /// Client timestamp, echoed back.
        timestamp: u64,
    },
}

/// Identity binding request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthRequest {
    /// Transport identity, used when JWT validation is not configured.
    #[serde(default)]
    pub identity: Option<String>,
    /// JWT whose `sub` claim is the identity.
    #[serde(default)]
    pub token: Option<String>,
}

impl ClientMessage {
    /// Parse a chat-style line.
    ///
    /// Lines starting with `/` are commands (dashes and underscores are
    /// interchangeable, so `/reveal-move` and `/reveal_move` match). Any other
    /// non-empty text becomes a [`ClientMessage::Vote`].
    pub fn parse_text(line: &str) -> Result<Self, ArenaError> {
        let line = line.trim();
        let Some(command_line) = line.strip_prefix('/') else {
            if line.is_empty() {
                return Err(ArenaError::InvalidCommand("empty message".into()));
            }
            return Ok(Self::Vote {
                choice: line.to_string(),
            });
        };

        let mut words = command_line.split_whitespace();
        let command = words.next().unwrap_or_default().replace('-', "_").to_ascii_lowercase();
        let args: Vec<&str> = words.collect();

        let message = match (command.as_str(), args.as_slice()) {
            ("register", []) => Self::Register,
            ("authenticate_and_vote", []) => Self::AuthenticateAndVote,
            ("vote", []) => return Err(usage("/vote <variant>")),
            ("vote", choice) => Self::Vote {
                choice: choice.join(" "),
            },
            ("submit_move", [mv]) => Self::SubmitMove { mv: mv.to_string() },
            ("submit_move", _) => return Err(usage("/submit_move <move>")),
            ("reveal_move", [mv, nonce]) => Self::RevealMove {
                mv: mv.to_string(),
                nonce: nonce.to_string(),
            },
            ("reveal_move", _) => return Err(usage("/reveal_move <move> <nonce>")),
            ("status", []) => Self::Status,
            ("claim_trophy", []) => Self::ClaimTrophy,
            ("set_alias", []) => return Err(usage("/set_alias <name>")),
            ("set_alias", name) => Self::SetAlias {
                alias: name.join(" "),
            },
            ("help" | "start", []) => Self::Help,
            (other, _) => {
                return Err(ArenaError::InvalidCommand(format!(
                    "unknown command /{}",
                    other
                )))
            }
        };
        Ok(message)
    }
}

fn usage(text: &str) -> ArenaError {
    ArenaError::InvalidCommand(format!("usage: {}", text))
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Identity binding result.
    AuthResult(AuthResult),

    /// Credential issued.
    Registered(RegisteredInfo),

    /// Ballot opened with these variants.
    Ballot {
        /// Candidate variant names, in ballot order.
        variants: Vec<String>,
    },

    /// Ballot accepted.
    VoteAccepted(VoteProgress),

    /// Move committed; keep the nonce to reveal.
    MoveCommitted(MoveCommitInfo),

    /// Reveal accepted.
    MoveRevealed(RevealInfo),

    /// Tournament snapshot.
    Status(StatusReport),

    /// Trophy granted; the tournament has been reset.
    TrophyGranted(TrophyInfo),

    /// Alias changed.
    AliasChanged {
        /// Alias now in effect.
        alias: String,
    },

    /// Command listing.
    Help {
        /// Help text.
        text: String,
    },

    /// Pushed tournament notification.
    Notice(Event),

    /// Pong response.
    Pong {
        /// Echoed client timestamp.
        timestamp: u64,
        /// Server time in milliseconds since the epoch.
        server_time: u64,
    },

    /// Error message.
    Error(ServerError),

    /// Server is shutting down.
    Shutdown {
        /// Why the server is going away.
        reason: String,
    },
}

/// Identity binding result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResult {
    /// Whether binding succeeded.
    pub success: bool,
    /// Connection identifier if successful.
    pub session_id: Option<String>,
    /// Error message if failed.
    pub error: Option<String>,
    /// Server version.
    pub server_version: String,
}

/// Truncated credential shown after registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredInfo {
    /// Short anonId / tag preview.
    pub credential_preview: String,
    /// Assigned alias.
    pub alias: String,
}

/// Vote acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteProgress {
    /// Ballots cast.
    pub votes: usize,
    /// Required quorum.
    pub quorum: usize,
    /// Selected variant once the tally ran.
    pub decided: Option<String>,
}

/// Commitment receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveCommitInfo {
    /// Normalized move.
    #[serde(rename = "move")]
    pub mv: String,
    /// Nonce to use when revealing.
    pub nonce: String,
    /// Hex commitment.
    pub commitment: String,
    /// Whether the opponent has committed too.
    pub both_committed: bool,
}

/// Reveal result as seen by the revealer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum RevealInfo {
    /// Waiting for the opponent's reveal.
    Waiting,
    /// Tie; submit a new move.
    Tie,
    /// Match decided.
    Decided {
        /// Whether the revealer won.
        won: bool,
    },
}

/// Trophy receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrophyInfo {
    /// Proofs that recomputed correctly.
    pub valid_proofs: usize,
    /// Whether the aggregate commitment opened to the number of wins.
    pub aggregate_verified: bool,
}

/// Server error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerError {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

/// Error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Identity binding failed.
    AuthFailed,
    /// Command before identity binding.
    NotAuthenticated,
    /// JWT token has expired.
    TokenExpired,
    /// Invalid JWT token (signature, format, claims).
    InvalidToken,
    /// Malformed message or command.
    InvalidInput,
    /// Tournament rule violation; see the message.
    Rejected,
    /// Internal error.
    InternalError,
}

impl ServerError {
    /// Error with `code` and `message`.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<&ArenaError> for ServerError {
    fn from(err: &ArenaError) -> Self {
        let code = match err {
            ArenaError::InvalidCommand(_) => ErrorCode::InvalidInput,
            ArenaError::InvalidCredential | ArenaError::AuthenticationFailure => {
                ErrorCode::AuthFailed
            }
            _ => ErrorCode::Rejected,
        };
        Self::new(code, format!("{}: {}", err.code(), err))
    }
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Error reply for a rejected tournament operation.
    pub fn rejected(err: &ArenaError) -> Self {
        Self::Error(ServerError::from(err))
    }
}

impl AuthRequest {
    /// Serialize to binary.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserialize from binary.
    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }
}
