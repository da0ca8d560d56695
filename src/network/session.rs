//! Arena Session
//!
//! The shared handle every connection talks through. One `RwLock` around the
//! [`TournamentCoordinator`] serializes all commands, so "quorum reached" and
//! "both sides revealed" checks happen atomically with the mutation that
//! follows. Notifications drained under the lock are routed afterwards to the
//! connections bound to each recipient's anonId.

use std::collections::BTreeMap;

use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::crypto::credential::AnonId;
use crate::error::ArenaError;
use crate::network::protocol::{
    ClientMessage, ErrorCode, MoveCommitInfo, RegisteredInfo, RevealInfo, ServerError,
    ServerMessage, TrophyInfo, VoteProgress,
};
use crate::tournament::coordinator::{StatusReport, TournamentCoordinator};
use crate::tournament::engine::RevealOutcome;
use crate::tournament::events::{Notification, Recipient};
use crate::tournament::voting::VoteOutcome;

/// Unique connection identifier.
pub type ConnectionId = Uuid;

/// Session errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The client's outbound channel is closed.
    #[error("connection closed")]
    ConnectionClosed,
}

/// A bound connection.
#[derive(Debug)]
struct Connection {
    id: ConnectionId,
    sender: mpsc::Sender<ServerMessage>,
}

/// Serialized access to the tournament plus notification routing.
pub struct ArenaSession {
    coordinator: RwLock<TournamentCoordinator>,
    /// anonId -> live connection. A newer connection replaces an older one.
    connections: RwLock<BTreeMap<AnonId, Connection>>,
}

impl ArenaSession {
    /// Session around `coordinator`.
    pub fn new(coordinator: TournamentCoordinator) -> Self {
        Self {
            coordinator: RwLock::new(coordinator),
            connections: RwLock::new(BTreeMap::new()),
        }
    }

    /// Route notifications for `identity` to `sender`.
    pub async fn attach(
        &self,
        identity: &str,
        sender: mpsc::Sender<ServerMessage>,
    ) -> (ConnectionId, AnonId) {
        let anon_id = self.coordinator.read().await.issuer().anon_id_for(identity);
        let id = Uuid::new_v4();
        let previous = self
            .connections
            .write()
            .await
            .insert(anon_id.clone(), Connection { id, sender });
        if previous.is_some() {
            debug!("Connection for {} replaced", anon_id.short());
        }
        (id, anon_id)
    }

    /// Stop routing to connection `id`, unless a newer one took over.
    pub async fn detach(&self, anon_id: &AnonId, id: ConnectionId) -> bool {
        let mut connections = self.connections.write().await;
        match connections.get(anon_id) {
            Some(conn) if conn.id == id => {
                connections.remove(anon_id);
                true
            }
            _ => false,
        }
    }

    /// Number of bound connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Read-only tournament snapshot.
    pub async fn status(&self) -> StatusReport {
        self.coordinator.read().await.status()
    }

    /// Run `message` for `identity`, reply on `reply_to`, then route the
    /// resulting notifications.
    ///
    /// Notifications are routed even when the reply cannot be delivered; the
    /// command has already taken effect.
    pub async fn handle(
        &self,
        identity: &str,
        message: ClientMessage,
        reply_to: &mpsc::Sender<ServerMessage>,
    ) -> Result<(), SessionError> {
        let (reply, notifications) = self.execute(identity, message).await;
        let sent = reply_to.send(reply).await;
        self.dispatch(notifications).await;
        sent.map_err(|_| SessionError::ConnectionClosed)
    }

    /// Run `message` under the coordinator lock.
    pub async fn execute(
        &self,
        identity: &str,
        message: ClientMessage,
    ) -> (ServerMessage, Vec<Notification>) {
        let mut coordinator = self.coordinator.write().await;
        let reply = match apply(&mut coordinator, identity, message) {
            Ok(reply) => reply,
            Err(err) => {
                debug!("Command rejected: {}", err.code());
                ServerMessage::rejected(&err)
            }
        };
        (reply, coordinator.take_notifications())
    }

    /// Deliver notifications to bound connections.
    pub async fn dispatch(&self, notifications: Vec<Notification>) {
        if notifications.is_empty() {
            return;
        }
        let connections = self.connections.read().await;
        for note in notifications {
            match &note.recipient {
                Recipient::All => {
                    for (anon_id, conn) in connections.iter() {
                        deliver(anon_id, conn, ServerMessage::Notice(note.event.clone()));
                    }
                }
                Recipient::Participant(anon_id) => match connections.get(anon_id) {
                    Some(conn) => deliver(anon_id, conn, ServerMessage::Notice(note.event)),
                    None => debug!("No connection for {}, notice dropped", anon_id.short()),
                },
            }
        }
    }
}

fn deliver(anon_id: &AnonId, conn: &Connection, message: ServerMessage) {
    if let Err(e) = conn.sender.try_send(message) {
        warn!("Notice to {} not delivered: {}", anon_id.short(), e);
    }
}

/// Map one client command onto the coordinator.
fn apply(
    coordinator: &mut TournamentCoordinator,
    identity: &str,
    message: ClientMessage,
) -> Result<ServerMessage, ArenaError> {
    let reply = match message {
        ClientMessage::Register => {
            let registration = coordinator.register(identity)?;
            ServerMessage::Registered(RegisteredInfo {
                credential_preview: registration.credential.preview(),
                alias: registration.alias,
            })
        }
        ClientMessage::AuthenticateAndVote => ServerMessage::Ballot {
            variants: coordinator.authenticate_and_open_ballot(identity)?,
        },
        ClientMessage::Vote { choice } => {
            let quorum = coordinator.voting().quorum();
            let progress = match coordinator.vote(identity, &choice)? {
                VoteOutcome::Pending { votes, quorum } => VoteProgress {
                    votes,
                    quorum,
                    decided: None,
                },
                VoteOutcome::Decided { variant, votes, .. } => VoteProgress {
                    votes,
                    quorum,
                    decided: Some(variant.name),
                },
            };
            ServerMessage::VoteAccepted(progress)
        }
        ClientMessage::SubmitMove { mv } => {
            let receipt = coordinator.submit_move(identity, &mv)?;
            ServerMessage::MoveCommitted(MoveCommitInfo {
                mv: receipt.mv.to_string(),
                nonce: receipt.nonce,
                commitment: receipt.commitment.digest,
                both_committed: receipt.both_committed,
            })
        }
        ClientMessage::RevealMove { mv, nonce } => {
            let own = coordinator.issuer().anon_id_for(identity);
            let info = match coordinator.reveal_move(identity, &mv, &nonce)? {
                RevealOutcome::Waiting { .. } => RevealInfo::Waiting,
                RevealOutcome::Tie { .. } => RevealInfo::Tie,
                RevealOutcome::Decided(result) => RevealInfo::Decided {
                    won: result.winner == own,
                },
            };
            ServerMessage::MoveRevealed(info)
        }
        ClientMessage::Status => ServerMessage::Status(coordinator.status()),
        ClientMessage::ClaimTrophy => {
            let grant = coordinator.claim_trophy(identity)?;
            ServerMessage::TrophyGranted(TrophyInfo {
                valid_proofs: grant.valid_proofs,
                aggregate_verified: grant.aggregate.map(|a| a.verify()).unwrap_or(false),
            })
        }
        ClientMessage::SetAlias { alias } => ServerMessage::AliasChanged {
            alias: coordinator.set_alias(identity, &alias)?,
        },
        ClientMessage::Help => ServerMessage::Help {
            text: coordinator.help().to_string(),
        },
        ClientMessage::Text { text } => match ClientMessage::parse_text(&text)? {
            ClientMessage::Text { .. } => {
                return Err(ArenaError::InvalidCommand("nested text".into()))
            }
            parsed => return apply(coordinator, identity, parsed),
        },
        ClientMessage::Ping { timestamp } => ServerMessage::Pong {
            timestamp,
            server_time: chrono::Utc::now().timestamp_millis().max(0) as u64,
        },
        ClientMessage::Auth(_) => ServerMessage::Error(ServerError::new(
            ErrorCode::InvalidInput,
            "connection already bound to an identity",
        )),
    };
    Ok(reply)
}
