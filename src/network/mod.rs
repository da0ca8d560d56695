//! Network Layer
//!
//! WebSocket transport for the tournament. Everything here is a thin shell
//! around [`crate::tournament::TournamentCoordinator`]; no game rules live
//! in this layer.

pub mod auth;
pub mod protocol;
pub mod server;
pub mod session;

pub use auth::{resolve_identity, AuthConfig, AuthError, MAX_IDENTITY_LEN};
pub use protocol::{AuthRequest, ClientMessage, ErrorCode, ServerError, ServerMessage};
pub use server::{ArenaServer, ServerConfig, ServerRunError};
pub use session::{ArenaSession, ConnectionId, SessionError};
