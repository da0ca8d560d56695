//! WebSocket Arena Server
//!
//! Async WebSocket front end. Each connection first binds an identity with an
//! `auth` message, then sends tournament commands. Replies go back on the
//! same socket; notifications are pushed by the [`ArenaSession`].

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, instrument, warn};

use crate::config::ArenaConfig;
use crate::core::rng::ArenaRng;
use crate::crypto::credential::AnonId;
use crate::network::auth::{resolve_identity, AuthConfig};
use crate::network::protocol::{AuthResult, ClientMessage, ErrorCode, ServerError, ServerMessage};
use crate::network::session::{ArenaSession, ConnectionId};
use crate::tournament::coordinator::TournamentCoordinator;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: String,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Outbound queue length per connection.
    pub channel_capacity: usize,
    /// Transport identity validation.
    pub auth: AuthConfig,
    /// Server version string.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: crate::config::DEFAULT_BIND_ADDR.to_string(),
            max_connections: 1000,
            channel_capacity: 64,
            auth: AuthConfig::default(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl ServerConfig {
    /// Transport settings from the arena configuration.
    pub fn from_arena(config: &ArenaConfig) -> Self {
        Self {
            bind_addr: config.bind_addr.clone(),
            auth: config.auth.clone(),
            ..Default::default()
        }
    }
}

/// Server errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerRunError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Per-connection state shared by the read loop.
struct ClientContext {
    addr: SocketAddr,
    sender: mpsc::Sender<ServerMessage>,
    /// Set after a successful `auth`.
    bound: Option<BoundIdentity>,
}

struct BoundIdentity {
    identity: String,
    anon_id: AnonId,
    connection: ConnectionId,
}

/// The arena server.
pub struct ArenaServer {
    config: ServerConfig,
    session: Arc<ArenaSession>,
    connections: Arc<AtomicUsize>,
    shutdown_tx: broadcast::Sender<()>,
}

impl ArenaServer {
    /// Server around an existing session.
    pub fn new(config: ServerConfig, session: Arc<ArenaSession>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            session,
            connections: Arc::new(AtomicUsize::new(0)),
            shutdown_tx,
        }
    }

    /// Fresh tournament from `config` with entropy-seeded randomness.
    pub fn from_config(config: &ArenaConfig) -> Self {
        let coordinator = TournamentCoordinator::new(config, ArenaRng::from_entropy());
        Self::new(
            ServerConfig::from_arena(config),
            Arc::new(ArenaSession::new(coordinator)),
        )
    }

    /// Shared session.
    pub fn session(&self) -> Arc<ArenaSession> {
        self.session.clone()
    }

    /// Run the accept loop until [`shutdown`](Self::shutdown).
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<(), ServerRunError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!("Arena server listening on {}", self.config.bind_addr);

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            if self.connections.load(Ordering::SeqCst) >= self.config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
                                continue;
                            }
                            debug!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let session = self.session.clone();
        let config = self.config.clone();
        let connections = self.connections.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    error!("WebSocket handshake failed for {}: {}", addr, e);
                    return;
                }
            };
            connections.fetch_add(1, Ordering::SeqCst);

            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(config.channel_capacity);

            let sender_task = tokio::spawn(async move {
                while let Some(msg) = msg_rx.recv().await {
                    let text = match msg.to_json() {
                        Ok(t) => t,
                        Err(e) => {
                            error!("Failed to serialize message: {}", e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
            });

            let mut client = ClientContext {
                addr,
                sender: msg_tx.clone(),
                bound: None,
            };

            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                let client_msg = match ClientMessage::from_json(&text) {
                                    Ok(m) => m,
                                    // plain chat lines are accepted too
                                    Err(_) => ClientMessage::Text { text },
                                };
                                if !Self::handle_client_message(&mut client, client_msg, &session, &config).await {
                                    break;
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!("Client {} disconnected", addr);
                                break;
                            }
                            Some(Err(e)) => {
                                warn!("WebSocket error for {}: {}", addr, e);
                                break;
                            }
                            _ => {}
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        let _ = msg_tx.send(ServerMessage::Shutdown {
                            reason: "Server shutting down".to_string(),
                        }).await;
                        break;
                    }
                }
            }

            if let Some(bound) = &client.bound {
                session.detach(&bound.anon_id, bound.connection).await;
            }
            drop(client);
            drop(msg_tx);
            let _ = sender_task.await;
            connections.fetch_sub(1, Ordering::SeqCst);
            debug!("Client {} cleaned up", addr);
        });
    }

    /// Handle one client message. Returns `false` when the connection should close.
    async fn handle_client_message(
        client: &mut ClientContext,
        msg: ClientMessage,
        session: &ArenaSession,
        config: &ServerConfig,
    ) -> bool {
        match msg {
            ClientMessage::Auth(request) if client.bound.is_none() => {
                match resolve_identity(&request, &config.auth) {
                    Ok(identity) => {
                        let (connection, anon_id) =
                            session.attach(&identity, client.sender.clone()).await;
                        info!("Client {} bound as {}", client.addr, anon_id.short());
                        let reply = ServerMessage::AuthResult(AuthResult {
                            success: true,
                            session_id: Some(connection.to_string()),
                            error: None,
                            server_version: config.version.clone(),
                        });
                        client.bound = Some(BoundIdentity {
                            identity,
                            anon_id,
                            connection,
                        });
                        client.sender.send(reply).await.is_ok()
                    }
                    Err(e) => {
                        debug!("Auth failed for {}: {}", client.addr, e);
                        let reply = ServerMessage::Error(ServerError::from(&e));
                        client.sender.send(reply).await.is_ok()
                    }
                }
            }
            ClientMessage::Ping { timestamp } => client
                .sender
                .send(ServerMessage::Pong {
                    timestamp,
                    server_time: chrono::Utc::now().timestamp_millis().max(0) as u64,
                })
                .await
                .is_ok(),
            msg => match &client.bound {
                None => client
                    .sender
                    .send(ServerMessage::Error(ServerError::new(
                        ErrorCode::NotAuthenticated,
                        "send auth first",
                    )))
                    .await
                    .is_ok(),
                Some(bound) => session
                    .handle(&bound.identity, msg, &client.sender)
                    .await
                    .is_ok(),
            },
        }
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Active connection count.
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::protocol::AuthRequest;

    fn server() -> ArenaServer {
        let config = ArenaConfig::new(b"server-secret".to_vec()).with_min_players(2);
        let coordinator = TournamentCoordinator::new(&config, ArenaRng::seeded(5));
        ArenaServer::new(
            ServerConfig {
                bind_addr: "127.0.0.1:0".into(),
                ..Default::default()
            },
            Arc::new(ArenaSession::new(coordinator)),
        )
    }

    fn client() -> (ClientContext, mpsc::Receiver<ServerMessage>) {
        let (tx, rx) = mpsc::channel(16);
        let ctx = ClientContext {
            addr: "127.0.0.1:4000".parse().unwrap(),
            sender: tx,
            bound: None,
        };
        (ctx, rx)
    }

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.max_connections, 1000);
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
    }

    #[test]
    fn test_server_config_from_arena() {
        let mut arena = ArenaConfig::new(b"k".to_vec());
        arena.bind_addr = "127.0.0.1:9999".into();
        assert_eq!(ServerConfig::from_arena(&arena).bind_addr, "127.0.0.1:9999");
    }

    #[tokio::test]
    async fn test_server_creation_and_shutdown() {
        let server = server();
        assert_eq!(server.connection_count(), 0);
        assert_eq!(server.session().connection_count().await, 0);
        server.shutdown();
    }

    #[tokio::test]
    async fn test_commands_require_auth() {
        let server = server();
        let session = server.session();
        let (mut ctx, mut rx) = client();

        assert!(ArenaServer::handle_client_message(&mut ctx, ClientMessage::Register, &session, &server.config).await);
        assert!(matches!(
            rx.recv().await,
            Some(ServerMessage::Error(ServerError { code: ErrorCode::NotAuthenticated, .. }))
        ));
    }

    #[tokio::test]
    async fn test_auth_then_register() {
        let server = server();
        let session = server.session();
        let (mut ctx, mut rx) = client();

        let auth = ClientMessage::Auth(AuthRequest {
            identity: Some("alice".into()),
            token: None,
        });
        assert!(ArenaServer::handle_client_message(&mut ctx, auth, &session, &server.config).await);
        assert!(matches!(
            rx.recv().await,
            Some(ServerMessage::AuthResult(AuthResult { success: true, .. }))
        ));
        assert_eq!(session.connection_count().await, 1);

        assert!(ArenaServer::handle_client_message(&mut ctx, ClientMessage::Register, &session, &server.config).await);
        assert!(matches!(rx.recv().await, Some(ServerMessage::Registered(_))));
    }

    #[tokio::test]
    async fn test_auth_without_identity_rejected() {
        let server = server();
        let session = server.session();
        let (mut ctx, mut rx) = client();

        let auth = ClientMessage::Auth(AuthRequest {
            identity: None,
            token: None,
        });
        ArenaServer::handle_client_message(&mut ctx, auth, &session, &server.config).await;
        assert!(matches!(
            rx.recv().await,
            Some(ServerMessage::Error(ServerError { code: ErrorCode::AuthFailed, .. }))
        ));
        assert!(ctx.bound.is_none());
    }
}
