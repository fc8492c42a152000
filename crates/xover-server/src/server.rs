//! WebSocket server and connection handling.

use crate::protocol::{ClientMessage, ServerMessage};
use crate::store::RendezvousStore;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use xover_core::{Role, SessionCode, SignalKind, SignalMessage};

/// Server state shared across all connections.
pub struct ServerState {
    /// Negotiation records by session code
    pub store: RendezvousStore,
}

impl ServerState {
    pub fn new(store: RendezvousStore) -> Self {
        Self { store }
    }
}

/// Bind `addr` and run the WebSocket server.
pub async fn run_server(addr: SocketAddr, state: Arc<ServerState>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("XOver rendezvous listening on {}", listener.local_addr()?);
    serve(listener, state).await
}

/// Accept connections on an already bound listener.
pub async fn serve(listener: TcpListener, state: Arc<ServerState>) -> anyhow::Result<()> {
    while let Ok((stream, peer_addr)) = listener.accept().await {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer_addr, state).await {
                error!("Connection error from {}: {}", peer_addr, e);
            }
        });
    }

    Ok(())
}

/// Handle a single WebSocket connection.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    state: Arc<ServerState>,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream).await?;
    let conn_id = Uuid::new_v4();
    info!(%conn_id, "New WebSocket connection from {}", addr);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    // Create channel for outgoing messages
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    // Spawn task to forward messages from channel to WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Ok(text) = serde_json::to_string(&msg) {
                if ws_sender.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
        }
    });

    // Handle incoming messages
    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                let reply = match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(client_msg) => handle_message(client_msg, &state),
                    Err(e) => {
                        warn!(%conn_id, "Invalid message: {}", text);
                        ServerMessage::Error {
                            message: format!("Invalid message: {}", e),
                        }
                    }
                };
                if tx.send(reply).is_err() {
                    break;
                }
            }
            Ok(Message::Close(_)) => {
                info!(%conn_id, "Client closing connection");
                break;
            }
            Err(e) => {
                error!(%conn_id, "WebSocket error: {}", e);
                break;
            }
            _ => {}
        }
    }

    send_task.abort();
    info!(%conn_id, "Connection closed");
    Ok(())
}

/// Answer one client request.
pub fn handle_message(msg: ClientMessage, state: &ServerState) -> ServerMessage {
    match msg {
        ClientMessage::Create { code } => {
            state.store.create(code.clone());
            info!(code = %code, "Session created");
            ServerMessage::Created { code }
        }

        ClientMessage::Fetch { code } => match state.store.get(&code) {
            Some(record) => ServerMessage::Record { code, record },
            None => ServerMessage::NotFound { code },
        },

        ClientMessage::Signal {
            code,
            message,
            role,
        } => {
            if !message.is_well_formed() {
                return ServerMessage::Error {
                    message: format!("Malformed {:?} signal", message.kind),
                };
            }
            let accepted = publish(state, &code, message, role);
            ServerMessage::Published { code, accepted }
        }

        ClientMessage::Ping => ServerMessage::Pong,
    }
}

fn publish(
    state: &ServerState,
    code: &SessionCode,
    message: SignalMessage,
    role: Option<Role>,
) -> bool {
    let kind = message.kind;
    let result = match kind {
        SignalKind::Offer => state.store.set_offer(code, message),
        SignalKind::Answer => state.store.set_answer(code, message),
        SignalKind::Ice => match role.or_else(|| state.store.candidate_role(code)) {
            Some(role) => state.store.append_candidate(code, message, role),
            None => return false,
        },
    };

    match result {
        Ok(()) => {
            debug!(code = %code, ?kind, "Signal stored");
            true
        }
        Err(e) => {
            debug!(?kind, "Signal dropped: {}", e);
            false
        }
    }
}

/// Periodically remove expired records.
pub fn spawn_sweeper(state: Arc<ServerState>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // First tick completes immediately
        loop {
            ticker.tick().await;
            let removed = state.store.sweep();
            if removed > 0 {
                info!(removed, remaining = state.store.len(), "Swept expired sessions");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Clock;
    use serde_json::json;
    use tokio::time::Instant;

    /// Milliseconds of tokio time since creation.
    struct TokioClock(Instant);

    impl Clock for TokioClock {
        fn now_millis(&self) -> u64 {
            self.0.elapsed().as_millis() as u64
        }
    }

    fn state() -> ServerState {
        ServerState::new(RendezvousStore::new(xover_core::SESSION_TTL))
    }

    fn code() -> SessionCode {
        SessionCode::parse("HOST42").unwrap()
    }

    fn signal(message: SignalMessage, role: Option<Role>) -> ClientMessage {
        ClientMessage::Signal {
            code: code(),
            message,
            role,
        }
    }

    #[test]
    fn test_fetch_unknown_code() {
        let reply = handle_message(ClientMessage::Fetch { code: code() }, &state());
        assert!(matches!(reply, ServerMessage::NotFound { .. }));
    }

    #[test]
    fn test_publish_without_record_not_accepted() {
        let reply = handle_message(signal(SignalMessage::offer("v=0", 1), None), &state());
        assert!(matches!(reply, ServerMessage::Published { accepted: false, .. }));
    }

    #[test]
    fn test_full_exchange() {
        let state = state();
        handle_message(ClientMessage::Create { code: code() }, &state);

        for msg in [
            signal(SignalMessage::offer("offer-sdp", 1), None),
            signal(SignalMessage::ice(json!("h1"), 2), None),
            signal(SignalMessage::answer("answer-sdp", 3), None),
            signal(SignalMessage::ice(json!("j1"), 4), None),
            signal(SignalMessage::ice(json!("h2"), 5), Some(Role::Host)),
        ] {
            let reply = handle_message(msg, &state);
            assert!(matches!(reply, ServerMessage::Published { accepted: true, .. }));
        }

        let ServerMessage::Record { record, .. } =
            handle_message(ClientMessage::Fetch { code: code() }, &state)
        else {
            panic!("expected record");
        };
        assert_eq!(record.offer.unwrap().sdp(), Some("offer-sdp"));
        assert_eq!(record.answer.unwrap().sdp(), Some("answer-sdp"));
        assert_eq!(record.host_ice.len(), 2);
        assert_eq!(record.joiner_ice.len(), 1);
        assert_eq!(record.joiner_ice[0].candidate(), Some(&json!("j1")));
    }

    #[test]
    fn test_malformed_signal_rejected() {
        let state = state();
        handle_message(ClientMessage::Create { code: code() }, &state);

        let mut message = SignalMessage::offer("v=0", 1);
        message.payload.sdp = None;
        let reply = handle_message(signal(message, None), &state);
        assert!(matches!(reply, ServerMessage::Error { .. }));
        assert!(state.store.get(&code()).unwrap().offer.is_none());
    }

    #[test]
    fn test_ping() {
        assert!(matches!(
            handle_message(ClientMessage::Ping, &state()),
            ServerMessage::Pong
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_removes_expired_records() {
        let clock = Arc::new(TokioClock(Instant::now()));
        let store = RendezvousStore::with_clock(Duration::from_secs(5), clock);
        let state = Arc::new(ServerState::new(store));
        state.store.create(code());

        let sweeper = spawn_sweeper(Arc::clone(&state), Duration::from_secs(1));

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(state.store.len(), 1);

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(state.store.len(), 0);
        sweeper.abort();
    }
}
