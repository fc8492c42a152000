//! WebSocket client for the rendezvous service.

use crate::error::{ClientError, Result};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};
use xover_core::{NegotiationRecord, Role, SessionCode, SignalMessage};
use xover_server::protocol::{ClientMessage, ServerMessage};

/// One request/response connection to the rendezvous server.
///
/// Requests are strictly sequential: each call sends one message and waits
/// for the single reply.
pub struct RendezvousClient {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl RendezvousClient {
    pub async fn connect(url: &str) -> Result<Self> {
        let (socket, _) = connect_async(url).await?;
        info!("Connected to rendezvous server at {}", url);
        Ok(Self { socket })
    }

    /// Send one message and wait for its reply.
    pub async fn request(&mut self, message: &ClientMessage) -> Result<ServerMessage> {
        let text = serde_json::to_string(message)?;
        self.socket.send(Message::Text(text)).await?;

        while let Some(frame) = self.socket.next().await {
            match frame? {
                Message::Text(text) => {
                    return match serde_json::from_str::<ServerMessage>(&text)? {
                        ServerMessage::Error { message } => Err(ClientError::Server(message)),
                        reply => Ok(reply),
                    };
                }
                Message::Close(_) => break,
                _ => {}
            }
        }

        Err(ClientError::Disconnected)
    }

    /// Register an empty record for `code`.
    pub async fn create(&mut self, code: &SessionCode) -> Result<()> {
        let request = ClientMessage::Create { code: code.clone() };
        match self.request(&request).await? {
            ServerMessage::Created { .. } => Ok(()),
            _ => Err(ClientError::UnexpectedReply),
        }
    }

    /// Publish a signal. `Ok(false)` means the record no longer exists.
    pub async fn publish(
        &mut self,
        code: &SessionCode,
        message: SignalMessage,
        role: Role,
    ) -> Result<bool> {
        let kind = message.kind;
        let request = ClientMessage::Signal {
            code: code.clone(),
            message,
            role: Some(role),
        };
        match self.request(&request).await? {
            ServerMessage::Published { accepted, .. } => {
                debug!(code = %code, ?kind, accepted, "Published");
                Ok(accepted)
            }
            _ => Err(ClientError::UnexpectedReply),
        }
    }

    /// The current record, or `None` if it is absent or expired.
    pub async fn fetch(&mut self, code: &SessionCode) -> Result<Option<NegotiationRecord>> {
        let request = ClientMessage::Fetch { code: code.clone() };
        match self.request(&request).await? {
            ServerMessage::Record { record, .. } => Ok(Some(record)),
            ServerMessage::NotFound { .. } => Ok(None),
            _ => Err(ClientError::UnexpectedReply),
        }
    }

    pub async fn ping(&mut self) -> Result<()> {
        match self.request(&ClientMessage::Ping).await? {
            ServerMessage::Pong => Ok(()),
            _ => Err(ClientError::UnexpectedReply),
        }
    }

    pub async fn close(mut self) {
        let _ = self.socket.close(None).await;
    }
}
