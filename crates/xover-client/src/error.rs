use thiserror::Error;
use xover_core::{CodeError, NegotiationError, SessionCode};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Session not found. Check the code.")]
    SessionNotFound(SessionCode),

    #[error(transparent)]
    InvalidCode(#[from] CodeError),

    #[error("Invalid client configuration: {0}")]
    InvalidConfig(String),

    #[error("Rendezvous connection failed: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Rendezvous connection closed")]
    Disconnected,

    #[error("Rendezvous server error: {0}")]
    Server(String),

    #[error("Unexpected reply from rendezvous server")]
    UnexpectedReply,

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Negotiation(#[from] NegotiationError),
}

pub type Result<T> = std::result::Result<T, ClientError>;
