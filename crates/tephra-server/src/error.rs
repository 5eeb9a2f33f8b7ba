//! Server error types.

use std::io;

use tephra_core::SessionError;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Errors that end a connection or the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Socket or transport failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// WebSocket handshake or protocol failure
    #[error("WebSocket error: {0}")]
    WebSocket(Box<tungstenite::Error>),

    /// The session failed fatally
    #[error("session error: {0}")]
    Session(#[from] SessionError),
}

impl From<tungstenite::Error> for ServerError {
    fn from(err: tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(err))
    }
}
