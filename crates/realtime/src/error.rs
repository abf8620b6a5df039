//! Realtime error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RealtimeError {
    /// The live channel could not be opened
    #[error("Connection failed: {0}")]
    Connect(String),

    /// An open live channel failed
    #[error("Connection lost: {0}")]
    Connection(String),

    #[error("Send failed: {0}")]
    Send(String),

    /// An event carried a payload of the wrong shape
    #[error("Invalid event payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid live channel URL: {0}")]
    InvalidUrl(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for RealtimeError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Connection(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RealtimeError>;
