//! Gateway error types.

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// A frame that could not be decoded.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Not JSON, or not a `{op, d, s?, t?}` object.
    #[error("malformed frame: {0}")]
    Json(#[from] serde_json::Error),
    /// `op` is not a known opcode.
    #[error("unknown opcode {0}")]
    UnknownOpcode(u8),
    /// A field the opcode requires is absent.
    #[error("frame is missing `{0}`")]
    MissingField(&'static str),
}

/// Errors surfaced by the connection manager and its driver.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The client is not configured to connect (e.g. no credential).
    #[error("configuration error: {0}")]
    Configuration(String),
    /// An inbound frame could not be decoded.
    #[error(transparent)]
    Decode(#[from] FrameError),
    /// The socket failed.
    #[error("transport error: {0}")]
    Transport(Box<tungstenite::Error>),
    /// The shard driver has shut down.
    #[error("shard driver is closed")]
    Closed,
}

impl From<tungstenite::Error> for GatewayError {
    fn from(error: tungstenite::Error) -> Self {
        Self::Transport(Box::new(error))
    }
}
