use thiserror::Error;

/// All errors generated in `xrpl-stats`.
#[derive(Debug, Error)]
pub enum Error {
    /// Address unreachable, or the WebSocket handshake failed or timed out.
    #[error("connection failed: {0}")]
    Connection(String),

    /// A frame could not be sent while a call was in flight.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The network returned an error object for a specific call.
    #[error("server error: {0}")]
    Server(String),

    /// A response payload could not be parsed into the expected shape.
    #[error("failed to decode response payload: {0}")]
    Decode(String),

    /// The call's connection was closed before a response arrived.
    #[error("call cancelled by disconnect")]
    Cancelled,

    /// Shared store write failure.
    #[error("shared store failure: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("io failure: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::Decode(value.to_string())
    }
}
