//! Error types
//!
//! Crate-wide error and result aliases. Failures inside the hub (handshake and
//! transport errors, backpressure) are handled locally and never surface here.
//! Only setup and serialization failures reach callers.

/// Crate-wide result type
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for hub, server and publisher operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Socket-level failure (bind, accept, configure)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A message could not be encoded to the wire envelope
    #[error("failed to serialize message: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Role string outside the known set
    #[error("unknown role: {0}")]
    InvalidRole(String),
}
