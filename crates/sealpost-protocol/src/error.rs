use std::time::Duration;

use sealpost_crypto::CryptoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid command: {0}")]
    InvalidCommand(String),

    #[error("invalid status: {0}")]
    InvalidStatus(String),

    /// The peer answered with an `ERROR` status.
    #[error("peer returned error: {0}")]
    Remote(String),

    #[error("handshake incomplete: peer public key not exchanged")]
    HandshakeIncomplete,

    /// The session hit a terminal handshake failure.
    #[error("session failed: {0}")]
    SessionFailed(String),

    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Failures of the request/response channel itself. Fatal to the in-flight
/// request only.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection closed by peer")]
    Closed,

    #[error("frame error: {0}")]
    Codec(String),
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::MAX_MSG_SIZE;

    #[test]
    fn missing_field_display() {
        let e = ProtocolError::MissingField("cli_pub");
        assert_eq!(e.to_string(), "missing required field: cli_pub");
    }

    #[test]
    fn message_too_large_display() {
        let e = ProtocolError::MessageTooLarge {
            size: 2_000_000,
            max: MAX_MSG_SIZE,
        };
        let msg = e.to_string();
        assert!(msg.contains("2000000"));
        assert!(msg.contains(&MAX_MSG_SIZE.to_string()));
    }

    #[test]
    fn crypto_error_is_transparent() {
        let e: ProtocolError = CryptoError::Signature.into();
        assert_eq!(e.to_string(), "signature verification failed");
    }

    #[test]
    fn from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "broken");
        let e: ProtocolError = TransportError::from(io_err).into();
        assert!(matches!(e, ProtocolError::Transport(TransportError::Io(_))));
        assert!(e.to_string().contains("broken"));
    }

    #[test]
    fn timeout_display() {
        let e = TransportError::Timeout(Duration::from_secs(30));
        assert_eq!(e.to_string(), "request timed out after 30s");
    }
}
