use thiserror::Error;

/// Failures raised by the codec, key and envelope layers.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Public key encoding could not be parsed.
    #[error("malformed public key: {0}")]
    MalformedKey(String),

    /// Key size or algorithm does not fit the operation.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Symmetric key unwrap failed.
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// Decompression failed after symmetric decryption.
    #[error("corrupt data: {0}")]
    CorruptData(String),

    /// Signature does not match the sender's public key.
    #[error("signature verification failed")]
    Signature,

    /// Recovered plaintext does not hash to the transmitted digest.
    #[error("digest mismatch: recovered plaintext does not match envelope digest")]
    DigestMismatch,

    /// Envelope operation attempted before the peer key was bound.
    #[error("peer public key not bound")]
    PeerNotBound,

    #[error("compression failed: {0}")]
    Compression(#[from] std::io::Error),
}

pub type CryptoResult<T> = Result<T, CryptoError>;
