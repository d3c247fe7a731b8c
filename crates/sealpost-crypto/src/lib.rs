//! SealPost cryptographic layer: codec primitives, RSA key exchange and
//! sealed envelopes.
//!
//! This crate provides:
//! - Compression (zlib), AES-256-CTR with an IV prefix, SHA-256 digests
//! - RSA key pair generation and PKCS#1 public key encoding
//! - Per-party peer bindings populated by the handshake
//! - Envelope sealing (compress, encrypt, wrap, sign) and opening

pub mod binding;
pub mod codec;
pub mod envelope;
pub mod error;
pub mod keys;

// Re-export key types for convenience
pub use binding::PeerBinding;
pub use codec::{
    compress, decompress, digest, symmetric_decrypt, symmetric_encrypt, DIGEST_SIZE, IV_SIZE,
    MAX_DECOMPRESSED_SIZE, SYMMETRIC_KEY_SIZE,
};
pub use envelope::{open, seal, Envelope};
pub use error::{CryptoError, CryptoResult};
pub use keys::{export_public_key, import_public_key, KeyPair, PublicKey, MIN_KEY_BITS};
