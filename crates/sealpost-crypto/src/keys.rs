//! RSA key pair generation and public key encoding.
//!
//! Each party generates one key pair at start-up and holds it for the
//! process lifetime. Only the public half is ever serialized, as PKCS#1 DER.

use std::fmt;

use rand::rngs::OsRng;
use rsa::pkcs1::{DecodeRsaPublicKey, EncodeRsaPublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};

use crate::codec::digest;
use crate::error::{CryptoError, CryptoResult};

/// RSA public key as exchanged during the handshake.
pub type PublicKey = RsaPublicKey;

/// Smallest modulus accepted by [`KeyPair::generate`]. OAEP-wrapping a
/// 32-byte key under SHA-256 needs at least 98 bytes of modulus.
pub const MIN_KEY_BITS: usize = 1024;

/// A party's RSA key pair.
pub struct KeyPair {
    private: RsaPrivateKey,
    public: RsaPublicKey,
}

impl KeyPair {
    /// Generate a fresh key pair with a modulus of `bits` bits.
    ///
    /// This is the slowest operation in the system (seconds for 4096 bits);
    /// async callers should run it on a blocking thread.
    pub fn generate(bits: usize) -> CryptoResult<Self> {
        if bits < MIN_KEY_BITS {
            return Err(CryptoError::InvalidKey(format!(
                "key size {} is below the minimum of {} bits",
                bits, MIN_KEY_BITS
            )));
        }
        let private = RsaPrivateKey::new(&mut OsRng, bits)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        let public = private.to_public_key();
        Ok(Self { private, public })
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public
    }

    pub fn private_key(&self) -> &RsaPrivateKey {
        &self.private
    }

    /// Modulus size in bits.
    pub fn bits(&self) -> usize {
        self.public.size() * 8
    }

    /// Short hex identifier of the public key, for logs.
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.public)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("bits", &self.bits())
            .field("fingerprint", &self.fingerprint())
            .finish_non_exhaustive()
    }
}

/// Encode a key pair's public half as PKCS#1 DER.
pub fn export_public_key(pair: &KeyPair) -> CryptoResult<Vec<u8>> {
    encode_public_key(pair.public_key())
}

/// Encode any RSA public key as PKCS#1 DER.
pub fn encode_public_key(key: &RsaPublicKey) -> CryptoResult<Vec<u8>> {
    let doc = key
        .to_pkcs1_der()
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    Ok(doc.as_bytes().to_vec())
}

/// Decode a PKCS#1 DER public key received from a peer.
///
/// Keys below [`MIN_KEY_BITS`] are refused with [`CryptoError::InvalidKey`]:
/// nothing could be sealed to them.
pub fn import_public_key(bytes: &[u8]) -> CryptoResult<RsaPublicKey> {
    if bytes.is_empty() {
        return Err(CryptoError::MalformedKey("empty key encoding".into()));
    }
    let key = RsaPublicKey::from_pkcs1_der(bytes)
        .map_err(|e| CryptoError::MalformedKey(e.to_string()))?;
    let bits = key.size() * 8;
    if bits < MIN_KEY_BITS {
        return Err(CryptoError::InvalidKey(format!(
            "peer key size {} is below the minimum of {} bits",
            bits, MIN_KEY_BITS
        )));
    }
    Ok(key)
}

/// First 8 bytes of SHA-256 over the PKCS#1 encoding, as hex.
pub fn fingerprint(key: &RsaPublicKey) -> String {
    match encode_public_key(key) {
        Ok(der) => digest(&der)[..8].iter().map(|b| format!("{:02x}", b)).collect(),
        Err(_) => "unencodable".into(),
    }
}

#[cfg(test)]
pub(crate) mod test_keys {
    use std::sync::{Arc, OnceLock};

    use super::KeyPair;

    /// Small keys keep the test suite fast; the protocol is size-agnostic.
    pub const TEST_KEY_BITS: usize = 1024;

    pub fn alice() -> Arc<KeyPair> {
        static KEY: OnceLock<Arc<KeyPair>> = OnceLock::new();
        KEY.get_or_init(|| Arc::new(KeyPair::generate(TEST_KEY_BITS).unwrap()))
            .clone()
    }

    pub fn bob() -> Arc<KeyPair> {
        static KEY: OnceLock<Arc<KeyPair>> = OnceLock::new();
        KEY.get_or_init(|| Arc::new(KeyPair::generate(TEST_KEY_BITS).unwrap()))
            .clone()
    }

    pub fn mallory() -> Arc<KeyPair> {
        static KEY: OnceLock<Arc<KeyPair>> = OnceLock::new();
        KEY.get_or_init(|| Arc::new(KeyPair::generate(TEST_KEY_BITS).unwrap()))
            .clone()
    }
}
