//! Envelope sealing and opening.
//!
//! Sealing: compress, encrypt under a fresh AES key, wrap that key with the
//! recipient's RSA key (OAEP/SHA-256), sign the plaintext digest with the
//! sender's RSA key (PSS/SHA-256). Opening reverses each step and refuses to
//! release the plaintext unless the signature verifies and the recovered
//! plaintext hashes to the signed digest.

use rand::rngs::OsRng;
use rand::RngCore;
use rsa::{Oaep, Pss, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::codec::{self, SYMMETRIC_KEY_SIZE};
use crate::error::{CryptoError, CryptoResult};

/// Everything a recipient needs to recover and authenticate one plaintext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Symmetric key encrypted under the recipient's public key.
    pub wrapped_key: Vec<u8>,
    /// `[iv(16)] [AES-256-CTR(zlib(plaintext))]`.
    pub ciphertext: Vec<u8>,
    /// PSS signature over `digest` by the sender's private key.
    pub signature: Vec<u8>,
    /// SHA-256 of the original plaintext.
    pub digest: Vec<u8>,
}

/// Seal `plaintext` for `recipient`, signed by `sender`.
pub fn seal(
    plaintext: &[u8],
    recipient: &RsaPublicKey,
    sender: &RsaPrivateKey,
) -> CryptoResult<Envelope> {
    let mut key = Zeroizing::new([0u8; SYMMETRIC_KEY_SIZE]);
    OsRng.fill_bytes(&mut key[..]);

    let ciphertext = codec::symmetric_encrypt(&codec::compress(plaintext)?, &key[..])?;

    let wrapped_key = recipient
        .encrypt(&mut OsRng, Oaep::new::<Sha256>(), &key[..])
        .map_err(|e| CryptoError::InvalidKey(format!("key wrapping failed: {}", e)))?;

    let digest = codec::digest(plaintext);
    let signature = sender
        .sign_with_rng(&mut OsRng, Pss::new::<Sha256>(), &digest)
        .map_err(|e| CryptoError::InvalidKey(format!("signing failed: {}", e)))?;

    Ok(Envelope {
        wrapped_key,
        ciphertext,
        signature,
        digest: digest.to_vec(),
    })
}

/// Open an envelope addressed to `recipient` and signed by `sender`.
pub fn open(
    envelope: &Envelope,
    recipient: &RsaPrivateKey,
    sender: &RsaPublicKey,
) -> CryptoResult<Vec<u8>> {
    let key = Zeroizing::new(
        recipient
            .decrypt(Oaep::new::<Sha256>(), &envelope.wrapped_key)
            .map_err(|e| CryptoError::Decryption(e.to_string()))?,
    );
    if key.len() != SYMMETRIC_KEY_SIZE {
        return Err(CryptoError::Decryption(format!(
            "unwrapped key is {} bytes, expected {}",
            key.len(),
            SYMMETRIC_KEY_SIZE
        )));
    }

    let plaintext = codec::decompress(&codec::symmetric_decrypt(&envelope.ciphertext, &key)?)?;

    sender
        .verify(Pss::new::<Sha256>(), &envelope.digest, &envelope.signature)
        .map_err(|_| CryptoError::Signature)?;

    let recomputed = codec::digest(&plaintext);
    if !bool::from(recomputed.as_slice().ct_eq(&envelope.digest)) {
        return Err(CryptoError::DigestMismatch);
    }

    Ok(plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::IV_SIZE;
    use crate::keys::test_keys::{alice, bob, mallory};

    const TOKEN: &[u8] = "El token secreto es 123456".as_bytes();

    fn sealed(plaintext: &[u8]) -> Envelope {
        seal(plaintext, bob().public_key(), alice().private_key()).unwrap()
    }

    fn open_as_bob(env: &Envelope) -> CryptoResult<Vec<u8>> {
        open(env, bob().private_key(), alice().public_key())
    }

    #[test]
    fn seal_open_roundtrip() {
        for plaintext in [&b""[..], TOKEN, &[0u8; 4096][..], "ñandú €".as_bytes()] {
            let env = sealed(plaintext);
            assert_eq!(open_as_bob(&env).unwrap(), plaintext);
        }
    }

    #[test]
    fn envelope_fields_have_expected_shape() {
        let env = sealed(TOKEN);
        assert_eq!(env.digest, codec::digest(TOKEN).to_vec());
        assert_eq!(env.wrapped_key.len(), bob().bits() / 8);
        assert_eq!(env.signature.len(), alice().bits() / 8);
        assert!(env.ciphertext.len() > IV_SIZE);
    }

    #[test]
    fn sealing_is_randomized() {
        let a = sealed(TOKEN);
        let b = sealed(TOKEN);
        assert_ne!(a.wrapped_key, b.wrapped_key);
        assert_ne!(a.ciphertext, b.ciphertext);
        assert_eq!(a.digest, b.digest);
    }

    #[test]
    fn wrong_recipient_cannot_open() {
        let env = sealed(TOKEN);
        let result = open(&env, mallory().private_key(), alice().public_key());
        assert!(matches!(
            result,
            Err(CryptoError::Decryption(_)) | Err(CryptoError::CorruptData(_))
        ));
    }

    #[test]
    fn wrong_sender_key_fails_signature() {
        let env = sealed(TOKEN);
        let result = open(&env, bob().private_key(), mallory().public_key());
        assert!(matches!(result, Err(CryptoError::Signature)));
    }

    #[test]
    fn signature_by_impostor_rejected() {
        // Mallory seals for Bob, Bob expects Alice
        let env = seal(TOKEN, bob().public_key(), mallory().private_key()).unwrap();
        assert!(matches!(open_as_bob(&env), Err(CryptoError::Signature)));
    }

    #[test]
    fn ciphertext_bit_flips_never_pass_silently() {
        let env = sealed(&b"a reasonably long message body for tamper checks ".repeat(4));
        for pos in [0, IV_SIZE - 1, IV_SIZE, IV_SIZE + 3, env.ciphertext.len() - 1] {
            for bit in [0x01u8, 0x80] {
                let mut tampered = env.clone();
                tampered.ciphertext[pos] ^= bit;
                let result = open_as_bob(&tampered);
                assert!(
                    matches!(
                        result,
                        Err(CryptoError::CorruptData(_)) | Err(CryptoError::DigestMismatch)
                    ),
                    "flip at byte {} bit {:#x} gave {:?}",
                    pos,
                    bit,
                    result
                );
            }
        }
    }

    #[test]
    fn tampered_digest_fails_signature() {
        let mut env = sealed(TOKEN);
        env.digest[0] ^= 0xFF;
        assert!(matches!(open_as_bob(&env), Err(CryptoError::Signature)));
    }

    #[test]
    fn tampered_wrapped_key_fails() {
        let mut env = sealed(TOKEN);
        env.wrapped_key[10] ^= 0x01;
        assert!(matches!(open_as_bob(&env), Err(CryptoError::Decryption(_))));
    }

    #[test]
    fn swapped_ciphertext_detected_by_digest() {
        // Valid ciphertext from a second envelope, signature/digest from the first
        let first = sealed(TOKEN);
        let second = sealed(b"a different message");
        let spliced = Envelope {
            wrapped_key: second.wrapped_key,
            ciphertext: second.ciphertext,
            signature: first.signature,
            digest: first.digest,
        };
        assert!(matches!(open_as_bob(&spliced), Err(CryptoError::DigestMismatch)));
    }

    #[test]
    fn truncated_ciphertext_rejected() {
        let mut env = sealed(TOKEN);
        env.ciphertext.truncate(IV_SIZE - 1);
        assert!(matches!(open_as_bob(&env), Err(CryptoError::CorruptData(_))));
    }

    fn undersized_key() -> RsaPrivateKey {
        RsaPrivateKey::new(&mut OsRng, 512).unwrap()
    }

    #[test]
    fn seal_to_undersized_recipient_is_invalid_key() {
        let recipient = undersized_key().to_public_key();
        let result = seal(b"hi", &recipient, alice().private_key());
        assert!(matches!(result, Err(CryptoError::InvalidKey(_))));
    }

    #[test]
    fn seal_with_undersized_sender_is_invalid_key() {
        let sender = undersized_key();
        let result = seal(b"hi", bob().public_key(), &sender);
        assert!(matches!(result, Err(CryptoError::InvalidKey(_))));
    }
}
