//! Stateless byte transforms: zlib compression, AES-256-CTR with an
//! embedded IV, and SHA-256 digests.
//!
//! The symmetric layer performs no integrity check. A wrong key or a flipped
//! ciphertext bit yields garbage plaintext without an error at this layer;
//! callers rely on decompression failure and on the envelope digest to
//! detect it.

use std::io::{Read, Write};

use ctr::cipher::{KeyIvInit, StreamCipher};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::{CryptoError, CryptoResult};

type Aes256Ctr = ctr::Ctr128BE<aes::Aes256>;

/// Initialization vector length prepended to every ciphertext.
pub const IV_SIZE: usize = 16;

/// AES-256 key length.
pub const SYMMETRIC_KEY_SIZE: usize = 32;

/// SHA-256 output length.
pub const DIGEST_SIZE: usize = 32;

/// Upper bound on decompressed output: 16 MiB.
pub const MAX_DECOMPRESSED_SIZE: usize = 16 * 1024 * 1024;

/// Compress bytes with zlib at the default level.
pub fn compress(data: &[u8]) -> CryptoResult<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(
        Vec::with_capacity(data.len() / 2 + 16),
        Compression::default(),
    );
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Decompress a zlib stream.
///
/// Fails with [`CryptoError::CorruptData`] on malformed input or when the
/// output would exceed [`MAX_DECOMPRESSED_SIZE`].
pub fn decompress(data: &[u8]) -> CryptoResult<Vec<u8>> {
    let mut out = Vec::new();
    ZlibDecoder::new(data)
        .take(MAX_DECOMPRESSED_SIZE as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| CryptoError::CorruptData(e.to_string()))?;

    if out.len() > MAX_DECOMPRESSED_SIZE {
        return Err(CryptoError::CorruptData(format!(
            "decompressed size exceeds {} bytes",
            MAX_DECOMPRESSED_SIZE
        )));
    }
    Ok(out)
}

/// Encrypt with AES-256-CTR under a fresh random IV.
///
/// Output layout: `[iv(16)] [ciphertext(len)]`.
pub fn symmetric_encrypt(plaintext: &[u8], key: &[u8]) -> CryptoResult<Vec<u8>> {
    let mut out = vec![0u8; IV_SIZE + plaintext.len()];
    OsRng.fill_bytes(&mut out[..IV_SIZE]);

    let (iv, body) = out.split_at_mut(IV_SIZE);
    let mut cipher = Aes256Ctr::new_from_slices(key, iv).map_err(|_| {
        CryptoError::InvalidKey(format!(
            "symmetric key must be {} bytes, got {}",
            SYMMETRIC_KEY_SIZE,
            key.len()
        ))
    })?;
    body.copy_from_slice(plaintext);
    cipher.apply_keystream(body);

    Ok(out)
}

/// Decrypt an IV-prefixed AES-256-CTR ciphertext.
pub fn symmetric_decrypt(data: &[u8], key: &[u8]) -> CryptoResult<Vec<u8>> {
    if data.len() < IV_SIZE {
        return Err(CryptoError::CorruptData(format!(
            "ciphertext too short: expected at least {} bytes, got {}",
            IV_SIZE,
            data.len()
        )));
    }

    let (iv, body) = data.split_at(IV_SIZE);
    let mut cipher = Aes256Ctr::new_from_slices(key, iv).map_err(|_| {
        CryptoError::InvalidKey(format!(
            "symmetric key must be {} bytes, got {}",
            SYMMETRIC_KEY_SIZE,
            key.len()
        ))
    })?;
    let mut out = body.to_vec();
    cipher.apply_keystream(&mut out);

    Ok(out)
}

/// SHA-256 of `data`.
pub fn digest(data: &[u8]) -> [u8; DIGEST_SIZE] {
    Sha256::digest(data).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn random_key() -> [u8; SYMMETRIC_KEY_SIZE] {
        let mut key = [0u8; SYMMETRIC_KEY_SIZE];
        OsRng.fill_bytes(&mut key);
        key
    }

    #[test]
    fn compress_decompress_roundtrip() {
        let data = b"El token secreto es 123456 ".repeat(40);
        let packed = compress(&data).unwrap();
        assert!(packed.len() < data.len());
        assert_eq!(decompress(&packed).unwrap(), data);
    }

    #[test]
    fn compress_empty_input() {
        let packed = compress(b"").unwrap();
        assert!(decompress(&packed).unwrap().is_empty());
    }

    #[test]
    fn decompress_rejects_garbage() {
        let result = decompress(b"not zlib at all");
        assert!(matches!(result, Err(CryptoError::CorruptData(_))));
    }

    #[test]
    fn decompress_rejects_bad_checksum() {
        let mut packed = compress(b"checksummed payload").unwrap();
        let last = packed.len() - 1;
        packed[last] ^= 0x01; // adler32 trailer
        assert!(matches!(decompress(&packed), Err(CryptoError::CorruptData(_))));
    }

    #[test]
    fn decompress_allows_exactly_the_cap() {
        let packed = compress(&vec![0u8; MAX_DECOMPRESSED_SIZE]).unwrap();
        assert_eq!(decompress(&packed).unwrap().len(), MAX_DECOMPRESSED_SIZE);
    }

    #[test]
    fn decompress_rejects_output_over_the_cap() {
        // A few KiB of zlib expanding past 16 MiB
        let packed = compress(&vec![0u8; MAX_DECOMPRESSED_SIZE + 1]).unwrap();
        assert!(packed.len() < 64 * 1024);
        assert!(matches!(decompress(&packed), Err(CryptoError::CorruptData(_))));
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let key = random_key();
        let plaintext = b"hello sealed world";

        let encrypted = symmetric_encrypt(plaintext, &key).unwrap();
        assert_eq!(encrypted.len(), plaintext.len() + IV_SIZE);
        assert_ne!(&encrypted[IV_SIZE..], plaintext);

        let decrypted = symmetric_decrypt(&encrypted, &key).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn encrypt_uses_fresh_iv() {
        let key = random_key();
        let a = symmetric_encrypt(b"same input", &key).unwrap();
        let b = symmetric_encrypt(b"same input", &key).unwrap();
        assert_ne!(a, b);
        assert_ne!(a[..IV_SIZE], b[..IV_SIZE]);
    }

    #[test]
    fn wrong_key_yields_garbage_not_error() {
        let plaintext = b"no integrity at this layer";
        let encrypted = symmetric_encrypt(plaintext, &random_key()).unwrap();
        let decrypted = symmetric_decrypt(&encrypted, &random_key()).unwrap();
        assert_eq!(decrypted.len(), plaintext.len());
        assert_ne!(decrypted, plaintext);
    }

    #[test]
    fn invalid_key_length() {
        let result = symmetric_encrypt(b"data", &[0u8; 16]);
        assert!(matches!(result, Err(CryptoError::InvalidKey(_))));
        let result = symmetric_decrypt(&[0u8; 32], &[0u8; 31]);
        assert!(matches!(result, Err(CryptoError::InvalidKey(_))));
    }

    #[test]
    fn decrypt_too_short() {
        let result = symmetric_decrypt(&[0u8; 10], &random_key());
        assert!(matches!(result, Err(CryptoError::CorruptData(_))));
    }

    #[test]
    fn digest_is_sha256() {
        let d = digest(b"abc");
        assert_eq!(d.len(), DIGEST_SIZE);
        assert_eq!(
            d[..4],
            [0xba, 0x78, 0x16, 0xbf] // FIPS 180-2 test vector prefix
        );
        assert_eq!(digest(b"abc"), d);
        assert_ne!(digest(b"abd"), d);
    }
}
