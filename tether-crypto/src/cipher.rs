//! Sealed blobs using ChaCha20-Poly1305.
//!
//! A blob is `nonce || ciphertext+tag`. The text framing is standard base64
//! of those bytes, which is what lands in the license cache file.

use crate::error::{CryptoError, CryptoResult};
use crate::key::CacheKey;
use base64::{engine::general_purpose::STANDARD, Engine};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;

/// Size of nonce in bytes (96 bits for ChaCha20-Poly1305).
pub const NONCE_SIZE: usize = 12;

/// Size of authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// Authenticated ciphertext together with the nonce it was sealed under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SealedBlob {
    /// Random per-seal nonce.
    pub nonce: [u8; NONCE_SIZE],
    /// Ciphertext with the trailing auth tag.
    pub ciphertext: Vec<u8>,
}

impl SealedBlob {
    /// Encodes as base64 text.
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut bytes = Vec::with_capacity(NONCE_SIZE + self.ciphertext.len());
        bytes.extend_from_slice(&self.nonce);
        bytes.extend_from_slice(&self.ciphertext);
        STANDARD.encode(&bytes)
    }

    /// Decodes base64 text produced by [`SealedBlob::to_text`].
    ///
    /// Surrounding whitespace is ignored.
    pub fn from_text(text: &str) -> CryptoResult<Self> {
        let bytes = STANDARD
            .decode(text.trim())
            .map_err(|e| CryptoError::Framing(format!("invalid base64: {e}")))?;

        if bytes.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CryptoError::Framing(format!(
                "blob too short: {} bytes",
                bytes.len()
            )));
        }

        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&bytes[..NONCE_SIZE]);
        Ok(Self {
            nonce,
            ciphertext: bytes[NONCE_SIZE..].to_vec(),
        })
    }
}

/// Seals `plaintext` under `key` with a fresh random nonce.
pub fn seal(key: &CacheKey, plaintext: &[u8]) -> CryptoResult<SealedBlob> {
    let cipher = ChaCha20Poly1305::new(key.as_bytes().into());

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    Ok(SealedBlob {
        nonce: nonce_bytes,
        ciphertext,
    })
}

/// Opens a blob sealed by [`seal`] under the same key.
pub fn open(key: &CacheKey, blob: &SealedBlob) -> CryptoResult<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(key.as_bytes().into());

    cipher
        .decrypt(Nonce::from_slice(&blob.nonce), blob.ciphertext.as_ref())
        .map_err(|_| {
            CryptoError::Decryption("authentication failed (wrong key or tampered data)".to_string())
        })
}

/// Seals `plaintext` and returns the base64 text framing.
pub fn seal_text(key: &CacheKey, plaintext: &[u8]) -> CryptoResult<String> {
    Ok(seal(key, plaintext)?.to_text())
}

/// Decodes the text framing and opens the blob.
pub fn open_text(key: &CacheKey, text: &str) -> CryptoResult<Vec<u8>> {
    let blob = SealedBlob::from_text(text)?;
    open(key, &blob)
}
