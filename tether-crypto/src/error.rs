//! Error types for the crypto layer.

use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur in cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key derivation failed.
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// Sealing failed.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Opening failed (wrong key, tampered data, or bad framing).
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// Text framing could not be decoded.
    #[error("invalid framing: {0}")]
    Framing(String),
}
