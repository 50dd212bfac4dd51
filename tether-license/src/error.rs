//! Error types for the licensing module.
//!
//! Business outcomes of a verification (banned, wrong device, expired...)
//! are not errors; they travel as [`crate::ReasonCode`]. These variants
//! cover the failures of the machinery underneath.

use thiserror::Error;

/// Licensing-specific errors.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// Cache file could not be read, written, or locked.
    #[error("storage error: {0}")]
    Storage(String),

    /// Encryption layer failure.
    #[error("crypto error: {0}")]
    Crypto(#[from] tether_crypto::CryptoError),

    /// License store (SQLite) failure.
    #[error("database error: {0}")]
    Database(String),

    /// Configuration could not be parsed or applied.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A stored date or timestamp could not be parsed.
    #[error("invalid date: {0}")]
    InvalidDate(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for license operations.
pub type LicenseResult<T> = Result<T, LicenseError>;
