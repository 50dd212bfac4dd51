//! Cryptographic primitives behind Tether's license cache and embedded
//! credentials.
//!
//! - [`seal`] / [`open`]: ChaCha20-Poly1305 AEAD with a fresh random nonce
//!   per call, framed as base64 text for single-file storage.
//! - [`derive_key`]: Argon2id derivation of the cache key.
//! - [`xor_cycle`]: repeating-key XOR used to keep the store credential out
//!   of plain sight in the binary. This is obfuscation, not encryption.

mod cipher;
mod error;
mod key;
mod obfuscate;

pub use cipher::{open, open_text, seal, seal_text, SealedBlob, NONCE_SIZE, TAG_SIZE};
pub use error::{CryptoError, CryptoResult};
pub use key::{derive_key, CacheKey, KdfParams, Salt, KEY_SIZE, SALT_SIZE};
pub use obfuscate::xor_cycle;
