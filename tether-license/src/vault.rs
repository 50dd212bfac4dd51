//! Reveals the license store credential shipped inside the binary.
//!
//! The credential is kept as repeating-key XOR ciphertext next to its key.
//! Both live in the same binary, so this only keeps the DSN out of `strings`
//! output. It does not stop anyone who reads the code.

use crate::config::CredentialConfig;
use tether_crypto::xor_cycle;
use zeroize::Zeroizing;

/// Holds the obfuscated store credential.
#[derive(Clone)]
pub struct CredentialVault {
    ciphertext: Vec<u8>,
    key: Vec<u8>,
}

impl CredentialVault {
    /// Creates a vault from configuration.
    #[must_use]
    pub fn new(config: &CredentialConfig) -> Self {
        Self {
            ciphertext: config.ciphertext.clone(),
            key: config.key.clone(),
        }
    }

    /// Recovers the plaintext credential.
    #[must_use]
    pub fn reveal(&self) -> Zeroizing<String> {
        let plain = Zeroizing::new(xor_cycle(&self.ciphertext, &self.key));
        Zeroizing::new(String::from_utf8_lossy(&plain).into_owned())
    }
}

impl std::fmt::Debug for CredentialVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialVault")
            .field("ciphertext_len", &self.ciphertext.len())
            .finish_non_exhaustive()
    }
}
