//! Runtime configuration, built once at process start.
//!
//! Every field has a default taken from the constants compiled into the
//! binary, so an empty JSON object is a valid configuration.

use crate::error::{LicenseError, LicenseResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tether_crypto::{derive_key, xor_cycle, CacheKey, KdfParams, Salt};

/// Application name used for the cache directory and key salt.
pub const DEFAULT_APP_NAME: &str = "Tether";

/// File name of the encrypted license cache.
pub const CACHE_FILE_NAME: &str = "license.dat";

/// Secret the cache key is stretched from.
const DEFAULT_CACHE_SECRET: &str = "tether-local-license-cache-v1";

/// Obfuscation key for the store credential.
const OBFUSCATION_KEY: &[u8] = b"TetherObfuscationKey2026";

/// Obfuscated store DSN.
const OBFUSCATED_DSN: &[u8] = &[
    0x32, 0x0c, 0x18, 0x0d, 0x5f, 0x1e, 0x26, 0x01, 0x03, 0x1b,
    0x00, 0x06, 0x12, 0x5a, 0x1a, 0x1e, 0x02, 0x22, 0x11, 0x1c,
    0x0d, 0x5d, 0x5d, 0x52, 0x31, 0x58, 0x06, 0x1f,
];

/// Bounded lifetime of one store connection.
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// How long a caller waits for a verification before giving up.
const DEFAULT_VERIFY_TIMEOUT_SECS: u64 = 15;

/// Obfuscated store credential and the key that reveals it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialConfig {
    /// XOR ciphertext of the DSN.
    pub ciphertext: Vec<u8>,
    /// Repeating XOR key.
    pub key: Vec<u8>,
}

impl CredentialConfig {
    /// Conceals a plaintext DSN under `key`.
    #[must_use]
    pub fn conceal(dsn: &str, key: &[u8]) -> Self {
        Self {
            ciphertext: xor_cycle(dsn.as_bytes(), key),
            key: key.to_vec(),
        }
    }
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            ciphertext: OBFUSCATED_DSN.to_vec(),
            key: OBFUSCATION_KEY.to_vec(),
        }
    }
}

impl std::fmt::Debug for CredentialConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialConfig")
            .field("ciphertext", &"[REDACTED]")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Configuration for the license subsystem.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LicenseConfig {
    /// Names the per-user cache directory and salts the cache key.
    pub app_name: String,
    /// Explicit cache file location. Defaults to
    /// `<user config dir>/<app_name>/license.dat`.
    pub cache_path: Option<PathBuf>,
    /// Secret the cache key is derived from.
    pub cache_secret: String,
    /// Store credential.
    pub credential: CredentialConfig,
    /// Store connection lifetime in seconds.
    pub connect_timeout_secs: u64,
    /// Caller-side verification timeout in seconds.
    pub verify_timeout_secs: u64,
    /// Argon2id parameters for the cache key.
    pub kdf: KdfParams,
}

impl Default for LicenseConfig {
    fn default() -> Self {
        Self {
            app_name: DEFAULT_APP_NAME.to_string(),
            cache_path: None,
            cache_secret: DEFAULT_CACHE_SECRET.to_string(),
            credential: CredentialConfig::default(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            verify_timeout_secs: DEFAULT_VERIFY_TIMEOUT_SECS,
            kdf: KdfParams::default(),
        }
    }
}

impl LicenseConfig {
    /// Parses a JSON configuration. Missing fields take their defaults.
    pub fn from_json(json: &str) -> LicenseResult<Self> {
        serde_json::from_str(json).map_err(|e| LicenseError::Config(e.to_string()))
    }

    /// Returns where the license cache lives.
    #[must_use]
    pub fn resolve_cache_path(&self) -> PathBuf {
        if let Some(path) = &self.cache_path {
            return path.clone();
        }
        let base = dirs::config_dir()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));
        base.join(&self.app_name).join(CACHE_FILE_NAME)
    }

    /// Derives the cache encryption key.
    pub fn derive_cache_key(&self) -> LicenseResult<CacheKey> {
        let salt = Salt::for_label(&self.app_name);
        Ok(derive_key(&self.cache_secret, &salt, &self.kdf)?)
    }

    /// Store connection lifetime.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Caller-side verification timeout.
    #[must_use]
    pub fn verify_timeout(&self) -> Duration {
        Duration::from_secs(self.verify_timeout_secs)
    }
}

impl std::fmt::Debug for LicenseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LicenseConfig")
            .field("app_name", &self.app_name)
            .field("cache_path", &self.cache_path)
            .field("cache_secret", &"[REDACTED]")
            .field("credential", &self.credential)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("verify_timeout_secs", &self.verify_timeout_secs)
            .field("kdf", &self.kdf)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::CredentialVault;

    #[test]
    fn embedded_credential_reveals_default_dsn() {
        let vault = CredentialVault::new(&CredentialConfig::default());
        assert_eq!(vault.reveal().as_str(), "file:licenses.sqlite?mode=rw");
    }

    #[test]
    fn empty_json_is_all_defaults() {
        let config = LicenseConfig::from_json("{}").unwrap();
        assert_eq!(config.app_name, DEFAULT_APP_NAME);
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.credential, CredentialConfig::default());
    }

    #[test]
    fn explicit_cache_path_wins() {
        let config = LicenseConfig {
            cache_path: Some(PathBuf::from("/tmp/x/license.dat")),
            ..LicenseConfig::default()
        };
        assert_eq!(config.resolve_cache_path(), PathBuf::from("/tmp/x/license.dat"));
    }

    #[test]
    fn default_cache_path_is_per_app() {
        let config = LicenseConfig {
            app_name: "MyVideoPlayer".into(),
            ..LicenseConfig::default()
        };
        let path = config.resolve_cache_path();
        assert!(path.ends_with("MyVideoPlayer/license.dat"));
    }

    #[test]
    fn debug_redacts_secrets() {
        let debug = format!("{:?}", LicenseConfig::default());
        assert!(!debug.contains(DEFAULT_CACHE_SECRET));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn malformed_json_is_config_error() {
        let err = LicenseConfig::from_json("{").unwrap_err();
        assert!(matches!(err, LicenseError::Config(_)));
    }
}
