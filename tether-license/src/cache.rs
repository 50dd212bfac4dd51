//! Encrypted on-disk cache of the last verified license.
//!
//! One file, `base64(nonce || ChaCha20-Poly1305 ciphertext)`, holding the
//! JSON snapshot. Every save draws a fresh nonce. Saves go through a temp
//! file and a rename under an exclusive lock on `<file>.lock`, so a reader
//! never sees a half-written file and two processes never interleave writes.
//!
//! Loading never fails loudly: anything that is not a readable, authentic,
//! well-formed snapshot comes back as [`CacheRead::Corrupt`].

use crate::config::LicenseConfig;
use crate::error::{LicenseError, LicenseResult};
use crate::record::LocalLicenseSnapshot;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tether_crypto::{open_text, seal_text, CacheKey};
use tracing::{debug, warn};
use zeroize::Zeroizing;

/// Result of reading the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheRead {
    /// A valid snapshot.
    Found(LocalLicenseSnapshot),
    /// No cache file.
    Absent,
    /// The file exists but cannot be trusted.
    Corrupt(String),
}

/// The license cache file.
pub struct LocalCache {
    path: PathBuf,
    key: CacheKey,
}

impl LocalCache {
    /// Creates a cache at `path` sealed with `key`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, key: CacheKey) -> Self {
        Self {
            path: path.into(),
            key,
        }
    }

    /// Creates the cache described by `config`, deriving its key.
    pub fn from_config(config: &LicenseConfig) -> LicenseResult<Self> {
        Ok(Self::new(config.resolve_cache_path(), config.derive_cache_key()?))
    }

    /// Location of the cache file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads and authenticates the cached snapshot.
    pub fn load(&self) -> CacheRead {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return CacheRead::Absent,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "license cache unreadable");
                return CacheRead::Corrupt(format!("unreadable: {e}"));
            }
        };

        let Ok(text) = std::str::from_utf8(&bytes) else {
            return corrupt("not text");
        };

        let plain = match open_text(&self.key, text) {
            Ok(plain) => Zeroizing::new(plain),
            Err(e) => return corrupt(&e.to_string()),
        };

        match serde_json::from_slice::<LocalLicenseSnapshot>(&plain) {
            Ok(snapshot) => CacheRead::Found(snapshot),
            Err(e) => corrupt(&format!("malformed payload: {e}")),
        }
    }

    /// Replaces the cached snapshot.
    pub fn save(&self, snapshot: &LocalLicenseSnapshot) -> LicenseResult<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)
            .map_err(|e| LicenseError::Storage(format!("failed to create {}: {e}", dir.display())))?;

        let lock = self.acquire_lock()?;

        let payload = Zeroizing::new(serde_json::to_vec(snapshot)?);
        let text = seal_text(&self.key, &payload)?;

        let mut temp = NamedTempFile::new_in(&dir)
            .map_err(|e| LicenseError::Storage(format!("failed to create temp file: {e}")))?;
        temp.write_all(text.as_bytes())
            .map_err(|e| LicenseError::Storage(format!("failed to write license cache: {e}")))?;
        temp.as_file()
            .sync_all()
            .map_err(|e| LicenseError::Storage(format!("failed to sync license cache: {e}")))?;
        temp.persist(&self.path)
            .map_err(|e| LicenseError::Storage(format!("failed to replace license cache: {}", e.error)))?;

        if let Err(e) = FileExt::unlock(&lock) {
            warn!(error = %e, "failed to release license cache lock");
        }
        debug!(path = %self.path.display(), "license cache saved");
        Ok(())
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        self.path.with_file_name(name)
    }

    fn acquire_lock(&self) -> LicenseResult<File> {
        let lock_path = self.lock_path();
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|e| LicenseError::Storage(format!("failed to open {}: {e}", lock_path.display())))?;
        file.lock_exclusive()
            .map_err(|e| LicenseError::Storage(format!("failed to lock license cache: {e}")))?;
        Ok(file)
    }
}

fn corrupt(reason: &str) -> CacheRead {
    warn!(reason, "license cache rejected");
    CacheRead::Corrupt(reason.to_string())
}
