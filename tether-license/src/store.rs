//! SQLite-backed license store.
//!
//! [`SqliteAuthority`] is the client's view: one short-lived connection per
//! verification, opened read-write but never created, so a missing store is
//! "unreachable". [`LicenseStore`] is the administrative view used to insert
//! records and toggle bans.
//!
//! Binding is a single conditional `UPDATE ... WHERE device_id IS NULL OR
//! device_id = ''`. SQLite serializes writers, so when two machines race to
//! bind the same unbound code exactly one update affects a row.

use crate::authority::{redact, LicenseAuthority, ReasonCode, Verification};
use crate::clock::Clock;
use crate::config::LicenseConfig;
use crate::device::HardwareFingerprint;
use crate::error::{LicenseError, LicenseResult};
use crate::record::{is_within_grace, LicenseRecord};
use crate::vault::CredentialVault;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Storage format of `expire_date`.
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Schema of the authoritative license table.
pub const LICENSE_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS licenses (
        code TEXT PRIMARY KEY,
        expire_date TEXT NOT NULL,
        is_banned INTEGER NOT NULL DEFAULT 0,
        device_id TEXT
    );
";

fn parse_date(raw: &str) -> LicenseResult<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|e| LicenseError::InvalidDate(format!("{raw}: {e}")))
}

/// Outcome of the binding step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Binding {
    /// This call bound the code.
    Bound,
    /// Already bound to this machine.
    Matched,
    /// Bound to another machine.
    Mismatch,
}

/// Client-side verifier against the SQLite license store.
pub struct SqliteAuthority {
    vault: CredentialVault,
    clock: Arc<dyn Clock>,
    connect_timeout: Duration,
}

impl SqliteAuthority {
    /// Creates an authority that connects with the vault's DSN.
    #[must_use]
    pub fn new(vault: CredentialVault, clock: Arc<dyn Clock>, connect_timeout: Duration) -> Self {
        Self {
            vault,
            clock,
            connect_timeout,
        }
    }

    /// Creates an authority from configuration.
    #[must_use]
    pub fn from_config(config: &LicenseConfig, clock: Arc<dyn Clock>) -> Self {
        Self::new(
            CredentialVault::new(&config.credential),
            clock,
            config.connect_timeout(),
        )
    }

    /// Opens a connection and makes sure the file really is a database.
    fn connect(&self) -> rusqlite::Result<Connection> {
        let dsn = self.vault.reveal();
        let conn = Connection::open_with_flags(
            dsn.as_str(),
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(self.connect_timeout)?;
        conn.query_row("SELECT count(*) FROM sqlite_master", [], |_| Ok(()))?;
        Ok(conn)
    }

    fn bind_device(
        conn: &Connection,
        code: &str,
        fingerprint: &HardwareFingerprint,
        current: Option<String>,
    ) -> rusqlite::Result<Binding> {
        if let Some(bound) = current.filter(|d| !d.is_empty()) {
            return Ok(if bound == fingerprint.id() {
                Binding::Matched
            } else {
                Binding::Mismatch
            });
        }

        let affected = conn.execute(
            "UPDATE licenses SET device_id = ?1
             WHERE code = ?2 AND (device_id IS NULL OR device_id = '')",
            params![fingerprint.id(), code],
        )?;
        if affected == 1 {
            return Ok(Binding::Bound);
        }

        // Someone bound the code between our read and our write.
        let winner: Option<String> = conn.query_row(
            "SELECT device_id FROM licenses WHERE code = ?1",
            params![code],
            |row| row.get(0),
        )?;
        Ok(if winner.as_deref() == Some(fingerprint.id()) {
            Binding::Matched
        } else {
            Binding::Mismatch
        })
    }
}

impl LicenseAuthority for SqliteAuthority {
    fn verify(&self, code: &str, fingerprint: &HardwareFingerprint) -> Verification {
        let conn = match self.connect() {
            Ok(conn) => conn,
            Err(e) => {
                warn!(error = %e, "license store unreachable");
                return Verification::denied(ReasonCode::ConnectionError);
            }
        };

        let row = conn
            .query_row(
                "SELECT expire_date, is_banned, device_id FROM licenses WHERE code = ?1",
                params![code],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, Option<String>>(2)?,
                    ))
                },
            )
            .optional();

        let (expire_raw, is_banned, device_id) = match row {
            Ok(Some(row)) => row,
            Ok(None) => {
                debug!(code = %redact(code), "activation code not found");
                return Verification::denied(ReasonCode::CodeNotFound);
            }
            Err(e) => {
                warn!(error = %e, "license lookup failed");
                return Verification::denied(ReasonCode::ServerError);
            }
        };

        let expire_date = match parse_date(&expire_raw) {
            Ok(date) => date,
            Err(e) => {
                warn!(error = %e, "license record has an unreadable expiry date");
                return Verification::denied(ReasonCode::ServerError);
            }
        };

        if is_banned != 0 {
            debug!(code = %redact(code), "activation code is banned");
            return Verification::denied_at(ReasonCode::Banned, expire_date);
        }

        match Self::bind_device(&conn, code, fingerprint, device_id) {
            Ok(Binding::Bound) => info!(code = %redact(code), "bound activation code to this device"),
            Ok(Binding::Matched) => {}
            Ok(Binding::Mismatch) => {
                debug!(code = %redact(code), "activation code bound to another device");
                return Verification::denied_at(ReasonCode::DeviceMismatch, expire_date);
            }
            Err(e) => {
                warn!(error = %e, "device binding failed");
                return Verification::denied_at(ReasonCode::BindFailed, expire_date);
            }
        }

        if !is_within_grace(expire_date, self.clock.now()) {
            return Verification::denied_at(ReasonCode::Expired, expire_date);
        }

        Verification::granted(expire_date)
    }
}

/// Administrative access to the license table.
pub struct LicenseStore {
    conn: Connection,
}

impl LicenseStore {
    /// Opens (or creates) a store at `path` and ensures the schema.
    pub fn open(path: &str) -> LicenseResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| LicenseError::Database(format!("failed to open license store: {e}")))?;
        Self::with_connection(conn)
    }

    /// Opens an in-memory store.
    pub fn open_in_memory() -> LicenseResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            LicenseError::Database(format!("failed to open in-memory license store: {e}"))
        })?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> LicenseResult<Self> {
        conn.execute_batch(LICENSE_SCHEMA)
            .map_err(|e| LicenseError::Database(format!("failed to init schema: {e}")))?;
        Ok(Self { conn })
    }

    /// Inserts a new record. Fails if the code already exists.
    pub fn insert(&self, record: &LicenseRecord) -> LicenseResult<()> {
        self.conn
            .execute(
                "INSERT INTO licenses (code, expire_date, is_banned, device_id)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    record.code,
                    record.expire_date.format(DATE_FORMAT).to_string(),
                    i64::from(record.is_banned),
                    record.device_id,
                ],
            )
            .map_err(|e| LicenseError::Database(format!("failed to insert license: {e}")))?;
        Ok(())
    }

    /// Fetches a record by code.
    pub fn get(&self, code: &str) -> LicenseResult<Option<LicenseRecord>> {
        let row = self
            .conn
            .query_row(
                "SELECT code, expire_date, is_banned, device_id FROM licenses WHERE code = ?1",
                params![code],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, Option<String>>(3)?,
                    ))
                },
            )
            .optional()
            .map_err(|e| LicenseError::Database(format!("failed to query license: {e}")))?;

        row.map(|(code, expire_raw, is_banned, device_id)| {
            Ok(LicenseRecord {
                code,
                expire_date: parse_date(&expire_raw)?,
                is_banned: is_banned != 0,
                device_id,
            })
        })
        .transpose()
    }

    /// Sets or clears the ban flag. Returns false if the code is unknown.
    pub fn set_banned(&self, code: &str, banned: bool) -> LicenseResult<bool> {
        let rows = self
            .conn
            .execute(
                "UPDATE licenses SET is_banned = ?1 WHERE code = ?2",
                params![i64::from(banned), code],
            )
            .map_err(|e| LicenseError::Database(format!("failed to update ban flag: {e}")))?;
        Ok(rows > 0)
    }

    /// Moves the expiry date. Returns false if the code is unknown.
    pub fn set_expiry(&self, code: &str, expire_date: NaiveDate) -> LicenseResult<bool> {
        let rows = self
            .conn
            .execute(
                "UPDATE licenses SET expire_date = ?1 WHERE code = ?2",
                params![expire_date.format(DATE_FORMAT).to_string(), code],
            )
            .map_err(|e| LicenseError::Database(format!("failed to update expiry: {e}")))?;
        Ok(rows > 0)
    }

    /// Lists every record ordered by code.
    pub fn list(&self) -> LicenseResult<Vec<LicenseRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT code, expire_date, is_banned, device_id FROM licenses ORDER BY code")
            .map_err(|e| LicenseError::Database(format!("failed to prepare list: {e}")))?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            })
            .map_err(|e| LicenseError::Database(format!("failed to list licenses: {e}")))?;

        let mut records = Vec::new();
        for row in rows {
            let (code, expire_raw, is_banned, device_id) =
                row.map_err(|e| LicenseError::Database(format!("failed to read row: {e}")))?;
            records.push(LicenseRecord {
                code,
                expire_date: parse_date(&expire_raw)?,
                is_banned: is_banned != 0,
                device_id,
            });
        }
        Ok(records)
    }
}
