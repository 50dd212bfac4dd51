//! Command definitions and handlers for `tether-admin`.
//!
//! Codes are created here, out of band, and only ever bound by clients.
//! No command clears a device binding.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use tether_license::{LicenseRecord, LicenseStore};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "tether-admin")]
#[command(about = "Manage activation codes in a Tether license store")]
pub struct Cli {
    /// Path to the SQLite license store
    #[arg(long, default_value = "licenses.sqlite")]
    pub db: PathBuf,

    /// Enable verbose debug logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create the store and its schema
    Init,
    /// Add a new activation code
    Add {
        #[arg(value_parser = parse_code)]
        code: String,
        /// Expiry date, YYYY-MM-DD
        #[arg(long, value_parser = parse_date)]
        expires: NaiveDate,
    },
    /// Move the expiry date of an existing code
    Extend {
        #[arg(value_parser = parse_code)]
        code: String,
        /// New expiry date, YYYY-MM-DD
        #[arg(long, value_parser = parse_date)]
        expires: NaiveDate,
    },
    /// Ban a code
    Ban {
        #[arg(value_parser = parse_code)]
        code: String,
    },
    /// Lift a ban
    Unban {
        #[arg(value_parser = parse_code)]
        code: String,
    },
    /// Print one record as JSON
    Show {
        #[arg(value_parser = parse_code)]
        code: String,
    },
    /// List every record
    List,
}

/// Codes are pasted by hand; surrounding whitespace is never part of one.
fn parse_code(raw: &str) -> Result<String, String> {
    let code = raw.trim();
    if code.is_empty() {
        return Err("activation code must not be empty".to_string());
    }
    Ok(code.to_string())
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| format!("expected YYYY-MM-DD: {e}"))
}

fn open_store(cli: &Cli) -> Result<LicenseStore> {
    let path = cli
        .db
        .to_str()
        .context("Store path is not valid UTF-8")?;
    LicenseStore::open(path).with_context(|| format!("Failed to open {}", cli.db.display()))
}

/// Executes `cli`, writing human-readable output to `out`.
pub fn run(cli: &Cli, out: &mut impl Write) -> Result<()> {
    let store = open_store(cli)?;

    match &cli.command {
        Command::Init => {
            info!(db = %cli.db.display(), "license store ready");
            writeln!(out, "Initialized {}", cli.db.display())?;
        }
        Command::Add { code, expires } => {
            store
                .insert(&LicenseRecord::new(code, *expires))
                .with_context(|| format!("Failed to add {code}"))?;
            info!(code = %code, %expires, "code added");
            writeln!(out, "Added {code}, expires {expires}")?;
        }
        Command::Extend { code, expires } => {
            if !store.set_expiry(code, *expires).context("Failed to update expiry")? {
                bail!("No such code: {code}");
            }
            writeln!(out, "{code} now expires {expires}")?;
        }
        Command::Ban { code } => {
            if !store.set_banned(code, true).context("Failed to ban")? {
                bail!("No such code: {code}");
            }
            writeln!(out, "Banned {code}")?;
        }
        Command::Unban { code } => {
            if !store.set_banned(code, false).context("Failed to unban")? {
                bail!("No such code: {code}");
            }
            writeln!(out, "Unbanned {code}")?;
        }
        Command::Show { code } => {
            let record = store
                .get(code)
                .context("Failed to read record")?
                .with_context(|| format!("No such code: {code}"))?;
            writeln!(out, "{}", serde_json::to_string_pretty(&record)?)?;
        }
        Command::List => {
            let records = store.list().context("Failed to list records")?;
            for record in &records {
                writeln!(out, "{}", format_row(record))?;
            }
            writeln!(out, "{} code(s)", records.len())?;
        }
    }
    Ok(())
}

fn format_row(record: &LicenseRecord) -> String {
    let device = record
        .device_id
        .as_deref()
        .filter(|d| !d.is_empty())
        .unwrap_or("-");
    let banned = if record.is_banned { "banned" } else { "active" };
    format!("{:<24} {} {:<7} {device}", record.code, record.expire_date, banned)
}
