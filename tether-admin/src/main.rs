//! Tether license store administration.
//!
//! Usage:
//!   tether-admin --db licenses.sqlite add ABC123 --expires 2099-01-01

use anyhow::Result;
use clap::Parser;
use tether_admin::{run, Cli};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    run(&cli, &mut std::io::stdout().lock())
}
