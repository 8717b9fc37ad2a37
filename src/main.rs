//! restudy — terminal client for the Recycle Study review service.
//!
//! Registers this machine as a device, polls for email verification, and
//! saves URLs for spaced-repetition review. All scheduling lives on the
//! server; locally there is only a three-field identity record.

mod api;
mod app;
mod cli;
mod config;
mod error;
mod store;
mod ui;

use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    cli::run(cli::Cli::parse()).await
}

/// Logs go to stderr so rendered output stays clean; level via
/// `RESTUDY_LOG` (default `warn`).
fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_env("RESTUDY_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
