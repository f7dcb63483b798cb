//! `cdnctl` - command line entry point for CDN Orchestrator
//!
//! Offline `sign`/`verify` print or check SDK-HMAC-SHA256 signatures;
//! `call` and `domains` talk to the API.
//!
//! Logs go to stderr (`RUST_LOG` overrides the filter); results go to stdout.

mod cli;
mod commands;

use std::process::ExitCode;

use clap::Parser;
use cli::Cli;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing to stderr (stdout carries command output)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .without_time()
                .with_target(false),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let Cli { global, command } = Cli::parse();

    match commands::run(&global, command).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
