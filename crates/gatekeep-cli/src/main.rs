//! gatekeep - command-line front-end for the authentication session core.
//!
//! Each invocation restores the session from the configured credential
//! store, runs one command against the auth gateway, and prints the
//! resulting session.

mod commands;

use std::io;

use anyhow::Result;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use gatekeep_core::{Config, HttpAuthGateway, SessionManager};

use commands::Command;

const USAGE: &str = "\
Usage: gatekeep <command>

Commands:
  status                      Show the restored session
  sign-in [email]             Sign in (password from GATEKEEP_PASSWORD or prompt)
  sign-up <username> <email>  Register a new account
  sign-out                    Forget the stored credential
  whoami                      Fetch the signed-in user's profile
  verify-email <token>        Confirm an email address
  forgot-password <email>     Request a password reset link
  reset-password <token>      Set a new password (prompted)";

/// Initialize the tracing subscriber for logging.
/// The returned guard flushes the log file and must live until exit.
fn init_tracing(config: &Config) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match config.log_dir {
        Some(ref dir) => {
            let appender = tracing_appender::rolling::daily(dir, "gatekeep.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match Command::parse(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{}\n\n{}", e, USAGE);
            std::process::exit(2);
        }
    };

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config, using defaults: {}", e);
            Config::default()
        }
    };

    let _log_guard = init_tracing(&config);
    info!(backend = %config.credential_backend, api = %config.api_base_url, "gatekeep starting");

    let store = config.open_credential_store()?;
    let manager = SessionManager::open(store, |reader| HttpAuthGateway::new(&config, reader))?;

    commands::run(command, &manager, &config).await
}
