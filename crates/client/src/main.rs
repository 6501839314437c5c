//! Medcart command line client

use std::{io, process};

use tracing::error;
use tracing_subscriber::EnvFilter;

use medcart_client::{cli, config::ClientConfig};

#[tokio::main]
async fn main() {
    // Load configuration from .env and CLI arguments
    let config = ClientConfig::load().unwrap_or_else(|e| {
        #[expect(
            clippy::print_stderr,
            reason = "logging not initialized yet, must use eprintln for config errors"
        )]
        {
            eprintln!("{e}");
        }

        process::exit(2);
    });

    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    if let Err(e) = cli::run(config, io::stdout().lock()).await {
        error!(error = %e, "command failed");

        #[expect(
            clippy::print_stderr,
            reason = "the failure is reported to the user even when logging is filtered"
        )]
        {
            eprintln!("error: {e}");
        }

        process::exit(1);
    }
}
