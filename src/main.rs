// Allow common clippy pedantic lints
#![allow(clippy::must_use_candidate)]

//! Relay CDK CLI
//!
//! Command-line interface for running connectors

use clap::Parser;
use relay_cdk::cli::{Cli, Runner};
use relay_cdk::logger::{init_tracing, install_panic_hook, RedactingFormatter, Secrets};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Diagnostics share the redaction context with protocol LOG messages
    let secrets = Secrets::default();
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    init_tracing(secrets.clone(), level);
    install_panic_hook(RedactingFormatter::new(secrets.clone()));

    let runner = Runner::new(cli, secrets);

    if runner.run().await.is_err() {
        // The fault has already been reported as a FATAL LOG message
        std::process::exit(1);
    }
}
