//! `playout-relay` binary.

// The result JSON goes to stdout, fatal errors to stderr.
#![allow(clippy::print_stdout)]
#![allow(clippy::print_stderr)]

use std::process::ExitCode;

use clap::Parser;

use playout_relay::cli::{self, Cli};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli::run(&cli).await {
        Ok(result) => result,
        Err(e) => {
            eprintln!("playout-relay: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    match serde_json::to_string_pretty(&result) {
        Ok(rendered) => println!("{rendered}"),
        Err(e) => {
            eprintln!("playout-relay: failed to render result: {e}");
            return ExitCode::FAILURE;
        }
    }

    if result.is_error() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
