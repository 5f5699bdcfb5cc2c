//! stroo CLI
//!
//! Entry point for the stroo generator. Loads a package, builds the model of
//! its declarations and renders a template for the selected one.

mod app;
mod args;
mod error;

use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use stroo_gen::Output;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use args::Args;

fn main() -> ExitCode {
    let args = Args::parse();

    // Generated text goes to stdout in test mode, so logs stay on stderr.
    let level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .init();

    match app::run(&args) {
        Ok((output, code)) => {
            match output {
                Output::Written(path) => info!("Generated {}", path.display()),
                Output::DryRun(text) => {
                    let mut stdout = std::io::stdout().lock();
                    if let Err(err) = stdout.write_all(text.as_bytes()).and_then(|()| stdout.flush()) {
                        error!("Failed to print the result: {}", err);
                        return ExitCode::FAILURE;
                    }
                }
            }
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
