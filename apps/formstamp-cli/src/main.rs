//! fill-date binary
//!
//! Logs go to stderr; stdout only carries the success line.

use std::process::ExitCode;

use chrono::Local;
use clap::Parser;
use formstamp_cli::{run, Args};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> ExitCode {
    let args = Args::parse();

    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(level.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(&args, Local::now().date_naive()) {
        Ok(outcome) => {
            println!("{}", outcome.summary(&args));
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::from(err.exit_code())
        }
    }
}
