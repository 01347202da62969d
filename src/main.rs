//! ctxplumb CLI entry point

use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use ctxplumb::{run, Cli, Options};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("ctxplumb={default_level}"))),
        )
        .with_writer(std::io::stderr)
        .try_init();

    let Some(target) = cli.target else {
        let _ = Cli::command().print_help();
        println!();
        return ExitCode::SUCCESS;
    };

    let opts = Options {
        target,
        stop_at: cli.stop_at.unwrap_or_default(),
        http: cli.http,
        tags: cli.tags.unwrap_or_default(),
        work_dir: std::path::PathBuf::from("."),
    };

    match run(&opts) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            e.exit_code()
        }
    }
}
