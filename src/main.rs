//! Binary entry point for the drydock CLI.

use std::io::{self, Write};
use std::process;

use clap::Parser;
use thiserror::Error;

use drydock::{ContainerJanitor, JanitorConfig, JanitorError};

mod cli;

use cli::{Cli, SweepCommand};

#[derive(Debug, Error)]
enum CliError {
    #[error("janitor error: {0}")]
    Janitor(#[from] JanitorError),
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

fn main() {
    let cli = Cli::parse();
    let exit_code = match dispatch(cli) {
        Ok(code) => code,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn dispatch(cli: Cli) -> Result<i32, CliError> {
    match cli {
        Cli::Sweep(command) => sweep_command(command),
    }
}

fn sweep_command(args: SweepCommand) -> Result<i32, CliError> {
    let config = JanitorConfig::new(args.docker_bin)?;
    let janitor = ContainerJanitor::with_process_runner(config);
    let summary = janitor.sweep()?;
    writeln!(
        io::stdout(),
        "janitor sweep complete: removed_containers={}",
        summary.removed_containers
    )?;
    Ok(0)
}

fn report_error(err: &CliError) {
    writeln!(io::stderr(), "drydock: {err}").ok();
}
