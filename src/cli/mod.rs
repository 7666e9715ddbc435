//! Command-line interface definitions for the `drydock` binary.
//!
//! This module centralises the clap parser structures so both the main
//! binary and the build script can reuse them when generating the manual
//! page.

use clap::Parser;

/// Top-level CLI for the `drydock` binary.
#[derive(Debug, Parser)]
#[command(
    name = "drydock",
    about = "Manage ephemeral object-storage test environments",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Remove stray environment containers left behind by crashed runs.
    #[command(
        name = "sweep",
        about = "Remove stray environment containers left behind by crashed runs"
    )]
    Sweep(SweepCommand),
}

/// Arguments for the `drydock sweep` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct SweepCommand {
    /// Path to the container runtime binary.
    #[arg(long, value_name = "BIN", default_value = "docker")]
    pub(crate) docker_bin: String,
}
