//! Stray-container janitor.
//!
//! A crashed test process never reaches its teardown, so the container it
//! started survives. Every container the controller launches carries the
//! drydock run label; the janitor finds containers with that label, removes
//! them, and fails if anything remains afterwards.

use std::ffi::OsString;

use thiserror::Error;

use crate::command::{CommandError, CommandOutput, CommandRunner, ProcessCommandRunner};
use crate::environment::RUN_LABEL_KEY;

/// Default container runtime binary name.
pub const DEFAULT_DOCKER_BIN: &str = "docker";

/// Configuration for a janitor sweep.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct JanitorConfig {
    /// Path to the container runtime binary.
    pub docker_bin: String,
}

impl JanitorConfig {
    /// Constructs a config, trimming whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`JanitorError::InvalidConfig`] when the binary path is blank.
    pub fn new(docker_bin: impl Into<String>) -> Result<Self, JanitorError> {
        let trimmed_docker_bin = docker_bin.into().trim().to_owned();
        if trimmed_docker_bin.is_empty() {
            return Err(JanitorError::InvalidConfig {
                field: String::from("docker_bin"),
            });
        }
        Ok(Self {
            docker_bin: trimmed_docker_bin,
        })
    }
}

/// Summary of janitor work.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct JanitorSummary {
    /// Number of stray containers removed during the sweep.
    pub removed_containers: usize,
}

/// Errors returned by the janitor.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum JanitorError {
    /// Raised when configuration is missing required values.
    #[error("missing {field}")]
    InvalidConfig {
        /// Name of the missing or invalid field.
        field: String,
    },
    /// Raised when the container runtime returns a non-zero exit status.
    #[error("{program} exited with status {status_text}: {stderr}")]
    CommandFailure {
        /// Program that failed.
        program: String,
        /// Exit status reported by the OS.
        status: Option<i32>,
        /// Human readable representation of the exit status.
        status_text: String,
        /// Stderr captured from the command.
        stderr: String,
    },
    /// Raised when containers remain after the sweep.
    #[error("containers remain after janitor sweep: {message}")]
    NotClean {
        /// Human-readable description of what remains.
        message: String,
    },
    /// Raised when command execution fails.
    #[error(transparent)]
    Runner(#[from] CommandError),
}

/// Removes labelled stray containers through the container runtime.
#[derive(Clone, Debug)]
pub struct ContainerJanitor<R: CommandRunner> {
    config: JanitorConfig,
    runner: R,
}

impl ContainerJanitor<ProcessCommandRunner> {
    /// Creates a janitor wired to the real process runner.
    #[must_use]
    pub const fn with_process_runner(config: JanitorConfig) -> Self {
        Self::new(config, ProcessCommandRunner)
    }
}

impl<R: CommandRunner> ContainerJanitor<R> {
    /// Creates a new janitor using the provided configuration and runner.
    #[must_use]
    pub const fn new(config: JanitorConfig, runner: R) -> Self {
        Self { config, runner }
    }

    /// Performs a sweep and returns how many containers were removed.
    ///
    /// The sweep lists labelled containers, force-removes each, then lists
    /// again and fails if any remain.
    ///
    /// # Errors
    ///
    /// Returns [`JanitorError`] when the container runtime fails or
    /// containers remain after removal attempts.
    pub fn sweep(&self) -> Result<JanitorSummary, JanitorError> {
        let strays = self.list_containers()?;
        for container_id in &strays {
            self.remove_container(container_id)?;
        }

        let remaining = self.list_containers()?;
        if !remaining.is_empty() {
            return Err(JanitorError::NotClean {
                message: remaining.join(", "),
            });
        }

        Ok(JanitorSummary {
            removed_containers: strays.len(),
        })
    }

    /// Checks command output and converts failure to `JanitorError`.
    fn check_docker_output(&self, output: CommandOutput) -> Result<CommandOutput, JanitorError> {
        if output.is_success() {
            return Ok(output);
        }

        let status_text = output
            .code
            .map_or_else(|| String::from("unknown"), |code| code.to_string());
        Err(JanitorError::CommandFailure {
            program: self.config.docker_bin.clone(),
            status: output.code,
            status_text,
            stderr: output.stderr,
        })
    }

    fn run_docker(&self, args: &[OsString]) -> Result<CommandOutput, JanitorError> {
        let output = self.runner.run(&self.config.docker_bin, args)?;
        self.check_docker_output(output)
    }

    fn list_containers(&self) -> Result<Vec<String>, JanitorError> {
        let args = vec![
            OsString::from("ps"),
            OsString::from("-aq"),
            OsString::from("--filter"),
            OsString::from(format!("label={RUN_LABEL_KEY}")),
        ];
        let output = self.run_docker(&args)?;
        Ok(output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(ToOwned::to_owned)
            .collect())
    }

    fn remove_container(&self, container_id: &str) -> Result<CommandOutput, JanitorError> {
        let args = vec![
            OsString::from("rm"),
            OsString::from("-f"),
            OsString::from(container_id),
        ];
        self.run_docker(&args)
    }
}

#[cfg(test)]
mod tests;
