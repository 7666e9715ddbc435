//! Ephemeral environment controller for the object-storage emulator.
//!
//! The controller owns exactly one disposable container per suite: it starts
//! the emulator through the container runtime, discovers the mapped host
//! port, polls the health endpoint until the object store is ready, and
//! removes the container on `stop` (or on `Drop`, so an aborted suite never
//! leaks it). Containers carry a per-run label the janitor uses to find
//! strays from crashed processes.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::time::{Duration, Instant};

use serde_json::Value;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{info, warn};
use uuid::Uuid;

use crate::client::Credentials;
use crate::command::{CommandError, CommandOutput, CommandRunner, ProcessCommandRunner};
use crate::config::{ConfigError, EnvironmentConfig};

/// Label key applied to every container the controller starts.
pub const RUN_LABEL_KEY: &str = "drydock-run";

/// Health-check path exposed by the emulator.
pub const HEALTH_PATH: &str = "/_localstack/health";

const HEALTH_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Lifecycle states of the environment.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EnvironmentState {
    /// Not yet started.
    Stopped,
    /// Container launched, health not yet confirmed.
    Starting,
    /// Healthy and serving requests.
    Running,
    /// Stopped after use; the controller cannot be started again.
    Finished,
}

impl EnvironmentState {
    /// Human-readable state name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Finished => "finished",
        }
    }
}

/// Endpoint, credentials, and published settings of a running environment.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EnvironmentDetails {
    /// Base URL of the emulated backend on the host.
    pub endpoint: String,
    /// Access credentials clients must present.
    pub credentials: Credentials,
    /// Region identifier clients must use.
    pub region: String,
    /// Opaque settings the harness publishes to the system under test for
    /// the duration of the run.
    pub config_overrides: BTreeMap<String, String>,
}

/// Errors raised by the environment controller.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum EnvironmentError {
    /// Raised when the high-level configuration is incomplete.
    #[error("configuration error: {0}")]
    Config(String),
    /// Raised when `start` is called on a controller that is not stopped.
    #[error("environment cannot start from state {state}")]
    InvalidState {
        /// State the controller was in.
        state: &'static str,
    },
    /// Raised when the backend never reports healthy within the startup
    /// timeout. Fatal to the run.
    #[error("environment at {endpoint} did not become healthy within {waited_secs}s")]
    Unavailable {
        /// Endpoint that was being polled.
        endpoint: String,
        /// Seconds waited before giving up.
        waited_secs: u64,
    },
    /// Raised when the container runtime returns a non-zero exit status.
    #[error("{program} {operation} exited with status {status_text}: {stderr}")]
    Command {
        /// Container-runtime operation being attempted.
        operation: String,
        /// Program that failed.
        program: String,
        /// Human readable representation of the exit status.
        status_text: String,
        /// Stderr captured from the command.
        stderr: String,
    },
    /// Raised when the mapped host port cannot be read from the runtime.
    #[error("could not determine host port for container {container_id}: {output}")]
    Port {
        /// Container whose port mapping was queried.
        container_id: String,
        /// Raw output that failed to parse.
        output: String,
    },
    /// Raised when the HTTP client for health polling cannot be built.
    #[error("health-check client error: {message}")]
    Http {
        /// Underlying client error.
        message: String,
    },
    /// Raised when command execution fails.
    #[error(transparent)]
    Runner(#[from] CommandError),
}

impl From<ConfigError> for EnvironmentError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value.to_string())
    }
}

/// Starts and stops the disposable emulator container.
#[derive(Debug)]
pub struct EnvironmentController<R: CommandRunner> {
    config: EnvironmentConfig,
    runner: R,
    http: reqwest::Client,
    state: EnvironmentState,
    container_id: Option<String>,
    run_id: String,
}

impl EnvironmentController<ProcessCommandRunner> {
    /// Creates a controller wired to the real process runner.
    ///
    /// # Errors
    ///
    /// Returns [`EnvironmentError`] when configuration validation fails or
    /// the health-check HTTP client cannot be built.
    pub fn with_process_runner(config: EnvironmentConfig) -> Result<Self, EnvironmentError> {
        Self::new(config, ProcessCommandRunner)
    }
}

impl<R: CommandRunner> EnvironmentController<R> {
    /// Creates a new controller using the provided configuration and runner.
    ///
    /// # Errors
    ///
    /// Returns [`EnvironmentError::Config`] when validation fails and
    /// [`EnvironmentError::Http`] when the health-check client cannot be
    /// built.
    pub fn new(config: EnvironmentConfig, runner: R) -> Result<Self, EnvironmentError> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(HEALTH_REQUEST_TIMEOUT)
            .build()
            .map_err(|err| EnvironmentError::Http {
                message: err.to_string(),
            })?;
        Ok(Self {
            config,
            runner,
            http,
            state: EnvironmentState::Stopped,
            container_id: None,
            run_id: Uuid::new_v4().simple().to_string(),
        })
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> EnvironmentState {
        self.state
    }

    /// Identifier of the running container, when one exists.
    #[must_use]
    pub fn container_id(&self) -> Option<&str> {
        self.container_id.as_deref()
    }

    /// Launches the emulator and blocks until its health endpoint reports
    /// the object store ready.
    ///
    /// # Errors
    ///
    /// Returns [`EnvironmentError::InvalidState`] when the controller is not
    /// stopped, [`EnvironmentError::Unavailable`] when the backend does not
    /// become healthy within the startup timeout (the container is removed
    /// best-effort first), and command or port errors when the container
    /// runtime misbehaves.
    pub async fn start(&mut self) -> Result<EnvironmentDetails, EnvironmentError> {
        if self.state != EnvironmentState::Stopped {
            return Err(EnvironmentError::InvalidState {
                state: self.state.as_str(),
            });
        }
        self.state = EnvironmentState::Starting;

        let container_id = match self.launch_container() {
            Ok(id) => id,
            Err(err) => {
                self.state = EnvironmentState::Stopped;
                return Err(err);
            }
        };
        self.container_id = Some(container_id.clone());
        info!(container = %container_id, image = %self.config.image, "container started");

        let host_port = match self.discover_host_port(&container_id) {
            Ok(port) => port,
            Err(err) => {
                self.remove_container_best_effort();
                self.state = EnvironmentState::Finished;
                return Err(err);
            }
        };
        let endpoint = format!("http://127.0.0.1:{host_port}");

        if !self.wait_until_healthy(&endpoint).await {
            self.remove_container_best_effort();
            self.state = EnvironmentState::Finished;
            return Err(EnvironmentError::Unavailable {
                endpoint,
                waited_secs: self.config.startup_timeout_secs,
            });
        }

        self.state = EnvironmentState::Running;
        info!(%endpoint, "environment healthy");
        Ok(EnvironmentDetails {
            endpoint,
            credentials: Credentials {
                access_key: self.config.access_key.clone(),
                secret_key: self.config.secret_key.clone(),
            },
            region: self.config.region.clone(),
            config_overrides: self.config.override_map(),
        })
    }

    /// Removes the container. Stopping an already-stopped or never-started
    /// environment is a no-op, never an error.
    ///
    /// # Errors
    ///
    /// Returns [`EnvironmentError::Command`] when the container runtime
    /// fails to remove a live container.
    pub fn stop(&mut self) -> Result<(), EnvironmentError> {
        let Some(container_id) = self.container_id.take() else {
            return Ok(());
        };
        self.state = EnvironmentState::Finished;
        let args = vec![
            OsString::from("rm"),
            OsString::from("-f"),
            OsString::from(&container_id),
        ];
        self.run_docker(&args, "rm")?;
        info!(container = %container_id, "container removed");
        Ok(())
    }

    fn launch_container(&self) -> Result<String, EnvironmentError> {
        let args = vec![
            OsString::from("run"),
            OsString::from("-d"),
            OsString::from("--label"),
            OsString::from(format!("{RUN_LABEL_KEY}={}", self.run_id)),
            OsString::from("-e"),
            OsString::from("SERVICES=s3"),
            OsString::from("-p"),
            OsString::from(format!("127.0.0.1:0:{}", self.config.service_port)),
            OsString::from(&self.config.image),
        ];
        let output = self.run_docker(&args, "run")?;
        Ok(output.stdout.trim().to_owned())
    }

    fn discover_host_port(&self, container_id: &str) -> Result<u16, EnvironmentError> {
        let args = vec![
            OsString::from("port"),
            OsString::from(container_id),
            OsString::from(format!("{}/tcp", self.config.service_port)),
        ];
        let output = self.run_docker(&args, "port")?;
        output
            .stdout
            .lines()
            .find_map(|line| {
                line.rsplit_once(':')
                    .and_then(|(_, port)| port.trim().parse::<u16>().ok())
            })
            .ok_or_else(|| EnvironmentError::Port {
                container_id: container_id.to_owned(),
                output: output.stdout.clone(),
            })
    }

    async fn wait_until_healthy(&self, endpoint: &str) -> bool {
        let url = format!("{endpoint}{HEALTH_PATH}");
        let deadline = Instant::now() + Duration::from_secs(self.config.startup_timeout_secs);
        let interval = Duration::from_millis(self.config.poll_interval_ms);

        while Instant::now() <= deadline {
            if self.probe_health(&url).await {
                return true;
            }
            sleep(interval).await;
        }
        false
    }

    /// Polls the health endpoint once. Request failures and unparseable
    /// bodies count as "not ready yet", not as fatal errors.
    async fn probe_health(&self, url: &str) -> bool {
        let Ok(response) = self.http.get(url).send().await else {
            return false;
        };
        if !response.status().is_success() {
            return false;
        }
        let Ok(body) = response.json::<Value>().await else {
            return false;
        };
        body.get("services")
            .and_then(|services| services.get("s3"))
            .and_then(Value::as_str)
            .is_some_and(|status| matches!(status, "available" | "running"))
    }

    fn remove_container_best_effort(&mut self) {
        let Some(container_id) = self.container_id.take() else {
            return;
        };
        let args = vec![
            OsString::from("rm"),
            OsString::from("-f"),
            OsString::from(&container_id),
        ];
        if self.run_docker(&args, "rm").is_err() {
            warn!(container = %container_id, "failed to remove container");
        }
    }

    fn run_docker(
        &self,
        args: &[OsString],
        operation: &str,
    ) -> Result<CommandOutput, EnvironmentError> {
        let output = self.runner.run(&self.config.docker_bin, args)?;
        if output.is_success() {
            return Ok(output);
        }
        let status_text = output
            .code
            .map_or_else(|| String::from("unknown"), |code| code.to_string());
        Err(EnvironmentError::Command {
            operation: operation.to_owned(),
            program: self.config.docker_bin.clone(),
            status_text,
            stderr: output.stderr,
        })
    }
}

impl<R: CommandRunner> Drop for EnvironmentController<R> {
    fn drop(&mut self) {
        self.remove_container_best_effort();
    }
}
