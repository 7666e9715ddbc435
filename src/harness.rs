//! Suite and per-case orchestration.
//!
//! The harness owns the environment for the lifetime of one test run and
//! passes the shared client handle into each case explicitly; there is no
//! ambient global state. Within a case, provisioning completes before the
//! body runs and the sweep always runs after it, so bucket names can be
//! reused by the next case.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use crate::client::{ClientError, ClientHandle, build_client};
use crate::command::{CommandRunner, ProcessCommandRunner};
use crate::config::EnvironmentConfig;
use crate::environment::{EnvironmentController, EnvironmentDetails, EnvironmentError};
use crate::inject::Injector;
use crate::provision::{BucketProvisioner, ProvisionError};
use crate::sweep::{SweepError, TeardownSweeper, release_client};

/// Errors raised while launching or shutting down the harness.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Raised when the environment cannot be started or stopped.
    #[error("environment error: {0}")]
    Environment(#[from] EnvironmentError),
    /// Raised when the client handle cannot be constructed.
    #[error("client construction failed: {0}")]
    Client(#[from] ClientError),
}

/// Errors raised by a single test case run.
#[derive(Debug, Error)]
pub enum CaseError<E>
where
    E: std::error::Error + 'static,
{
    /// Raised when bucket provisioning fails; the case body never ran.
    #[error("bucket provisioning failed: {0}")]
    Provision(#[source] ProvisionError),
    /// Raised when the case body failed. When teardown also failed, the
    /// message carries a note; the body's failure is never masked.
    #[error("test case failed: {message}")]
    Case {
        /// Body failure, with a teardown note appended when teardown also
        /// failed.
        message: String,
        /// Original body failure.
        #[source]
        source: E,
    },
    /// Raised when teardown failed after a successful case body.
    #[error("teardown failed after a successful case: {0}")]
    Teardown(#[source] SweepError),
}

/// Owns the environment, the shared client handle, and the per-case
/// provision/sweep pair for one test run.
pub struct TestHarness<R: CommandRunner> {
    controller: Option<EnvironmentController<R>>,
    details: EnvironmentDetails,
    handle: Arc<ClientHandle>,
    provisioner: BucketProvisioner,
    sweeper: TeardownSweeper,
}

impl<R: CommandRunner> std::fmt::Debug for TestHarness<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestHarness")
            .field("endpoint", &self.details.endpoint)
            .finish_non_exhaustive()
    }
}

impl TestHarness<ProcessCommandRunner> {
    /// Starts the environment through the real process runner and builds
    /// the shared client handle.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Environment`] when the backend never becomes
    /// healthy (no client handle is constructed in that case) and
    /// [`HarnessError::Client`] when handle construction fails.
    pub async fn launch(config: EnvironmentConfig) -> Result<Self, HarnessError> {
        Self::launch_with_runner(config, ProcessCommandRunner).await
    }

    /// Builds a harness around an existing client handle without owning an
    /// environment. Intended for tests that substitute an in-memory store;
    /// `shutdown` then only releases the handle.
    #[must_use]
    pub fn from_client(
        handle: Arc<ClientHandle>,
        details: EnvironmentDetails,
        config: &EnvironmentConfig,
    ) -> Self {
        Self {
            controller: None,
            details,
            provisioner: Self::provisioner_for(&handle, config),
            sweeper: Self::sweeper_for(&handle, config),
            handle,
        }
    }
}

impl<R: CommandRunner> TestHarness<R> {
    /// Starts the environment with the supplied runner and builds the
    /// shared client handle.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when the environment fails to start or the
    /// client handle cannot be built; on a handle failure the environment
    /// is stopped before the error is returned.
    pub async fn launch_with_runner(
        config: EnvironmentConfig,
        runner: R,
    ) -> Result<Self, HarnessError> {
        let mut controller = EnvironmentController::new(config.clone(), runner)?;
        let details = controller.start().await?;
        let handle = match build_client(&details.endpoint, &details.credentials, &details.region) {
            Ok(handle) => Arc::new(handle),
            Err(err) => {
                controller.stop()?;
                return Err(HarnessError::Client(err));
            }
        };
        info!(endpoint = %details.endpoint, "harness ready");
        Ok(Self {
            controller: Some(controller),
            details,
            provisioner: Self::provisioner_for(&handle, &config),
            sweeper: Self::sweeper_for(&handle, &config),
            handle,
        })
    }

    fn provisioner_for(handle: &Arc<ClientHandle>, config: &EnvironmentConfig) -> BucketProvisioner {
        BucketProvisioner::new(Arc::clone(handle))
            .with_poll_interval(Duration::from_millis(config.poll_interval_ms))
            .with_confirm_timeout(Duration::from_secs(config.confirm_timeout_secs))
    }

    fn sweeper_for(handle: &Arc<ClientHandle>, config: &EnvironmentConfig) -> TeardownSweeper {
        TeardownSweeper::new(Arc::clone(handle))
            .with_retry_limit(config.sweep_retry_limit)
            .with_retry_backoff(Duration::from_millis(config.sweep_retry_backoff_ms))
    }

    /// Endpoint, credentials, and published config overrides of the run.
    #[must_use]
    pub const fn details(&self) -> &EnvironmentDetails {
        &self.details
    }

    /// Clones the shared client handle.
    #[must_use]
    pub fn client(&self) -> Arc<ClientHandle> {
        Arc::clone(&self.handle)
    }

    /// Builds an injector distributing the live handle to slots registered
    /// under `marker`.
    #[must_use]
    pub fn injector(&self, marker: impl Into<String>) -> Injector {
        Injector::new(Arc::clone(&self.handle), marker)
    }

    /// Runs one test case: provision the named buckets, execute the body
    /// with the shared handle, then sweep the buckets regardless of the
    /// body's outcome.
    ///
    /// When provisioning fails mid-sequence, a best-effort sweep cleans up
    /// whatever was created so the next case can reuse the names.
    ///
    /// # Errors
    ///
    /// Returns [`CaseError::Provision`] when setup fails,
    /// [`CaseError::Case`] when the body fails (a simultaneous teardown
    /// failure is appended to the message, never masking the body's error),
    /// and [`CaseError::Teardown`] when only the sweep fails.
    pub async fn run_case<T, E, F, Fut>(
        &self,
        buckets: &[String],
        body: F,
    ) -> Result<T, CaseError<E>>
    where
        E: std::error::Error + 'static,
        F: FnOnce(Arc<ClientHandle>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Err(err) = self.provisioner.provision(buckets).await {
            if let Err(sweep_err) = self.sweeper.teardown(buckets).await {
                tracing::error!(error = %sweep_err, "cleanup after failed provisioning");
            }
            return Err(CaseError::Provision(err));
        }

        let outcome = body(Arc::clone(&self.handle)).await;
        let sweep_outcome = self.sweeper.teardown(buckets).await;

        match (outcome, sweep_outcome) {
            (Ok(value), Ok(_)) => Ok(value),
            (Ok(_), Err(err)) => Err(CaseError::Teardown(err)),
            (Err(source), sweep) => {
                let message = append_teardown_note(source.to_string(), sweep.err().as_ref());
                Err(CaseError::Case { message, source })
            }
        }
    }

    /// Releases the client handle and stops the environment. The
    /// controller's `Drop` backstops an aborted suite, so skipping this on
    /// a panic only delays the container removal.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Environment`] when the container runtime
    /// fails to remove the container.
    pub fn shutdown(mut self) -> Result<(), HarnessError> {
        release_client(&self.handle);
        if let Some(controller) = self.controller.as_mut() {
            controller.stop()?;
        }
        Ok(())
    }
}

fn append_teardown_note<E: std::fmt::Display>(message: String, teardown_error: Option<&E>) -> String {
    teardown_error.map_or_else(
        || message.clone(),
        |teardown| format!("{message} (teardown also failed: {teardown})"),
    )
}
