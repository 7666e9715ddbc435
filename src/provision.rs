//! Per-test-case bucket provisioning.

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::time::sleep;
use tracing::info;

use crate::client::{ClientError, ClientHandle};
use crate::store::{ObjectStore, StoreError};

const POLL_INTERVAL: Duration = Duration::from_millis(250);
const CONFIRM_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors raised while provisioning buckets.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ProvisionError {
    /// Raised when a bucket with the same name already exists. This is a
    /// sequencing violation (a missing teardown), surfaced as-is and never
    /// retried.
    #[error("bucket {bucket} already exists; teardown did not run")]
    AlreadyExists {
        /// Bucket that was being created.
        bucket: String,
    },
    /// Raised when a created bucket is never confirmed within the wait
    /// budget.
    #[error("bucket {bucket} was not confirmed before the provision timeout")]
    Timeout {
        /// Bucket that was being confirmed.
        bucket: String,
    },
    /// Raised when the client handle has been released.
    #[error(transparent)]
    Client(#[from] ClientError),
    /// Raised when the store fails for reasons other than sequencing.
    #[error("provisioning {bucket} failed: {source}")]
    Store {
        /// Bucket being provisioned.
        bucket: String,
        /// Underlying store failure.
        source: StoreError,
    },
}

/// Creates named buckets and blocks until each is confirmed to exist.
#[derive(Clone, Debug)]
pub struct BucketProvisioner {
    handle: Arc<ClientHandle>,
    poll_interval: Duration,
    confirm_timeout: Duration,
}

impl BucketProvisioner {
    /// Creates a provisioner over the shared client handle.
    #[must_use]
    pub const fn new(handle: Arc<ClientHandle>) -> Self {
        Self {
            handle,
            poll_interval: POLL_INTERVAL,
            confirm_timeout: CONFIRM_TIMEOUT,
        }
    }

    /// Overrides the confirmation polling interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Overrides the confirmation wait budget.
    ///
    /// This is primarily used by tests to keep timeout scenarios fast.
    #[must_use]
    pub const fn with_confirm_timeout(mut self, timeout: Duration) -> Self {
        self.confirm_timeout = timeout;
        self
    }

    /// Provisions every named bucket, in order.
    ///
    /// For each name a create-bucket request is issued, then an existence
    /// check is polled until the bucket is confirmed. Buckets share no
    /// state and could be provisioned concurrently; the sequential order
    /// exists so logs are deterministic.
    ///
    /// Creation is not idempotent across re-runs: the caller must tear down
    /// in the matching after-hook before provisioning the same name again.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::AlreadyExists`] on a name collision,
    /// [`ProvisionError::Timeout`] when confirmation never arrives, and
    /// [`ProvisionError::Store`] for other backend failures.
    pub async fn provision(&self, buckets: &[String]) -> Result<(), ProvisionError> {
        let store = self.handle.store()?;
        for bucket in buckets {
            store
                .create_bucket(bucket)
                .await
                .map_err(|err| match err {
                    StoreError::AlreadyExists { bucket: name } => {
                        ProvisionError::AlreadyExists { bucket: name }
                    }
                    other => ProvisionError::Store {
                        bucket: bucket.clone(),
                        source: other,
                    },
                })?;

            self.confirm(bucket, store.as_ref()).await?;
            info!(%bucket, "bucket confirmed");
        }
        Ok(())
    }

    async fn confirm(&self, bucket: &str, store: &dyn ObjectStore) -> Result<(), ProvisionError> {
        let deadline = Instant::now() + self.confirm_timeout;
        while Instant::now() <= deadline {
            match store.bucket_exists(bucket).await {
                Ok(true) => return Ok(()),
                // Not visible yet, or a transient fault: poll again.
                Ok(false) => {}
                Err(err) if err.is_transient() => {}
                Err(err) => {
                    return Err(ProvisionError::Store {
                        bucket: bucket.to_owned(),
                        source: err,
                    });
                }
            }
            sleep(self.poll_interval).await;
        }
        Err(ProvisionError::Timeout {
            bucket: bucket.to_owned(),
        })
    }
}
