//! Per-test-case teardown: empty every provisioned bucket, then delete it.
//!
//! Listing is paginated and truncation-prone, so the sweeper keeps listing
//! and deleting until the page it just received reports no further pages;
//! only then is the bucket itself deleted. Emptiness before delete is a hard
//! invariant, not an optimisation.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{error, info};

use crate::client::{ClientError, ClientHandle};
use crate::store::{ObjectStore, StoreFuture};

const RETRY_LIMIT: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(200);

/// Counts of work performed by a sweep.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SweepSummary {
    /// Number of objects deleted across all buckets.
    pub deleted_objects: usize,
    /// Number of buckets deleted.
    pub deleted_buckets: usize,
}

/// A single bucket the sweep could not clean.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SweepFailure {
    /// Bucket that could not be cleaned.
    pub bucket: String,
    /// Store operation that failed.
    pub operation: String,
    /// Underlying failure description.
    pub message: String,
}

/// Errors raised by the teardown sweeper.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum SweepError {
    /// Raised when the client handle has been released.
    #[error(transparent)]
    Client(#[from] ClientError),
    /// Raised when one or more buckets could not be cleaned. The sweep
    /// attempts every bucket before reporting, so a failure on one bucket
    /// never leaves later buckets untouched.
    #[error("teardown incomplete: {} bucket(s) failed", failures.len())]
    Incomplete {
        /// Per-bucket failures, in provisioning order.
        failures: Vec<SweepFailure>,
    },
}

/// Empties and removes every bucket a test case provisioned.
#[derive(Clone, Debug)]
pub struct TeardownSweeper {
    handle: Arc<ClientHandle>,
    retry_limit: u32,
    retry_backoff: Duration,
}

impl TeardownSweeper {
    /// Creates a sweeper over the shared client handle.
    #[must_use]
    pub const fn new(handle: Arc<ClientHandle>) -> Self {
        Self {
            handle,
            retry_limit: RETRY_LIMIT,
            retry_backoff: RETRY_BACKOFF,
        }
    }

    /// Overrides the transient-error retry budget.
    #[must_use]
    pub const fn with_retry_limit(mut self, limit: u32) -> Self {
        self.retry_limit = limit;
        self
    }

    /// Overrides the base backoff between retries.
    #[must_use]
    pub const fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Sweeps every named bucket: repeatedly list a page of objects and
    /// delete them until the listing reports no further pages, then delete
    /// the bucket itself.
    ///
    /// Runs after every test case, including failed ones; every bucket is
    /// attempted even when an earlier one fails, and the aggregate failure
    /// names each bucket and the operation that failed.
    ///
    /// # Errors
    ///
    /// Returns [`SweepError::Client`] when the handle is released and
    /// [`SweepError::Incomplete`] when any bucket could not be cleaned.
    pub async fn teardown(&self, buckets: &[String]) -> Result<SweepSummary, SweepError> {
        let store = self.handle.store()?;
        let mut summary = SweepSummary::default();
        let mut failures = Vec::new();

        for bucket in buckets {
            match self.sweep_bucket(store.as_ref(), bucket).await {
                Ok(deleted_objects) => {
                    summary.deleted_objects += deleted_objects;
                    summary.deleted_buckets += 1;
                    info!(%bucket, deleted_objects, "bucket swept");
                }
                Err(failure) => {
                    error!(
                        bucket = %failure.bucket,
                        operation = %failure.operation,
                        message = %failure.message,
                        "teardown failure",
                    );
                    failures.push(failure);
                }
            }
        }

        if failures.is_empty() {
            Ok(summary)
        } else {
            Err(SweepError::Incomplete { failures })
        }
    }

    async fn sweep_bucket(
        &self,
        store: &dyn ObjectStore,
        bucket: &str,
    ) -> Result<usize, SweepFailure> {
        let mut deleted = 0;
        let mut continuation: Option<String> = None;

        loop {
            let page = self
                .with_retry(bucket, "list-objects", || {
                    store.list_objects(bucket, continuation.as_deref())
                })
                .await?;

            for key in &page.keys {
                self.with_retry(bucket, "delete-object", || {
                    store.delete_object(bucket, key)
                })
                .await?;
                deleted += 1;
            }

            // The loop condition reads the truncation flag of the page just
            // processed; acting on an earlier page's flag would leave one
            // page of objects behind.
            if page.truncated {
                continuation = page.continuation;
            } else {
                break;
            }
        }

        self.with_retry(bucket, "delete-bucket", || store.delete_bucket(bucket))
            .await?;
        Ok(deleted)
    }

    /// Runs `operation`, retrying transient failures with linear backoff.
    /// Sequencing errors such as a non-empty bucket are never retried:
    /// retrying them would mask a real ordering bug.
    async fn with_retry<'a, T, F>(
        &self,
        bucket: &str,
        operation: &str,
        attempt_fn: F,
    ) -> Result<T, SweepFailure>
    where
        F: Fn() -> StoreFuture<'a, T>,
    {
        let mut attempt = 0;
        loop {
            match attempt_fn().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.retry_limit => {
                    attempt += 1;
                    tokio::time::sleep(self.retry_backoff * attempt).await;
                }
                Err(err) => {
                    return Err(SweepFailure {
                        bucket: bucket.to_owned(),
                        operation: operation.to_owned(),
                        message: err.to_string(),
                    });
                }
            }
        }
    }
}

/// Releases the shared client handle once every bucket in the run is gone.
/// Closing twice is a no-op.
pub fn release_client(handle: &ClientHandle) {
    if handle.close() {
        info!(endpoint = %handle.endpoint(), "client handle released");
    }
}
