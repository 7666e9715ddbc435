//! Object-store abstraction shared by the provisioner, sweeper, and client.
//!
//! The trait keeps the orchestration code independent of the wire protocol:
//! production code talks to the emulated backend through [`S3ObjectStore`]
//! while tests substitute the in-memory store from `test_support`.

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

mod s3;

pub use s3::S3ObjectStore;

/// One page of an object listing.
///
/// `continuation` is only meaningful while `truncated` is `true`; the sweeper
/// always reads both from the page it just received so the pagination loop
/// cannot act on a stale truncation flag.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ObjectPage {
    /// Keys returned by this page, in listing order.
    pub keys: Vec<String>,
    /// Whether further pages remain.
    pub truncated: bool,
    /// Opaque marker to request the next page.
    pub continuation: Option<String>,
}

/// Errors raised by object-store implementations.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum StoreError {
    /// Raised when creating a bucket that already exists.
    #[error("bucket {bucket} already exists")]
    AlreadyExists {
        /// Bucket that was being created.
        bucket: String,
    },
    /// Raised when deleting a bucket that still contains objects.
    #[error("bucket {bucket} is not empty")]
    NotEmpty {
        /// Bucket that was being deleted.
        bucket: String,
    },
    /// Raised when operating on a bucket that does not exist.
    #[error("bucket {bucket} not found")]
    NotFound {
        /// Bucket that was being accessed.
        bucket: String,
    },
    /// Raised for timeouts and connection failures that may succeed on retry.
    #[error("transient failure during {operation}: {message}")]
    Transient {
        /// Store operation being attempted.
        operation: String,
        /// Underlying failure description.
        message: String,
    },
    /// Raised for all other service-level failures.
    #[error("{operation} failed: {message}")]
    Api {
        /// Store operation being attempted.
        operation: String,
        /// Underlying failure description.
        message: String,
    },
}

impl StoreError {
    /// Returns `true` when the error may succeed if the operation is retried.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

/// Future returned by store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Minimal interface over the object-storage wire protocol.
pub trait ObjectStore: std::fmt::Debug + Send + Sync {
    /// Issues a create-bucket request. Creation is not idempotent: a second
    /// create for the same name fails with [`StoreError::AlreadyExists`].
    fn create_bucket<'a>(&'a self, bucket: &'a str) -> StoreFuture<'a, ()>;

    /// Checks whether the bucket exists. A missing bucket is `Ok(false)`,
    /// never an error.
    fn bucket_exists<'a>(&'a self, bucket: &'a str) -> StoreFuture<'a, bool>;

    /// Stores an object under `key`.
    fn put_object<'a>(&'a self, bucket: &'a str, key: &'a str, body: Vec<u8>)
    -> StoreFuture<'a, ()>;

    /// Lists one page of object keys, resuming from `continuation` when one
    /// is supplied.
    fn list_objects<'a>(
        &'a self,
        bucket: &'a str,
        continuation: Option<&'a str>,
    ) -> StoreFuture<'a, ObjectPage>;

    /// Deletes a single object.
    fn delete_object<'a>(&'a self, bucket: &'a str, key: &'a str) -> StoreFuture<'a, ()>;

    /// Deletes an empty bucket. Fails with [`StoreError::NotEmpty`] while
    /// objects remain.
    fn delete_bucket<'a>(&'a self, bucket: &'a str) -> StoreFuture<'a, ()>;
}
