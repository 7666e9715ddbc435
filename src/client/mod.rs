//! Client handle construction and lifetime.
//!
//! One handle is built per environment and shared by reference across every
//! injection target; construction is pure and performs no network I/O.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use aws_sdk_s3::config::{BehaviorVersion, Credentials as SdkCredentials, Region};
use thiserror::Error;

use crate::store::{ObjectStore, S3ObjectStore};

/// Access credentials for the emulated backend.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Credentials {
    /// Access key presented to the backend.
    pub access_key: String,
    /// Secret key presented to the backend.
    pub secret_key: String,
}

/// Errors raised while building or using a client handle.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ClientError {
    /// Raised when a credential field is blank at construction time.
    #[error("invalid credentials: {field} must not be empty")]
    InvalidCredentials {
        /// Name of the blank credential field.
        field: String,
    },
    /// Raised when an operation is attempted through a released handle.
    #[error("client handle for {endpoint} is closed")]
    Closed {
        /// Endpoint the handle was bound to.
        endpoint: String,
    },
}

/// A configured connection to the environment, shared by every injection
/// target of a test class.
pub struct ClientHandle {
    store: Arc<dyn ObjectStore>,
    endpoint: String,
    region: String,
    closed: AtomicBool,
}

impl std::fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientHandle")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl ClientHandle {
    /// Wraps an object store as a shareable handle.
    #[must_use]
    pub fn from_store(
        store: Arc<dyn ObjectStore>,
        endpoint: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            store,
            endpoint: endpoint.into(),
            region: region.into(),
            closed: AtomicBool::new(false),
        }
    }

    /// Returns the store this handle is bound to.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Closed`] once the handle has been released.
    pub fn store(&self) -> Result<Arc<dyn ObjectStore>, ClientError> {
        if self.is_closed() {
            return Err(ClientError::Closed {
                endpoint: self.endpoint.clone(),
            });
        }
        Ok(Arc::clone(&self.store))
    }

    /// Endpoint the handle was built against.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Region the handle was built against.
    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Releases the handle. Closing an already-closed handle is a no-op;
    /// the return value reports whether this call performed the close.
    pub fn close(&self) -> bool {
        !self.closed.swap(true, Ordering::SeqCst)
    }

    /// Whether the handle has been released.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Builds a client handle bound to the environment's endpoint.
///
/// Construction validates argument shapes only; no request is issued until
/// the first store operation.
///
/// # Errors
///
/// Returns [`ClientError::InvalidCredentials`] when either key is blank.
pub fn build_client(
    endpoint: &str,
    credentials: &Credentials,
    region: &str,
) -> Result<ClientHandle, ClientError> {
    if credentials.access_key.trim().is_empty() {
        return Err(ClientError::InvalidCredentials {
            field: String::from("access_key"),
        });
    }
    if credentials.secret_key.trim().is_empty() {
        return Err(ClientError::InvalidCredentials {
            field: String::from("secret_key"),
        });
    }

    let sdk_credentials = SdkCredentials::new(
        credentials.access_key.clone(),
        credentials.secret_key.clone(),
        None,
        None,
        "drydock",
    );
    let config = aws_sdk_s3::config::Builder::new()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new(region.to_owned()))
        .credentials_provider(sdk_credentials)
        .endpoint_url(endpoint)
        .force_path_style(true)
        .build();
    let store = S3ObjectStore::new(aws_sdk_s3::Client::from_conf(config));

    Ok(ClientHandle::from_store(Arc::new(store), endpoint, region))
}

#[cfg(test)]
mod tests;
