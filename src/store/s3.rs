//! `aws-sdk-s3` implementation of the object-store seam.

use aws_sdk_s3::Client;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;

use super::{ObjectPage, ObjectStore, StoreError, StoreFuture};

/// Object store backed by the emulated backend's S3-compatible API.
#[derive(Clone, Debug)]
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    /// Wraps a configured SDK client.
    #[must_use]
    pub const fn new(client: Client) -> Self {
        Self { client }
    }
}

/// Maps an SDK failure onto the store taxonomy.
///
/// Service errors are classified by error code; timeouts and dispatch
/// failures are transient and eligible for retry, everything else is an API
/// failure carrying the full error context.
fn classify<E>(operation: &str, bucket: &str, err: SdkError<E>) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    match err {
        SdkError::ServiceError(ctx) => {
            let code = ctx.err().meta().code().unwrap_or_default().to_owned();
            let message = ctx
                .err()
                .meta()
                .message()
                .map_or_else(|| code.clone(), ToOwned::to_owned);
            match code.as_str() {
                "BucketAlreadyExists" | "BucketAlreadyOwnedByYou" => StoreError::AlreadyExists {
                    bucket: bucket.to_owned(),
                },
                "BucketNotEmpty" => StoreError::NotEmpty {
                    bucket: bucket.to_owned(),
                },
                "NoSuchBucket" | "NotFound" => StoreError::NotFound {
                    bucket: bucket.to_owned(),
                },
                "SlowDown" | "ServiceUnavailable" | "InternalError" => StoreError::Transient {
                    operation: operation.to_owned(),
                    message,
                },
                _ => StoreError::Api {
                    operation: operation.to_owned(),
                    message,
                },
            }
        }
        transient @ (SdkError::TimeoutError(_) | SdkError::DispatchFailure(_)) => {
            StoreError::Transient {
                operation: operation.to_owned(),
                message: format!("{}", DisplayErrorContext(transient)),
            }
        }
        other => StoreError::Api {
            operation: operation.to_owned(),
            message: format!("{}", DisplayErrorContext(other)),
        },
    }
}

impl ObjectStore for S3ObjectStore {
    fn create_bucket<'a>(&'a self, bucket: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.client
                .create_bucket()
                .bucket(bucket)
                .send()
                .await
                .map_err(|err| classify("create-bucket", bucket, err))?;
            Ok(())
        })
    }

    fn bucket_exists<'a>(&'a self, bucket: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            match self.client.head_bucket().bucket(bucket).send().await {
                Ok(_) => Ok(true),
                // Head responses carry no body, so the 404 is matched on the
                // modelled variant rather than an error code.
                Err(SdkError::ServiceError(ctx)) if ctx.err().is_not_found() => Ok(false),
                Err(err) => match classify("head-bucket", bucket, err) {
                    StoreError::NotFound { .. } => Ok(false),
                    other => Err(other),
                },
            }
        })
    }

    fn put_object<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
        body: Vec<u8>,
    ) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.client
                .put_object()
                .bucket(bucket)
                .key(key)
                .body(ByteStream::from(body))
                .send()
                .await
                .map_err(|err| classify("put-object", bucket, err))?;
            Ok(())
        })
    }

    fn list_objects<'a>(
        &'a self,
        bucket: &'a str,
        continuation: Option<&'a str>,
    ) -> StoreFuture<'a, ObjectPage> {
        Box::pin(async move {
            let mut request = self.client.list_objects_v2().bucket(bucket);
            if let Some(token) = continuation {
                request = request.continuation_token(token);
            }
            let response = request
                .send()
                .await
                .map_err(|err| classify("list-objects", bucket, err))?;

            let keys = response
                .contents()
                .iter()
                .filter_map(|object| object.key().map(ToOwned::to_owned))
                .collect();
            Ok(ObjectPage {
                keys,
                truncated: response.is_truncated().unwrap_or(false),
                continuation: response.next_continuation_token().map(ToOwned::to_owned),
            })
        })
    }

    fn delete_object<'a>(&'a self, bucket: &'a str, key: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.client
                .delete_object()
                .bucket(bucket)
                .key(key)
                .send()
                .await
                .map_err(|err| classify("delete-object", bucket, err))?;
            Ok(())
        })
    }

    fn delete_bucket<'a>(&'a self, bucket: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.client
                .delete_bucket()
                .bucket(bucket)
                .send()
                .await
                .map_err(|err| classify("delete-bucket", bucket, err))?;
            Ok(())
        })
    }
}
