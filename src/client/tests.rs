//! Unit tests for client-handle construction and release.

use std::sync::Arc;

use rstest::rstest;

use super::*;
use crate::test_support::MemoryStore;

fn credentials(access_key: &str, secret_key: &str) -> Credentials {
    Credentials {
        access_key: access_key.to_owned(),
        secret_key: secret_key.to_owned(),
    }
}

#[rstest]
fn build_client_accepts_valid_credentials() {
    let handle = build_client(
        "http://127.0.0.1:4566",
        &credentials("test", "test"),
        "us-east-1",
    )
    .expect("client should build");

    assert_eq!(handle.endpoint(), "http://127.0.0.1:4566");
    assert_eq!(handle.region(), "us-east-1");
    assert!(!handle.is_closed());
}

#[rstest]
#[case::blank_access_key("", "secret", "access_key")]
#[case::blank_secret_key("access", "  ", "secret_key")]
fn build_client_rejects_blank_keys(
    #[case] access_key: &str,
    #[case] secret_key: &str,
    #[case] expected_field: &str,
) {
    let err = build_client(
        "http://127.0.0.1:4566",
        &credentials(access_key, secret_key),
        "us-east-1",
    )
    .expect_err("expected invalid credentials");

    assert_eq!(
        err,
        ClientError::InvalidCredentials {
            field: expected_field.to_owned()
        }
    );
}

#[rstest]
fn close_is_idempotent() {
    let handle = ClientHandle::from_store(
        Arc::new(MemoryStore::new()),
        "http://127.0.0.1:0",
        "us-east-1",
    );

    assert!(handle.close(), "first close performs the release");
    assert!(!handle.close(), "second close is a no-op");
    assert!(handle.is_closed());
}

#[rstest]
fn store_access_fails_after_close() {
    let handle = ClientHandle::from_store(
        Arc::new(MemoryStore::new()),
        "http://127.0.0.1:0",
        "us-east-1",
    );

    handle.store().expect("store available before close");
    handle.close();
    let err = handle.store().expect_err("store unavailable after close");
    assert!(matches!(err, ClientError::Closed { .. }));
}
