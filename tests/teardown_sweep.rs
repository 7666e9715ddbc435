//! Behaviour tests for bucket provisioning and the teardown sweep.

use std::sync::Arc;
use std::time::Duration;

use drydock::test_support::{MemoryStore, handle_for_store};
use drydock::{
    BucketProvisioner, ObjectStore, ProvisionError, StoreError, SweepError, SweepSummary,
    TeardownSweeper,
};

mod common;

fn names(buckets: &[&str]) -> Vec<String> {
    buckets.iter().map(|name| (*name).to_owned()).collect()
}

fn fast_provisioner(store: &Arc<MemoryStore>) -> BucketProvisioner {
    BucketProvisioner::new(handle_for_store(Arc::clone(store) as Arc<dyn ObjectStore>))
        .with_poll_interval(Duration::from_millis(5))
        .with_confirm_timeout(Duration::from_millis(200))
}

fn fast_sweeper(store: &Arc<MemoryStore>) -> TeardownSweeper {
    TeardownSweeper::new(handle_for_store(Arc::clone(store) as Arc<dyn ObjectStore>))
        .with_retry_backoff(Duration::from_millis(1))
}

#[tokio::test]
async fn provision_confirms_buckets_in_declaration_order() {
    common::init_tracing();
    let store = Arc::new(MemoryStore::new());
    let provisioner = fast_provisioner(&store);

    provisioner
        .provision(&names(&["foo", "bar"]))
        .await
        .expect("provisioning should succeed");

    assert!(store.contains_bucket("foo"));
    assert!(store.contains_bucket("bar"));

    let operations = store.operations();
    let create_foo = operations
        .iter()
        .position(|op| op == "create-bucket foo")
        .expect("foo created");
    let create_bar = operations
        .iter()
        .position(|op| op == "create-bucket bar")
        .expect("bar created");
    assert!(
        create_foo < create_bar,
        "buckets are provisioned in declaration order: {operations:?}"
    );
}

#[tokio::test]
async fn provision_twice_without_teardown_fails() {
    common::init_tracing();
    let store = Arc::new(MemoryStore::new());
    let provisioner = fast_provisioner(&store);
    let buckets = names(&["foo"]);

    provisioner
        .provision(&buckets)
        .await
        .expect("first provisioning succeeds");
    let err = provisioner
        .provision(&buckets)
        .await
        .expect_err("second provisioning must fail");

    assert_eq!(
        err,
        ProvisionError::AlreadyExists {
            bucket: String::from("foo")
        }
    );
}

#[tokio::test]
async fn provision_succeeds_again_after_teardown() {
    common::init_tracing();
    let store = Arc::new(MemoryStore::new());
    let provisioner = fast_provisioner(&store);
    let sweeper = fast_sweeper(&store);
    let buckets = names(&["foo"]);

    provisioner.provision(&buckets).await.expect("provision");
    sweeper.teardown(&buckets).await.expect("teardown");
    provisioner
        .provision(&buckets)
        .await
        .expect("provisioning after teardown succeeds");
}

#[tokio::test]
async fn provision_times_out_when_confirmation_never_arrives() {
    common::init_tracing();
    let store = Arc::new(MemoryStore::new());
    store.delay_confirmation("slow", u32::MAX);
    let provisioner = fast_provisioner(&store).with_confirm_timeout(Duration::from_millis(50));

    let err = provisioner
        .provision(&names(&["slow"]))
        .await
        .expect_err("confirmation should time out");

    assert_eq!(
        err,
        ProvisionError::Timeout {
            bucket: String::from("slow")
        }
    );
}

#[tokio::test]
async fn sweep_empties_a_bucket_across_listing_pages() {
    common::init_tracing();
    let store = Arc::new(MemoryStore::with_page_size(2));
    let provisioner = fast_provisioner(&store);
    let sweeper = fast_sweeper(&store);
    let buckets = names(&["foo"]);

    provisioner.provision(&buckets).await.expect("provision");
    for key in ["a", "b", "c", "d", "e"] {
        store
            .put_object("foo", key, b"payload".to_vec())
            .await
            .expect("seed object");
    }

    let summary = sweeper.teardown(&buckets).await.expect("teardown");
    assert_eq!(
        summary,
        SweepSummary {
            deleted_objects: 5,
            deleted_buckets: 1
        }
    );
    assert!(!store.contains_bucket("foo"));

    let listings = store
        .operations()
        .iter()
        .filter(|op| op.as_str() == "list-objects foo")
        .count();
    assert!(
        listings >= 3,
        "five objects at page size two require at least three pages, saw {listings}"
    );
}

#[tokio::test]
async fn sweep_handles_an_empty_sibling_bucket() {
    common::init_tracing();
    let store = Arc::new(MemoryStore::new());
    let provisioner = fast_provisioner(&store);
    let sweeper = fast_sweeper(&store);
    let buckets = names(&["foo", "bar"]);

    provisioner.provision(&buckets).await.expect("provision");
    for key in ["one", "two", "three"] {
        store
            .put_object("foo", key, b"payload".to_vec())
            .await
            .expect("seed object");
    }

    let summary = sweeper.teardown(&buckets).await.expect("teardown");
    assert_eq!(
        summary,
        SweepSummary {
            deleted_objects: 3,
            deleted_buckets: 2
        }
    );
    assert!(!store.contains_bucket("foo"));
    assert!(!store.contains_bucket("bar"));

    let err = store
        .list_objects("foo", None)
        .await
        .expect_err("a swept bucket yields not-found on further access");
    assert_eq!(
        err,
        StoreError::NotFound {
            bucket: String::from("foo")
        }
    );
}

#[tokio::test]
async fn sweep_retries_transient_listing_failures() {
    common::init_tracing();
    let store = Arc::new(MemoryStore::new());
    let provisioner = fast_provisioner(&store);
    let sweeper = fast_sweeper(&store);
    let buckets = names(&["foo"]);

    provisioner.provision(&buckets).await.expect("provision");
    store
        .put_object("foo", "key", b"payload".to_vec())
        .await
        .expect("seed object");
    for _ in 0..2 {
        store.push_failure(
            "list-objects",
            StoreError::Transient {
                operation: String::from("list-objects"),
                message: String::from("connection reset"),
            },
        );
    }

    let summary = sweeper.teardown(&buckets).await.expect("teardown");
    assert_eq!(summary.deleted_objects, 1);
    assert!(!store.contains_bucket("foo"));
}

#[tokio::test]
async fn sweep_reports_retry_exhaustion_with_bucket_and_operation() {
    common::init_tracing();
    let store = Arc::new(MemoryStore::new());
    let provisioner = fast_provisioner(&store);
    let sweeper = fast_sweeper(&store).with_retry_limit(1);
    let buckets = names(&["foo"]);

    provisioner.provision(&buckets).await.expect("provision");
    for _ in 0..2 {
        store.push_failure(
            "list-objects",
            StoreError::Transient {
                operation: String::from("list-objects"),
                message: String::from("connection reset"),
            },
        );
    }

    let err = sweeper
        .teardown(&buckets)
        .await
        .expect_err("retries should exhaust");
    let SweepError::Incomplete { failures } = err else {
        panic!("expected Incomplete, got {err:?}");
    };
    assert_eq!(failures.len(), 1);
    let failure = failures.first().expect("one failure");
    assert_eq!(failure.bucket, "foo");
    assert_eq!(failure.operation, "list-objects");
}

#[tokio::test]
async fn sweep_never_retries_sequencing_errors() {
    common::init_tracing();
    let store = Arc::new(MemoryStore::new());
    let provisioner = fast_provisioner(&store);
    let sweeper = fast_sweeper(&store);
    let buckets = names(&["foo"]);

    provisioner.provision(&buckets).await.expect("provision");
    store.push_failure(
        "delete-bucket",
        StoreError::NotEmpty {
            bucket: String::from("foo"),
        },
    );

    let err = sweeper
        .teardown(&buckets)
        .await
        .expect_err("sequencing errors surface as-is");
    assert!(matches!(err, SweepError::Incomplete { .. }));

    let delete_attempts = store
        .operations()
        .iter()
        .filter(|op| op.as_str() == "delete-bucket foo")
        .count();
    assert_eq!(
        delete_attempts, 1,
        "a non-empty bucket delete must not be retried"
    );
}

#[tokio::test]
async fn sweep_attempts_every_bucket_despite_failures() {
    common::init_tracing();
    let store = Arc::new(MemoryStore::new());
    let provisioner = fast_provisioner(&store);
    let sweeper = fast_sweeper(&store);
    let buckets = names(&["foo", "bar"]);

    provisioner.provision(&buckets).await.expect("provision");
    store.push_failure(
        "delete-bucket",
        StoreError::Api {
            operation: String::from("delete-bucket"),
            message: String::from("internal error"),
        },
    );

    let err = sweeper
        .teardown(&buckets)
        .await
        .expect_err("one bucket fails");
    let SweepError::Incomplete { failures } = err else {
        panic!("expected Incomplete, got {err:?}");
    };
    assert_eq!(failures.len(), 1);
    assert_eq!(failures.first().map(|f| f.bucket.as_str()), Some("foo"));
    assert!(
        !store.contains_bucket("bar"),
        "later buckets are still swept after an earlier failure"
    );
}
