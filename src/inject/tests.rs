//! Unit tests for explicit client-handle injection.

use std::sync::Arc;

use rstest::rstest;

use super::*;
use crate::client::ClientHandle;
use crate::test_support::{MemoryStore, handle_for_store};

const MARKER: &str = "object-store";

fn injector() -> (Arc<ClientHandle>, Injector) {
    let handle = handle_for_store(Arc::new(MemoryStore::new()));
    (Arc::clone(&handle), Injector::new(handle, MARKER))
}

#[rstest]
fn inject_fills_every_matching_slot_with_the_same_handle() {
    let (handle, injector) = injector();
    let first = ClientSlot::new();
    let second = ClientSlot::new();
    let targets = [
        InjectionTarget::new::<ClientHandle>(MARKER, &first),
        InjectionTarget::new::<ClientHandle>(MARKER, &second),
    ];

    let filled = injector.inject(&targets).expect("injection should succeed");
    assert_eq!(filled, 2);

    let first_handle = first.get().expect("first slot filled");
    let second_handle = second.get().expect("second slot filled");
    assert!(
        Arc::ptr_eq(first_handle, second_handle),
        "slots share one live handle by reference"
    );
    assert!(Arc::ptr_eq(first_handle, &handle));
}

#[rstest]
fn inject_skips_targets_with_other_markers() {
    let (_handle, injector) = injector();
    let slot = ClientSlot::new();
    let targets = [InjectionTarget::new::<ClientHandle>("unrelated", &slot)];

    let filled = injector.inject(&targets).expect("injection should succeed");
    assert_eq!(filled, 0);
    assert!(!slot.is_filled());
}

#[rstest]
fn inject_rejects_marker_with_mismatched_type() {
    let (_handle, injector) = injector();
    let slot = ClientSlot::new();
    let targets = [InjectionTarget::new::<String>(MARKER, &slot)];

    let err = injector
        .inject(&targets)
        .expect_err("expected a type mismatch");
    assert_eq!(
        err,
        InjectError::NoMatchingTarget {
            marker: MARKER.to_owned()
        }
    );
}

#[rstest]
fn repeated_injection_keeps_the_original_value() {
    let (_handle, injector) = injector();
    let slot = ClientSlot::new();
    let targets = [InjectionTarget::new::<ClientHandle>(MARKER, &slot)];

    let first_pass = injector.inject(&targets).expect("first injection");
    assert_eq!(first_pass, 1);
    let original = Arc::clone(slot.get().expect("slot filled"));

    let second_pass = injector.inject(&targets).expect("second injection");
    assert_eq!(second_pass, 0, "already-filled slots are left in place");
    let retained = slot.get().expect("slot still filled");
    assert!(Arc::ptr_eq(&original, retained));
}
