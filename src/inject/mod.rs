//! Explicit client-handle injection for test classes.
//!
//! Instead of scanning for annotated fields at runtime, test setup registers
//! each receiving slot together with a marker and the type it expects. The
//! injector fills every matching slot with the same shared handle, so tests
//! must not assume per-target isolation.

use std::any::{Any, TypeId};
use std::sync::Arc;
use std::sync::OnceLock;

use thiserror::Error;

use crate::client::ClientHandle;

/// Errors raised while injecting the client handle.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum InjectError {
    /// Raised when a target carries the marker but expects a different type.
    /// This signals a misconfigured test, not a runtime fault.
    #[error("no matching target: marker '{marker}' expects a type other than ClientHandle")]
    NoMatchingTarget {
        /// Marker found on the mismatched target.
        marker: String,
    },
}

/// A test-owned field designated to receive the shared client handle.
///
/// Slots are shared by reference; every matching slot observes the same
/// live handle instance.
#[derive(Debug, Default)]
pub struct ClientSlot {
    inner: OnceLock<Arc<ClientHandle>>,
}

impl ClientSlot {
    /// Creates an empty slot.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: OnceLock::new(),
        }
    }

    /// Returns the injected handle, if the slot has been filled.
    #[must_use]
    pub fn get(&self) -> Option<&Arc<ClientHandle>> {
        self.inner.get()
    }

    /// Whether the slot has been filled.
    #[must_use]
    pub fn is_filled(&self) -> bool {
        self.inner.get().is_some()
    }

    fn fill(&self, handle: Arc<ClientHandle>) -> bool {
        self.inner.set(handle).is_ok()
    }
}

/// Registration of one slot: the marker it carries, the type it expects,
/// and a reference to the slot itself.
#[derive(Debug)]
pub struct InjectionTarget<'a> {
    marker: &'a str,
    expected: TypeId,
    slot: &'a ClientSlot,
}

impl<'a> InjectionTarget<'a> {
    /// Registers `slot` under `marker`, expecting an injected value of type
    /// `T`. Injection succeeds only when `T` is [`ClientHandle`].
    #[must_use]
    pub fn new<T: Any>(marker: &'a str, slot: &'a ClientSlot) -> Self {
        Self {
            marker,
            expected: TypeId::of::<T>(),
            slot,
        }
    }
}

/// Assigns the single live client handle to every registered slot that
/// carries the matching marker.
#[derive(Clone, Debug)]
pub struct Injector {
    handle: Arc<ClientHandle>,
    marker: String,
}

impl Injector {
    /// Creates an injector distributing `handle` to targets marked `marker`.
    #[must_use]
    pub fn new(handle: Arc<ClientHandle>, marker: impl Into<String>) -> Self {
        Self {
            handle,
            marker: marker.into(),
        }
    }

    /// Fills every target whose marker matches, sharing the handle by
    /// reference. Targets with other markers are skipped. Already-filled
    /// slots keep their original value, making repeated injection for the
    /// same test class a no-op.
    ///
    /// Returns the number of slots filled by this call.
    ///
    /// # Errors
    ///
    /// Returns [`InjectError::NoMatchingTarget`] when a target carries the
    /// marker but expects a type other than [`ClientHandle`].
    pub fn inject(&self, targets: &[InjectionTarget<'_>]) -> Result<usize, InjectError> {
        let mut filled = 0;
        for target in targets {
            if target.marker != self.marker {
                continue;
            }
            if target.expected != TypeId::of::<ClientHandle>() {
                return Err(InjectError::NoMatchingTarget {
                    marker: target.marker.to_owned(),
                });
            }
            if target.slot.fill(Arc::clone(&self.handle)) {
                filled += 1;
            }
        }
        Ok(filled)
    }
}

#[cfg(test)]
mod tests;
