//! Core library for the drydock test-environment manager.
//!
//! The crate provisions an ephemeral object-storage backend inside a
//! disposable container, injects a shared client handle into test code, and
//! guarantees that every bucket created for a test case is emptied (through
//! paginated listing) and removed afterwards. A janitor removes stray
//! containers left behind by crashed runs.

pub mod client;
pub mod command;
pub mod conduit;
pub mod config;
pub mod environment;
pub mod harness;
pub mod inject;
pub mod janitor;
pub mod provision;
pub mod store;
pub mod sweep;
pub mod test_support;

pub use client::{ClientError, ClientHandle, Credentials, build_client};
pub use command::{CommandError, CommandOutput, CommandRunner, ProcessCommandRunner};
pub use conduit::{Conduit, ConduitError, ConduitRule};
pub use config::{ConfigError, EnvironmentConfig};
pub use environment::{
    EnvironmentController, EnvironmentDetails, EnvironmentError, EnvironmentState, HEALTH_PATH,
    RUN_LABEL_KEY,
};
pub use harness::{CaseError, HarnessError, TestHarness};
pub use inject::{ClientSlot, InjectError, InjectionTarget, Injector};
pub use janitor::{
    ContainerJanitor, DEFAULT_DOCKER_BIN, JanitorConfig, JanitorError, JanitorSummary,
};
pub use provision::{BucketProvisioner, ProvisionError};
pub use store::{ObjectPage, ObjectStore, S3ObjectStore, StoreError, StoreFuture};
pub use sweep::{SweepError, SweepFailure, SweepSummary, TeardownSweeper, release_client};
