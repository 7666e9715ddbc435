//! Test support utilities shared across unit and integration tests.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::ffi::OsString;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::client::ClientHandle;
use crate::command::{CommandError, CommandOutput, CommandRunner};
use crate::store::{ObjectPage, ObjectStore, StoreError, StoreFuture};

const DEFAULT_PAGE_SIZE: usize = 1000;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// In-memory object store with a configurable listing page size.
///
/// Small page sizes force the pagination path in the sweeper; scripted
/// failures drive retry and sequencing scenarios without a network.
#[derive(Debug, Default)]
pub struct MemoryStore {
    buckets: Mutex<HashMap<String, BTreeMap<String, Vec<u8>>>>,
    page_size: Option<usize>,
    failures: Mutex<VecDeque<(String, StoreError)>>,
    hidden_polls: Mutex<HashMap<String, u32>>,
    operations: Mutex<Vec<String>>,
}

impl MemoryStore {
    /// Creates a store with the default page size.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store listing at most `page_size` keys per page.
    #[must_use]
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            page_size: Some(page_size),
            ..Self::default()
        }
    }

    /// Queues an error to be returned by the next call of `operation`.
    /// Queued failures are consumed in FIFO order per operation.
    pub fn push_failure(&self, operation: impl Into<String>, error: StoreError) {
        lock(&self.failures).push_back((operation.into(), error));
    }

    /// Makes `bucket_exists` report `false` for the next `polls` checks on
    /// `bucket`, simulating slow confirmation.
    pub fn delay_confirmation(&self, bucket: impl Into<String>, polls: u32) {
        lock(&self.hidden_polls).insert(bucket.into(), polls);
    }

    /// Returns every operation recorded so far as `"<operation> <bucket>"`.
    #[must_use]
    pub fn operations(&self) -> Vec<String> {
        lock(&self.operations).clone()
    }

    /// Returns the keys currently stored in `bucket`, or `None` when the
    /// bucket does not exist.
    #[must_use]
    pub fn keys(&self, bucket: &str) -> Option<Vec<String>> {
        lock(&self.buckets)
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
    }

    /// Whether `bucket` currently exists.
    #[must_use]
    pub fn contains_bucket(&self, bucket: &str) -> bool {
        lock(&self.buckets).contains_key(bucket)
    }

    fn record(&self, operation: &str, bucket: &str) {
        lock(&self.operations).push(format!("{operation} {bucket}"));
    }

    fn take_failure(&self, operation: &str) -> Option<StoreError> {
        let mut failures = lock(&self.failures);
        let position = failures
            .iter()
            .position(|(queued_op, _)| queued_op == operation)?;
        failures.remove(position).map(|(_, error)| error)
    }

    fn effective_page_size(&self) -> usize {
        self.page_size.unwrap_or(DEFAULT_PAGE_SIZE)
    }
}

impl ObjectStore for MemoryStore {
    fn create_bucket<'a>(&'a self, bucket: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.record("create-bucket", bucket);
            if let Some(error) = self.take_failure("create-bucket") {
                return Err(error);
            }
            let mut buckets = lock(&self.buckets);
            if buckets.contains_key(bucket) {
                return Err(StoreError::AlreadyExists {
                    bucket: bucket.to_owned(),
                });
            }
            buckets.insert(bucket.to_owned(), BTreeMap::new());
            Ok(())
        })
    }

    fn bucket_exists<'a>(&'a self, bucket: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            self.record("head-bucket", bucket);
            if let Some(error) = self.take_failure("head-bucket") {
                return Err(error);
            }
            let mut hidden = lock(&self.hidden_polls);
            if let Some(remaining) = hidden.get_mut(bucket) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Ok(false);
                }
            }
            Ok(lock(&self.buckets).contains_key(bucket))
        })
    }

    fn put_object<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
        body: Vec<u8>,
    ) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.record("put-object", bucket);
            if let Some(error) = self.take_failure("put-object") {
                return Err(error);
            }
            let mut buckets = lock(&self.buckets);
            let Some(objects) = buckets.get_mut(bucket) else {
                return Err(StoreError::NotFound {
                    bucket: bucket.to_owned(),
                });
            };
            objects.insert(key.to_owned(), body);
            Ok(())
        })
    }

    fn list_objects<'a>(
        &'a self,
        bucket: &'a str,
        continuation: Option<&'a str>,
    ) -> StoreFuture<'a, ObjectPage> {
        Box::pin(async move {
            self.record("list-objects", bucket);
            if let Some(error) = self.take_failure("list-objects") {
                return Err(error);
            }
            let buckets = lock(&self.buckets);
            let Some(objects) = buckets.get(bucket) else {
                return Err(StoreError::NotFound {
                    bucket: bucket.to_owned(),
                });
            };

            let page_size = self.effective_page_size();
            let mut keys = Vec::with_capacity(page_size);
            let mut remaining = false;
            for key in objects.keys() {
                if continuation.is_some_and(|token| key.as_str() <= token) {
                    continue;
                }
                if keys.len() == page_size {
                    remaining = true;
                    break;
                }
                keys.push(key.clone());
            }

            let continuation_out = if remaining { keys.last().cloned() } else { None };
            Ok(ObjectPage {
                keys,
                truncated: remaining,
                continuation: continuation_out,
            })
        })
    }

    fn delete_object<'a>(&'a self, bucket: &'a str, key: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.record("delete-object", bucket);
            if let Some(error) = self.take_failure("delete-object") {
                return Err(error);
            }
            let mut buckets = lock(&self.buckets);
            let Some(objects) = buckets.get_mut(bucket) else {
                return Err(StoreError::NotFound {
                    bucket: bucket.to_owned(),
                });
            };
            objects.remove(key);
            Ok(())
        })
    }

    fn delete_bucket<'a>(&'a self, bucket: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.record("delete-bucket", bucket);
            if let Some(error) = self.take_failure("delete-bucket") {
                return Err(error);
            }
            let mut buckets = lock(&self.buckets);
            match buckets.get(bucket) {
                None => Err(StoreError::NotFound {
                    bucket: bucket.to_owned(),
                }),
                Some(objects) if !objects.is_empty() => Err(StoreError::NotEmpty {
                    bucket: bucket.to_owned(),
                }),
                Some(_) => {
                    buckets.remove(bucket);
                    Ok(())
                }
            }
        })
    }
}

/// Wraps a store in a client handle with placeholder connection details.
#[must_use]
pub fn handle_for_store(store: Arc<dyn ObjectStore>) -> Arc<ClientHandle> {
    Arc::new(ClientHandle::from_store(
        store,
        "http://127.0.0.1:0",
        "us-east-1",
    ))
}

/// Scripted command runner that returns pre-seeded outputs in FIFO order.
///
/// Used to drive deterministic command outcomes without spawning processes.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRunner {
    responses: Arc<Mutex<VecDeque<CommandOutput>>>,
    invocations: Arc<Mutex<Vec<CommandInvocation>>>,
}

/// Records a single invocation made through [`ScriptedRunner`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandInvocation {
    /// Program name as passed to the runner.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<OsString>,
}

impl CommandInvocation {
    /// Returns a shell-like command string for assertions.
    #[must_use]
    pub fn command_string(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(
            self.args
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned()),
        );
        parts.join(" ")
    }
}

impl ScriptedRunner {
    /// Creates a new runner with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all invocations recorded so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<CommandInvocation> {
        lock(&self.invocations).clone()
    }

    /// Pushes a successful exit status with no output.
    pub fn push_success(&self) {
        self.push_output(Some(0), "", "");
    }

    /// Pushes a failing exit code with stderr text.
    pub fn push_failure(&self, code: i32, stderr: impl Into<String>) {
        self.push_output(Some(code), "", stderr);
    }

    /// Pushes an explicit command output response.
    pub fn push_output(
        &self,
        code: Option<i32>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) {
        lock(&self.responses).push_back(CommandOutput {
            code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        });
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, CommandError> {
        lock(&self.invocations).push(CommandInvocation {
            program: program.to_owned(),
            args: args.to_vec(),
        });
        lock(&self.responses)
            .pop_front()
            .ok_or_else(|| CommandError::Spawn {
                program: program.to_owned(),
                message: String::from("no scripted response available"),
            })
    }
}
