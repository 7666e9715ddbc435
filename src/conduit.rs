//! One-hop message forwarding between named in-process endpoints.
//!
//! A conduit rule is a fixed, stateless mapping: every message arriving at
//! the source endpoint is forwarded unmodified, exactly once and in arrival
//! order, to the sink endpoint. The rule performs no transformation,
//! filtering, or error handling; whatever happens to a message after the
//! sink receives it is the sink's responsibility. Payloads are opaque.

use std::collections::HashMap;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const CHANNEL_CAPACITY: usize = 64;

/// A forwarding relation between two named endpoints.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConduitRule {
    /// Endpoint messages arrive at.
    pub source: String,
    /// Endpoint messages are forwarded to.
    pub sink: String,
}

impl ConduitRule {
    /// Declares a `source → sink` rule.
    #[must_use]
    pub fn new(source: impl Into<String>, sink: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            sink: sink.into(),
        }
    }
}

/// Errors raised while declaring endpoints and rules.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ConduitError {
    /// Raised when a rule or accessor names an undeclared endpoint.
    #[error("unknown endpoint: {name}")]
    UnknownEndpoint {
        /// Name that failed to resolve.
        name: String,
    },
    /// Raised when an endpoint's consuming side has already been claimed,
    /// either by a rule or by `take_receiver`.
    #[error("endpoint {name} is already in use")]
    EndpointInUse {
        /// Endpoint whose consuming side is taken.
        name: String,
    },
}

/// Registry of named in-process endpoints and installed forwarding rules.
#[derive(Debug)]
pub struct Conduit<T> {
    senders: HashMap<String, mpsc::Sender<T>>,
    receivers: HashMap<String, mpsc::Receiver<T>>,
    forwarders: Vec<JoinHandle<()>>,
}

impl<T> Default for Conduit<T> {
    fn default() -> Self {
        Self {
            senders: HashMap::new(),
            receivers: HashMap::new(),
            forwarders: Vec::new(),
        }
    }
}

impl<T: Send + 'static> Conduit<T> {
    /// Creates an empty conduit with no endpoints.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a named endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ConduitError::EndpointInUse`] when the name is already
    /// declared.
    pub fn endpoint(&mut self, name: impl Into<String>) -> Result<(), ConduitError> {
        let endpoint_name = name.into();
        if self.senders.contains_key(&endpoint_name) {
            return Err(ConduitError::EndpointInUse {
                name: endpoint_name,
            });
        }
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        self.senders.insert(endpoint_name.clone(), tx);
        self.receivers.insert(endpoint_name, rx);
        Ok(())
    }

    /// Installs a forwarding rule, claiming the source's consuming side and
    /// spawning the forwarding task.
    ///
    /// # Errors
    ///
    /// Returns [`ConduitError::UnknownEndpoint`] when either endpoint is
    /// undeclared and [`ConduitError::EndpointInUse`] when the source's
    /// consuming side is already claimed.
    pub fn install(&mut self, rule: &ConduitRule) -> Result<(), ConduitError> {
        if !self.senders.contains_key(&rule.source) {
            return Err(ConduitError::UnknownEndpoint {
                name: rule.source.clone(),
            });
        }
        let sink_tx = self
            .senders
            .get(&rule.sink)
            .cloned()
            .ok_or_else(|| ConduitError::UnknownEndpoint {
                name: rule.sink.clone(),
            })?;
        let mut source_rx =
            self.receivers
                .remove(&rule.source)
                .ok_or_else(|| ConduitError::EndpointInUse {
                    name: rule.source.clone(),
                })?;

        self.forwarders.push(tokio::spawn(async move {
            while let Some(message) = source_rx.recv().await {
                if sink_tx.send(message).await.is_err() {
                    break;
                }
            }
        }));
        Ok(())
    }

    /// Returns a producer for the named endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ConduitError::UnknownEndpoint`] when the name is
    /// undeclared.
    pub fn sender(&self, name: &str) -> Result<mpsc::Sender<T>, ConduitError> {
        self.senders
            .get(name)
            .cloned()
            .ok_or_else(|| ConduitError::UnknownEndpoint {
                name: name.to_owned(),
            })
    }

    /// Claims the consuming side of the named endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ConduitError::UnknownEndpoint`] when the name is
    /// undeclared and [`ConduitError::EndpointInUse`] when the consuming
    /// side has already been claimed.
    pub fn take_receiver(&mut self, name: &str) -> Result<mpsc::Receiver<T>, ConduitError> {
        if !self.senders.contains_key(name) {
            return Err(ConduitError::UnknownEndpoint {
                name: name.to_owned(),
            });
        }
        self.receivers
            .remove(name)
            .ok_or_else(|| ConduitError::EndpointInUse {
                name: name.to_owned(),
            })
    }
}

impl<T> Drop for Conduit<T> {
    fn drop(&mut self) {
        for forwarder in &self.forwarders {
            forwarder.abort();
        }
    }
}
