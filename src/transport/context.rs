//! Endpoint registry shared by every socket in a process.
//!
//! A `Context` is created once at startup, wrapped in an `Arc` and handed to
//! every element that opens a socket. Binding publishes an endpoint under a
//! URI; connecting looks the URI up, waiting a bounded time for a peer that
//! has not bound yet.

use crate::config::TransportConfig;
use crate::pipeline::id::ClientId;
use crate::transport::error::{TransportError, TransportResult};
use crate::transport::Frames;
use crossbeam_channel::{Receiver, Sender};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// Reply channels of the dealers connected to one router.
pub(crate) type PeerTable = Arc<Mutex<HashMap<ClientId, Sender<Frames>>>>;

#[derive(Clone)]
pub(crate) enum Endpoint {
    Router {
        inbound: Sender<(ClientId, Frames)>,
        peers: PeerTable,
    },
    Pull {
        inbound: Sender<Frames>,
    },
    Push {
        outbound: Receiver<Frames>,
    },
}

impl Endpoint {
    pub(crate) fn role(&self) -> &'static str {
        match self {
            Endpoint::Router { .. } => "router",
            Endpoint::Pull { .. } => "pull",
            Endpoint::Push { .. } => "push",
        }
    }
}

/// Lock a mutex, recovering the data if a holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct Context {
    config: TransportConfig,
    endpoints: Mutex<HashMap<String, Endpoint>>,
}

impl Context {
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config,
            endpoints: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn is_bound(&self, uri: &str) -> bool {
        lock(&self.endpoints).contains_key(uri)
    }

    pub(crate) fn bind(&self, uri: &str, endpoint: Endpoint) -> TransportResult<()> {
        let mut endpoints = lock(&self.endpoints);
        if endpoints.contains_key(uri) {
            return Err(TransportError::AddressInUse(uri.to_string()));
        }
        tracing::debug!("Bound {} endpoint at '{}'", endpoint.role(), uri);
        endpoints.insert(uri.to_string(), endpoint);
        Ok(())
    }

    pub(crate) fn unbind(&self, uri: &str) {
        if lock(&self.endpoints).remove(uri).is_some() {
            tracing::debug!("Unbound endpoint at '{}'", uri);
        }
    }

    /// Find the endpoint bound at `uri`, polling until the connect timeout.
    pub(crate) fn lookup(&self, uri: &str) -> TransportResult<Endpoint> {
        let deadline = Instant::now() + self.config.connect_timeout();
        loop {
            if let Some(endpoint) = lock(&self.endpoints).get(uri) {
                return Ok(endpoint.clone());
            }
            if Instant::now() >= deadline {
                return Err(TransportError::NotBound(uri.to_string()));
            }
            std::thread::sleep(self.config.connect_poll_interval());
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new(TransportConfig::default())
    }
}
