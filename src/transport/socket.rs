//! Socket roles over the in-process transport.
//!
//! - `RouterSocket` binds and receives `(identity, frames)` from many
//!   `DealerSocket`s, replying to any one of them by identity.
//! - `PullSocket::bind` collects frames from many `PushSocket::connect`ers.
//! - `PushSocket::bind` hands frames to whichever `PullSocket::connect`er
//!   receives them first.
//!
//! All channels are bounded by `TransportConfig::socket_capacity`, so a fast
//! sender blocks once its peer falls that far behind.

use crate::pipeline::id::ClientId;
use crate::transport::context::{lock, Context, Endpoint, PeerTable};
use crate::transport::error::{TransportError, TransportResult};
use crate::transport::Frames;
use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn role_mismatch(uri: &str, expected: &'static str, actual: &Endpoint) -> TransportError {
    TransportError::RoleMismatch {
        uri: uri.to_string(),
        expected,
        actual: actual.role(),
    }
}

fn try_recv_from<T>(rx: &Receiver<T>, uri: &str) -> TransportResult<Option<T>> {
    match rx.try_recv() {
        Ok(value) => Ok(Some(value)),
        Err(TryRecvError::Empty) => Ok(None),
        Err(TryRecvError::Disconnected) => Err(TransportError::Disconnected(uri.to_string())),
    }
}

// ── Router / Dealer ──

/// Server side of the identity-routed request/reply pattern.
pub struct RouterSocket {
    ctx: Arc<Context>,
    uri: String,
    inbound: Receiver<(ClientId, Frames)>,
    peers: PeerTable,
}

impl RouterSocket {
    pub fn bind(ctx: &Arc<Context>, uri: &str) -> TransportResult<Self> {
        let (inbound_tx, inbound) = bounded(ctx.config().socket_capacity);
        let peers = PeerTable::default();
        ctx.bind(
            uri,
            Endpoint::Router {
                inbound: inbound_tx,
                peers: peers.clone(),
            },
        )?;
        Ok(Self {
            ctx: ctx.clone(),
            uri: uri.to_string(),
            inbound,
            peers,
        })
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Block for the next message from any dealer.
    pub fn recv(&self) -> TransportResult<(ClientId, Frames)> {
        self.inbound
            .recv()
            .map_err(|_| TransportError::Disconnected(self.uri.clone()))
    }

    pub fn try_recv(&self) -> TransportResult<Option<(ClientId, Frames)>> {
        try_recv_from(&self.inbound, &self.uri)
    }

    /// Deliver frames to one connected dealer.
    pub fn send_to(&self, peer: ClientId, frames: Frames) -> TransportResult<()> {
        let reply = lock(&self.peers)
            .get(&peer)
            .cloned()
            .ok_or(TransportError::UnknownPeer(peer))?;
        reply
            .send(frames)
            .map_err(|_| TransportError::UnknownPeer(peer))
    }

    /// Number of dealers currently connected.
    pub fn peer_count(&self) -> usize {
        lock(&self.peers).len()
    }
}

impl Drop for RouterSocket {
    fn drop(&mut self) {
        self.ctx.unbind(&self.uri);
        // Dropping the reply senders wakes any dealer still blocked in recv.
        lock(&self.peers).clear();
    }
}

/// Client side of the identity-routed request/reply pattern.
pub struct DealerSocket {
    uri: String,
    identity: ClientId,
    outbound: Sender<(ClientId, Frames)>,
    replies: Receiver<Frames>,
    peers: PeerTable,
}

impl DealerSocket {
    pub fn connect(ctx: &Arc<Context>, uri: &str, identity: ClientId) -> TransportResult<Self> {
        let (inbound, peers) = match ctx.lookup(uri)? {
            Endpoint::Router { inbound, peers } => (inbound, peers),
            other => return Err(role_mismatch(uri, "router", &other)),
        };
        let (reply_tx, replies) = bounded(ctx.config().socket_capacity);
        if lock(&peers).insert(identity, reply_tx).is_some() {
            tracing::warn!("{} reconnected to '{}', replacing its reply channel", identity, uri);
        }
        Ok(Self {
            uri: uri.to_string(),
            identity,
            outbound: inbound,
            replies,
            peers,
        })
    }

    pub fn identity(&self) -> ClientId {
        self.identity
    }

    pub fn send(&self, frames: Frames) -> TransportResult<()> {
        self.outbound
            .send((self.identity, frames))
            .map_err(|_| TransportError::Disconnected(self.uri.clone()))
    }

    /// Block for the next reply from the router.
    pub fn recv(&self) -> TransportResult<Frames> {
        self.replies
            .recv()
            .map_err(|_| TransportError::Disconnected(self.uri.clone()))
    }
}

impl Drop for DealerSocket {
    fn drop(&mut self) {
        lock(&self.peers).remove(&self.identity);
    }
}

// ── Push / Pull ──

/// Receiving end of a one-way channel.
pub struct PullSocket {
    bound: Option<Arc<Context>>,
    uri: String,
    inbound: Receiver<Frames>,
}

impl PullSocket {
    /// Bind a collecting endpoint that many pushers connect to.
    pub fn bind(ctx: &Arc<Context>, uri: &str) -> TransportResult<Self> {
        let (inbound_tx, inbound) = bounded(ctx.config().socket_capacity);
        ctx.bind(uri, Endpoint::Pull { inbound: inbound_tx })?;
        Ok(Self {
            bound: Some(ctx.clone()),
            uri: uri.to_string(),
            inbound,
        })
    }

    /// Connect to a bound push endpoint.
    pub fn connect(ctx: &Arc<Context>, uri: &str) -> TransportResult<Self> {
        let outbound = match ctx.lookup(uri)? {
            Endpoint::Push { outbound } => outbound,
            other => return Err(role_mismatch(uri, "push", &other)),
        };
        Ok(Self {
            bound: None,
            uri: uri.to_string(),
            inbound: outbound,
        })
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn recv(&self) -> TransportResult<Frames> {
        self.inbound
            .recv()
            .map_err(|_| TransportError::Disconnected(self.uri.clone()))
    }
}

impl Drop for PullSocket {
    fn drop(&mut self) {
        if let Some(ctx) = &self.bound {
            ctx.unbind(&self.uri);
        }
    }
}

/// Sending end of a one-way channel.
pub struct PushSocket {
    bound: Option<Arc<Context>>,
    uri: String,
    outbound: Sender<Frames>,
}

impl PushSocket {
    /// Bind a send-only endpoint that a puller connects to.
    pub fn bind(ctx: &Arc<Context>, uri: &str) -> TransportResult<Self> {
        let (outbound, outbound_rx) = bounded(ctx.config().socket_capacity);
        ctx.bind(
            uri,
            Endpoint::Push {
                outbound: outbound_rx,
            },
        )?;
        Ok(Self {
            bound: Some(ctx.clone()),
            uri: uri.to_string(),
            outbound,
        })
    }

    /// Connect to a bound pull endpoint.
    pub fn connect(ctx: &Arc<Context>, uri: &str) -> TransportResult<Self> {
        let inbound = match ctx.lookup(uri)? {
            Endpoint::Pull { inbound } => inbound,
            other => return Err(role_mismatch(uri, "pull", &other)),
        };
        Ok(Self {
            bound: None,
            uri: uri.to_string(),
            outbound: inbound,
        })
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn send(&self, frames: Frames) -> TransportResult<()> {
        self.outbound
            .send(frames)
            .map_err(|_| TransportError::Disconnected(self.uri.clone()))
    }

    /// Frames sent but not yet taken by a peer.
    pub fn queued(&self) -> usize {
        self.outbound.len()
    }

    /// Wait for a peer to take the queued frames. Gives up once `timeout`
    /// passes with no frame taken; returns how many were left behind.
    pub fn linger(&self, timeout: Duration, poll: Duration) -> usize {
        let mut left = self.queued();
        let mut deadline = Instant::now() + timeout;
        while left > 0 && Instant::now() < deadline {
            std::thread::sleep(poll);
            let now_left = self.queued();
            if now_left < left {
                deadline = Instant::now() + timeout;
            }
            left = now_left;
        }
        left
    }
}

impl Drop for PushSocket {
    fn drop(&mut self) {
        if let Some(ctx) = &self.bound {
            ctx.unbind(&self.uri);
        }
    }
}
