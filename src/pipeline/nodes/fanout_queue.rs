//! FanoutQueue: load-balancing state machine of the fan-out sink.
//!
//! Pure bookkeeping, no transport: every operation returns the deliveries
//! the caller must perform, as `(client, message)` pairs.
//!
//! # Rules
//!
//! - A queued message goes to the oldest pending request, one message per
//!   request.
//! - A barrier goes to every registered client exactly once. While it is
//!   in progress, a request from an unserved client is answered with the
//!   barrier and a request from a served client is deferred. Once every
//!   registered client is served the deferred requests are replayed.
//! - `End` must be the last queued message. Reaching it starts the rundown:
//!   every pending and every later request is answered with `End`. The
//!   queue is drained once all clients have unregistered.

use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::id::ClientId;
use crate::pipeline::message::{Message, MessageType};
use std::collections::{HashSet, VecDeque};

/// One reply the owner of the queue must send.
pub type Delivery = (ClientId, Message);

/// Decides which messages are barriers.
pub type BarrierClassifier = Box<dyn Fn(&Message) -> bool + Send>;

struct BarrierState {
    message: Message,
    served: HashSet<ClientId>,
    deferred: VecDeque<ClientId>,
}

pub struct FanoutQueue {
    messages: VecDeque<Message>,
    pending: VecDeque<ClientId>,
    clients: HashSet<ClientId>,
    seen: HashSet<ClientId>,
    expected_clients: usize,
    barrier: Option<BarrierState>,
    rundown: bool,
    is_barrier: BarrierClassifier,
}

impl Default for FanoutQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl FanoutQueue {
    pub fn new() -> Self {
        Self {
            messages: VecDeque::new(),
            pending: VecDeque::new(),
            clients: HashSet::new(),
            seen: HashSet::new(),
            expected_clients: 0,
            barrier: None,
            rundown: false,
            is_barrier: Box::new(|msg| msg.kind == MessageType::Barrier),
        }
    }

    /// Replace the default barrier test (`MessageType::Barrier`).
    pub fn with_barrier_classifier<F>(mut self, classifier: F) -> Self
    where
        F: Fn(&Message) -> bool + Send + 'static,
    {
        self.is_barrier = Box::new(classifier);
        self
    }

    /// Do not consider the rundown finished before this many distinct
    /// clients have registered.
    pub fn with_expected_clients(mut self, count: usize) -> Self {
        self.expected_clients = count;
        self
    }

    /// Queue a message for the next requester.
    pub fn send(&mut self, msg: Message) -> PipelineResult<Vec<Delivery>> {
        if self.rundown {
            return Err(PipelineError::protocol(format!(
                "{:?} message sent after the end of the stream",
                msg.kind
            )));
        }
        self.messages.push_back(msg);
        self.flush()
    }

    /// Record a pull request from `id`.
    pub fn request(&mut self, id: ClientId) -> PipelineResult<Vec<Delivery>> {
        self.pending.push_back(id);
        self.flush()
    }

    /// Add a client. Returns false if it was already registered.
    pub fn register(&mut self, id: ClientId) -> bool {
        self.seen.insert(id);
        self.clients.insert(id)
    }

    /// Remove a client and every request it still has outstanding. This can
    /// complete a barrier, so deliveries may result.
    pub fn unregister(&mut self, id: ClientId) -> PipelineResult<Vec<Delivery>> {
        self.clients.remove(&id);
        self.pending.retain(|pending| *pending != id);
        if let Some(barrier) = self.barrier.as_mut() {
            barrier.deferred.retain(|deferred| *deferred != id);
        }
        self.flush()
    }

    pub fn in_rundown(&self) -> bool {
        self.rundown
    }

    /// Rundown reached and every client is gone.
    pub fn is_drained(&self) -> bool {
        self.rundown && self.clients.is_empty() && self.seen.len() >= self.expected_clients
    }

    pub fn barrier_active(&self) -> bool {
        self.barrier.is_some()
    }

    pub fn queued_messages(&self) -> usize {
        self.messages.len()
    }

    pub fn pending_requests(&self) -> usize {
        self.pending.len()
            + self
                .barrier
                .as_ref()
                .map_or(0, |barrier| barrier.deferred.len())
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn is_registered(&self, id: ClientId) -> bool {
        self.clients.contains(&id)
    }

    fn flush(&mut self) -> PipelineResult<Vec<Delivery>> {
        let mut out = Vec::new();
        loop {
            if self.rundown {
                out.extend(self.pending.drain(..).map(|id| (id, Message::end())));
                break;
            }
            if self.barrier.is_some() {
                self.serve_barrier(&mut out);
                if self.barrier.is_some() {
                    break;
                }
                continue;
            }
            if self.messages.is_empty() || self.pending.is_empty() {
                break;
            }

            let Some(msg) = self.messages.pop_front() else {
                break;
            };
            if msg.is_end() {
                if !self.messages.is_empty() {
                    if !out.is_empty() {
                        let dropped: Vec<(ClientId, MessageType)> =
                            out.iter().map(|(id, msg)| (*id, msg.kind)).collect();
                        tracing::error!("Discarding deliveries assigned before END: {:?}", dropped);
                    }
                    return Err(PipelineError::protocol(format!(
                        "END item is followed by {} queued messages ({} assigned deliveries discarded)",
                        self.messages.len(),
                        out.len()
                    )));
                }
                tracing::info!(
                    "End of stream reached, running down {} clients",
                    self.clients.len()
                );
                self.rundown = true;
                continue;
            }

            let Some(id) = self.pending.pop_front() else {
                break;
            };
            if (self.is_barrier)(&msg) {
                tracing::debug!("Barrier started with {} registered clients", self.clients.len());
                out.push((id, msg.clone()));
                self.barrier = Some(BarrierState {
                    message: msg,
                    served: HashSet::from([id]),
                    deferred: VecDeque::new(),
                });
                continue;
            }
            out.push((id, msg));
        }
        Ok(out)
    }

    /// Answer pending requests under the barrier rule and retire the
    /// barrier once every registered client holds it.
    fn serve_barrier(&mut self, out: &mut Vec<Delivery>) {
        let Some(barrier) = self.barrier.as_mut() else {
            return;
        };
        while let Some(id) = self.pending.pop_front() {
            if barrier.served.insert(id) {
                out.push((id, barrier.message.clone()));
            } else {
                barrier.deferred.push_back(id);
            }
        }
        if self.clients.is_subset(&barrier.served) {
            let deferred = std::mem::take(&mut barrier.deferred);
            tracing::debug!("Barrier complete, replaying {} deferred requests", deferred.len());
            self.barrier = None;
            self.pending.extend(deferred);
        }
    }
}
