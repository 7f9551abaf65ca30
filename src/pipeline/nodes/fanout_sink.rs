//! FanoutBalancedSink: serves queued messages to pulling clients.
//!
//! Binds a router endpoint. Clients register, then send one data request
//! per message they want; the [`FanoutQueue`] decides who gets what. Once
//! the end of the stream has been handed out the sink runs down: it keeps
//! answering requests with `End` on the calling thread until every client
//! has unregistered.

use super::fanout_queue::{Delivery, FanoutQueue};
use crate::config::DEFAULT_HIGH_WATER_MARK;
use crate::pipeline::codec;
use crate::pipeline::connection::{DealerConnection, PeerConnector};
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::id::ClientId;
use crate::pipeline::message::{Message, MessageType};
use crate::pipeline::sink::DataSink;
use crate::transport::{Context, RouterSocket, TransportError};
use std::sync::Arc;

pub struct FanoutBalancedSink {
    ctx: Arc<Context>,
    uri: String,
    router: Option<RouterSocket>,
    queue: FanoutQueue,
    high_water_mark: usize,
    ran_down: bool,
    /// Exit request cut short a rundown; handed to the element next.
    held_exit: Option<Message>,
    delivered: u64,
}

impl FanoutBalancedSink {
    pub fn new(ctx: Arc<Context>, uri: impl Into<String>) -> Self {
        Self {
            ctx,
            uri: uri.into(),
            router: None,
            queue: FanoutQueue::new(),
            high_water_mark: DEFAULT_HIGH_WATER_MARK,
            ran_down: false,
            held_exit: None,
            delivered: 0,
        }
    }

    /// Queue depth at which the owning element stops reading its source.
    pub fn with_high_water_mark(mut self, high_water_mark: usize) -> Self {
        self.high_water_mark = high_water_mark.max(1);
        self
    }

    pub fn with_barrier_classifier<F>(mut self, classifier: F) -> Self
    where
        F: Fn(&Message) -> bool + Send + 'static,
    {
        self.queue = std::mem::take(&mut self.queue).with_barrier_classifier(classifier);
        self
    }

    /// Keep running down until this many clients have come and gone.
    pub fn with_expected_clients(mut self, count: usize) -> Self {
        self.queue = std::mem::take(&mut self.queue).with_expected_clients(count);
        self
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn queue(&self) -> &FanoutQueue {
        &self.queue
    }

    /// Messages handed to clients so far.
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    fn router(&self) -> PipelineResult<&RouterSocket> {
        self.router
            .as_ref()
            .ok_or_else(|| PipelineError::NotConnected(self.uri.clone()))
    }

    fn deliver(&mut self, deliveries: Vec<Delivery>) -> PipelineResult<()> {
        for (id, msg) in deliveries {
            let kind = msg.kind;
            let frames = codec::encode_batched(msg)?;
            match self.router()?.send_to(id, frames) {
                Ok(()) => self.delivered += 1,
                // A client can disappear between its last request and our END.
                Err(TransportError::UnknownPeer(_)) if kind == MessageType::End => {
                    tracing::warn!("{} left before receiving END", id);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn after_queue_change(&mut self, deliveries: Vec<Delivery>) -> PipelineResult<()> {
        self.deliver(deliveries)?;
        if self.queue.in_rundown() && !self.ran_down {
            self.ran_down = true;
            self.run_down()?;
        }
        Ok(())
    }

    /// Answer control traffic until every client has unregistered.
    fn run_down(&mut self) -> PipelineResult<()> {
        tracing::info!(
            "Running down '{}' with {} registered clients",
            self.uri,
            self.queue.client_count()
        );
        while !self.queue.is_drained() {
            let (_, frames) = self.router()?.recv()?;
            let msg = codec::decode(frames)?;
            let deliveries = match msg.kind {
                MessageType::Registration => {
                    let id = msg.identity()?;
                    tracing::info!("{} registered with '{}' during rundown", id, self.uri);
                    self.queue.register(id);
                    Vec::new()
                }
                MessageType::Unregistration => self.queue.unregister(msg.identity()?)?,
                MessageType::DataRequest => self.queue.request(msg.identity()?)?,
                MessageType::ExitRequest => {
                    tracing::warn!(
                        "Exit requested during rundown of '{}', abandoning {} clients",
                        self.uri,
                        self.queue.client_count()
                    );
                    self.held_exit = Some(msg);
                    break;
                }
                other => {
                    tracing::warn!("Dropping {:?} received during rundown of '{}'", other, self.uri);
                    Vec::new()
                }
            };
            self.deliver(deliveries)?;
        }
        tracing::info!("Rundown of '{}' complete", self.uri);
        Ok(())
    }
}

impl DataSink for FanoutBalancedSink {
    fn connect(&mut self) -> PipelineResult<()> {
        self.router = Some(RouterSocket::bind(&self.ctx, &self.uri)?);
        tracing::info!("Fan-out sink bound to '{}'", self.uri);
        Ok(())
    }

    fn disconnect(&mut self) -> PipelineResult<()> {
        if self.router.take().is_some() {
            if self.queue.queued_messages() > 0 || self.queue.client_count() > 0 {
                tracing::warn!(
                    "Fan-out sink '{}' closing with {} queued messages and {} clients",
                    self.uri,
                    self.queue.queued_messages(),
                    self.queue.client_count()
                );
            }
            tracing::info!("Fan-out sink '{}' delivered {} messages", self.uri, self.delivered);
        }
        Ok(())
    }

    fn send(&mut self, msg: Message) -> PipelineResult<()> {
        let deliveries = self.queue.send(msg)?;
        self.after_queue_change(deliveries)
    }

    fn try_get_message(&mut self) -> PipelineResult<Option<Message>> {
        if let Some(msg) = self.held_exit.take() {
            return Ok(Some(msg));
        }
        match self.router()?.try_recv()? {
            Some((_, frames)) => Ok(Some(codec::decode(frames)?)),
            None => Ok(None),
        }
    }

    fn get_message(&mut self) -> PipelineResult<Message> {
        if let Some(msg) = self.held_exit.take() {
            return Ok(msg);
        }
        let (_, frames) = self.router()?.recv()?;
        codec::decode(frames)
    }

    fn on_pull_request(&mut self, id: ClientId) -> PipelineResult<()> {
        let deliveries = self.queue.request(id)?;
        self.after_queue_change(deliveries)
    }

    fn register(&mut self, id: ClientId) -> PipelineResult<()> {
        if self.queue.register(id) {
            tracing::info!(
                "{} registered with '{}' ({} clients)",
                id,
                self.uri,
                self.queue.client_count()
            );
        } else {
            tracing::warn!("{} registered twice with '{}'", id, self.uri);
        }
        Ok(())
    }

    fn unregister(&mut self, id: ClientId) -> PipelineResult<()> {
        tracing::info!("{} unregistered from '{}'", id, self.uri);
        let deliveries = self.queue.unregister(id)?;
        self.after_queue_change(deliveries)
    }

    fn is_drained(&self) -> bool {
        self.queue.is_drained()
    }

    fn wants_input(&self) -> bool {
        self.queue.queued_messages() < self.high_water_mark
    }

    fn peer_connector(&self) -> Option<PeerConnector> {
        Some(DealerConnection::connector(self.ctx.clone(), self.uri.clone()))
    }
}
