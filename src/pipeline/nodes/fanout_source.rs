//! FanoutBalancedSource: pulls work from a [`FanoutBalancedSink`](super::FanoutBalancedSink).
//!
//! Each call to `get_next_item` hands out one record. When the local
//! queue runs dry the source sends a data request and blocks for the
//! reply; a batched reply refills the queue in one go.

use crate::pipeline::codec;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::id::ClientId;
use crate::pipeline::message::{Message, MessageType};
use crate::pipeline::source::MessageSource;
use crate::transport::{Context, DealerSocket};
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::Arc;

pub struct FanoutBalancedSource {
    ctx: Arc<Context>,
    uri: String,
    identity: Option<ClientId>,
    dealer: Option<DealerSocket>,
    records: VecDeque<Bytes>,
    ended: bool,
    requests: u64,
}

impl FanoutBalancedSource {
    pub fn new(ctx: Arc<Context>, uri: impl Into<String>) -> Self {
        Self {
            ctx,
            uri: uri.into(),
            identity: None,
            dealer: None,
            records: VecDeque::new(),
            ended: false,
            requests: 0,
        }
    }

    /// Use a fixed identity instead of the connecting thread's.
    pub fn with_identity(mut self, id: ClientId) -> Self {
        self.identity = Some(id);
        self
    }

    /// Identity in use; the connecting thread's unless fixed.
    pub fn identity(&self) -> ClientId {
        self.identity.unwrap_or_else(ClientId::current)
    }

    pub fn is_connected(&self) -> bool {
        self.dealer.is_some()
    }

    /// Records received but not yet handed out.
    pub fn buffered(&self) -> usize {
        self.records.len()
    }

    fn dealer(&self) -> PipelineResult<&DealerSocket> {
        self.dealer
            .as_ref()
            .ok_or_else(|| PipelineError::NotConnected(self.uri.clone()))
    }

    fn request(&mut self) -> PipelineResult<Message> {
        let id = self.identity();
        let dealer = self.dealer()?;
        dealer.send(codec::encode(Message::data_request(id))?)?;
        let reply = codec::decode(dealer.recv()?)?;
        self.requests += 1;
        Ok(reply)
    }
}

impl MessageSource for FanoutBalancedSource {
    fn connect(&mut self) -> PipelineResult<()> {
        if self.dealer.is_some() {
            return Ok(());
        }
        let id = self.identity();
        self.identity = Some(id);
        let dealer = DealerSocket::connect(&self.ctx, &self.uri, id)?;
        dealer.send(codec::encode(Message::registration(id))?)?;
        self.dealer = Some(dealer);
        tracing::debug!("{} registered with '{}'", id, self.uri);
        Ok(())
    }

    fn disconnect(&mut self) -> PipelineResult<()> {
        let Some(dealer) = self.dealer.take() else {
            return Ok(());
        };
        let id = self.identity();
        if !self.records.is_empty() {
            tracing::warn!("{} dropping {} unprocessed records", id, self.records.len());
            self.records.clear();
        }
        dealer.send(codec::encode(Message::unregistration(id))?)?;
        tracing::debug!("{} unregistered from '{}' after {} requests", id, self.uri, self.requests);
        Ok(())
    }

    fn get_next_item(&mut self) -> PipelineResult<Message> {
        loop {
            if let Some(record) = self.records.pop_front() {
                return Ok(Message::process(vec![record]));
            }
            if self.ended {
                return Ok(Message::end());
            }
            let reply = self.request()?;
            match reply.kind {
                MessageType::Process => self.records.extend(codec::records(&reply)?),
                MessageType::End => self.ended = true,
                _ => return Ok(reply),
            }
        }
    }
}

impl Drop for FanoutBalancedSource {
    fn drop(&mut self) {
        if let Err(e) = self.disconnect() {
            tracing::warn!("Failed to unregister from '{}': {}", self.uri, e);
        }
    }
}
