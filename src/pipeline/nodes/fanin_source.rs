//! FanInSource: collects pushed messages from many producers.
//!
//! Producers register when they connect and unregister when they leave.
//! The source reports `End` only once the expected number of producers
//! has registered, all of them have unregistered and every record has
//! been handed out.

use crate::pipeline::codec;
use crate::pipeline::connection::{PeerConnector, PushConnection};
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::id::ClientId;
use crate::pipeline::message::{Message, MessageType};
use crate::pipeline::source::MessageSource;
use crate::transport::{Context, PullSocket};
use bytes::Bytes;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

pub struct FanInSource {
    ctx: Arc<Context>,
    uri: String,
    pull: Option<PullSocket>,
    records: VecDeque<Bytes>,
    producers: HashSet<ClientId>,
    seen: HashSet<ClientId>,
    expected_producers: usize,
}

impl FanInSource {
    pub fn new(ctx: Arc<Context>, uri: impl Into<String>) -> Self {
        Self {
            ctx,
            uri: uri.into(),
            pull: None,
            records: VecDeque::new(),
            producers: HashSet::new(),
            seen: HashSet::new(),
            expected_producers: 1,
        }
    }

    /// Hold off `End` until this many distinct producers have registered.
    pub fn with_expected_producers(mut self, count: usize) -> Self {
        self.expected_producers = count;
        self
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Producers currently registered.
    pub fn producer_count(&self) -> usize {
        self.producers.len()
    }

    fn finished(&self) -> bool {
        self.records.is_empty()
            && self.producers.is_empty()
            && self.seen.len() >= self.expected_producers
    }

    fn pull(&self) -> PipelineResult<&PullSocket> {
        self.pull
            .as_ref()
            .ok_or_else(|| PipelineError::NotConnected(self.uri.clone()))
    }
}

impl MessageSource for FanInSource {
    fn connect(&mut self) -> PipelineResult<()> {
        self.pull = Some(PullSocket::bind(&self.ctx, &self.uri)?);
        tracing::info!("Fan-in source bound to '{}'", self.uri);
        Ok(())
    }

    fn disconnect(&mut self) -> PipelineResult<()> {
        if self.pull.take().is_some() && !self.producers.is_empty() {
            tracing::warn!(
                "Fan-in source '{}' closing with {} producers still registered",
                self.uri,
                self.producers.len()
            );
        }
        Ok(())
    }

    fn get_next_item(&mut self) -> PipelineResult<Message> {
        loop {
            if let Some(record) = self.records.pop_front() {
                return Ok(Message::process(vec![record]));
            }
            if self.finished() {
                return Ok(Message::end());
            }

            let msg = codec::decode(self.pull()?.recv()?)?;
            match msg.kind {
                MessageType::Process => self.records.extend(codec::records(&msg)?),
                MessageType::Registration => {
                    let id = msg.identity()?;
                    self.seen.insert(id);
                    if self.producers.insert(id) {
                        tracing::info!(
                            "{} started producing into '{}' ({} producers)",
                            id,
                            self.uri,
                            self.producers.len()
                        );
                    }
                }
                MessageType::Unregistration => {
                    let id = msg.identity()?;
                    if !self.producers.remove(&id) {
                        tracing::warn!("{} unregistered from '{}' without registering", id, self.uri);
                    }
                }
                // Each producer ends its own stream; only the last one counts.
                MessageType::End => tracing::debug!("Producer END absorbed by '{}'", self.uri),
                _ => return Ok(msg),
            }
        }
    }

    fn peer_connector(&self) -> Option<PeerConnector> {
        Some(PushConnection::connector(self.ctx.clone(), self.uri.clone()))
    }
}
