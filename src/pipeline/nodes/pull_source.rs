//! PipelinePullSource: consumes the stream of a [`PushDataSource`](super::PushDataSource).

use crate::pipeline::codec;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::message::{Message, MessageType};
use crate::pipeline::source::MessageSource;
use crate::transport::{Context, PullSocket};
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::Arc;

pub struct PipelinePullSource {
    ctx: Arc<Context>,
    uri: String,
    pull: Option<PullSocket>,
    records: VecDeque<Bytes>,
    ended: bool,
}

impl PipelinePullSource {
    pub fn new(ctx: Arc<Context>, uri: impl Into<String>) -> Self {
        Self {
            ctx,
            uri: uri.into(),
            pull: None,
            records: VecDeque::new(),
            ended: false,
        }
    }
}

impl MessageSource for PipelinePullSource {
    fn connect(&mut self) -> PipelineResult<()> {
        self.pull = Some(PullSocket::connect(&self.ctx, &self.uri)?);
        tracing::debug!("Pulling from '{}'", self.uri);
        Ok(())
    }

    fn disconnect(&mut self) -> PipelineResult<()> {
        self.pull = None;
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
            let pull = self
                .pull
                .as_ref()
                .ok_or_else(|| PipelineError::NotConnected(self.uri.clone()))?;
            let msg = codec::decode(pull.recv()?)?;
            match msg.kind {
                MessageType::Process => self.records.extend(codec::records(&msg)?),
                MessageType::End => self.ended = true,
                _ => return Ok(msg),
            }
        }
    }
}
