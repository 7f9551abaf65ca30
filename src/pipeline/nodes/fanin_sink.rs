//! FanInSink: pushes an element's output into a [`FanInSource`](super::FanInSource).

use crate::pipeline::codec;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::id::ClientId;
use crate::pipeline::message::Message;
use crate::pipeline::sink::DataSink;
use crate::transport::{Context, PushSocket};
use std::sync::Arc;

pub struct FanInSink {
    ctx: Arc<Context>,
    uri: String,
    identity: Option<ClientId>,
    push: Option<PushSocket>,
    sent: u64,
}

impl FanInSink {
    pub fn new(ctx: Arc<Context>, uri: impl Into<String>) -> Self {
        Self {
            ctx,
            uri: uri.into(),
            identity: None,
            push: None,
            sent: 0,
        }
    }

    /// Use a fixed identity instead of the connecting thread's.
    pub fn with_identity(mut self, id: ClientId) -> Self {
        self.identity = Some(id);
        self
    }

    pub fn identity(&self) -> ClientId {
        self.identity.unwrap_or_else(ClientId::current)
    }

    /// Messages pushed so far, control messages included.
    pub fn sent(&self) -> u64 {
        self.sent
    }

    fn push(&self) -> PipelineResult<&PushSocket> {
        self.push
            .as_ref()
            .ok_or_else(|| PipelineError::NotConnected(self.uri.clone()))
    }
}

impl DataSink for FanInSink {
    fn connect(&mut self) -> PipelineResult<()> {
        let id = self.identity();
        self.identity = Some(id);
        let push = PushSocket::connect(&self.ctx, &self.uri)?;
        push.send(codec::encode(Message::registration(id))?)?;
        self.push = Some(push);
        tracing::debug!("{} producing into '{}'", id, self.uri);
        Ok(())
    }

    fn disconnect(&mut self) -> PipelineResult<()> {
        let Some(push) = self.push.take() else {
            return Ok(());
        };
        let id = self.identity();
        push.send(codec::encode(Message::unregistration(id))?)?;
        tracing::debug!("{} done producing into '{}' after {} messages", id, self.uri, self.sent);
        Ok(())
    }

    fn send(&mut self, msg: Message) -> PipelineResult<()> {
        let frames = codec::encode_batched(msg)?;
        self.push()?.send(frames)?;
        self.sent += 1;
        Ok(())
    }
}

impl Drop for FanInSink {
    fn drop(&mut self) {
        if let Err(e) = self.disconnect() {
            tracing::warn!("Failed to unregister from '{}': {}", self.uri, e);
        }
    }
}
