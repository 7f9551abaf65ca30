//! PushDataSource: an element that reads a [`DataSource`] and pushes
//! every converted item to a bound endpoint.
//!
//! One-way: the element accepts no inbound traffic. Registrations,
//! unregistrations and data requests reaching it are protocol violations.
//! A [`PipelinePullSource`](super::PipelinePullSource) consumes the stream.

use crate::pipeline::codec;
use crate::pipeline::connection::RejectingConnection;
use crate::pipeline::converter::DataItemConverter;
use crate::pipeline::element::{ElementContext, ElementStrategy};
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::message::Message;
use crate::pipeline::source::DataSource;
use crate::transport::{Context, PushSocket};
use std::sync::Arc;

pub struct PushDataSource<D, C> {
    name: String,
    ctx: Arc<Context>,
    uri: String,
    source: D,
    converter: C,
    push: Option<PushSocket>,
    pushed: u64,
}

impl<D: DataSource, C: DataItemConverter> PushDataSource<D, C> {
    pub fn new(
        name: impl Into<String>,
        ctx: Arc<Context>,
        uri: impl Into<String>,
        source: D,
        converter: C,
    ) -> Self {
        Self {
            name: name.into(),
            ctx,
            uri: uri.into(),
            source,
            converter,
            push: None,
            pushed: 0,
        }
    }

    /// A handle that refuses every message.
    pub fn connection(&self) -> RejectingConnection {
        RejectingConnection::new(self.name.clone())
    }

    fn push(&self) -> PipelineResult<&PushSocket> {
        self.push
            .as_ref()
            .ok_or_else(|| PipelineError::NotConnected(self.uri.clone()))
    }

    fn reject(&self, msg: &Message) -> PipelineError {
        PipelineError::protocol(format!(
            "'{}' is a push source and cannot handle {:?}",
            self.name, msg.kind
        ))
    }
}

impl<D, C> ElementStrategy for PushDataSource<D, C>
where
    D: DataSource,
    C: DataItemConverter,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn connect_source(&mut self) -> PipelineResult<()> {
        self.source.connect()
    }

    fn connect_sink(&mut self) -> PipelineResult<()> {
        self.push = Some(PushSocket::bind(&self.ctx, &self.uri)?);
        tracing::info!("'{}' pushing to '{}'", self.name, self.uri);
        Ok(())
    }

    fn disconnect_sink(&mut self) -> PipelineResult<()> {
        if let Some(push) = self.push.take() {
            let config = self.ctx.config();
            let left = push.linger(config.linger(), config.connect_poll_interval());
            if left > 0 {
                tracing::warn!("'{}' abandoned {} messages on '{}'", self.name, left, self.uri);
            }
            tracing::info!("'{}' pushed {} messages", self.name, self.pushed);
        }
        Ok(())
    }

    fn disconnect_source(&mut self) -> PipelineResult<()> {
        self.source.disconnect()
    }

    fn next_work_item(&mut self) -> PipelineResult<Message> {
        let item = self.source.read()?;
        self.converter.convert(item)
    }

    fn send_work_item_to_sink(&mut self, msg: Message) -> PipelineResult<()> {
        let frames = codec::encode_batched(msg)?;
        self.push()?.send(frames)?;
        self.pushed += 1;
        Ok(())
    }

    fn process_work_item(&mut self, msg: Message, _ctx: &mut ElementContext) -> PipelineResult<()> {
        self.send_work_item_to_sink(msg)
    }

    fn on_end_item(&mut self, msg: Message, ctx: &mut ElementContext) -> PipelineResult<()> {
        self.send_work_item_to_sink(msg)?;
        ctx.stop();
        Ok(())
    }

    fn on_register(&mut self, msg: Message, _ctx: &mut ElementContext) -> PipelineResult<()> {
        Err(self.reject(&msg))
    }

    fn on_unregister(&mut self, msg: Message, _ctx: &mut ElementContext) -> PipelineResult<()> {
        Err(self.reject(&msg))
    }

    fn on_data_request(&mut self, msg: Message, _ctx: &mut ElementContext) -> PipelineResult<()> {
        Err(self.reject(&msg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransportConfig;
    use crate::pipeline::connection::ElementConnection;
    use crate::pipeline::converter::RecordConverter;
    use crate::pipeline::element::ProcessingElement;
    use crate::pipeline::id::ClientId;
    use crate::pipeline::message::MessageType;
    use crate::pipeline::record::RawItem;
    use crate::pipeline::source::MockDataSource;
    use crate::transport::PullSocket;
    use bytes::Bytes;
    use std::collections::VecDeque;

    fn test_context() -> Arc<Context> {
        Arc::new(Context::new(TransportConfig {
            connect_timeout_ms: 2_000,
            connect_poll_ms: 1,
            ..TransportConfig::default()
        }))
    }

    fn scripted_source(items: Vec<RawItem>) -> MockDataSource {
        let mut items = VecDeque::from(items);
        let mut mock = MockDataSource::new();
        mock.expect_connect().times(1).returning(|| Ok(()));
        mock.expect_read()
            .returning(move || Ok(items.pop_front().unwrap_or_else(RawItem::end)));
        mock.expect_disconnect().times(1).returning(|| Ok(()));
        mock
    }

    #[test]
    fn test_pushes_items_then_end() {
        let ctx = test_context();
        let source = scripted_source(vec![
            RawItem::new(Bytes::from_static(&[5, 0, 0, 0, 1])),
            RawItem::new(Bytes::from_static(&[6, 0, 0, 0, 2, 3])),
        ]);
        let element =
            PushDataSource::new("pusher", ctx.clone(), "inproc://push-src", source, RecordConverter);
        let handle = ProcessingElement::new(Box::new(element)).spawn().unwrap();

        let pull = PullSocket::connect(&ctx, "inproc://push-src").unwrap();
        let received: Vec<Message> = (0..3)
            .map(|_| codec::decode(pull.recv().unwrap()).unwrap())
            .collect();
        assert_eq!(codec::records(&received[0]).unwrap()[0].as_ref(), &[5, 0, 0, 0, 1]);
        assert_eq!(received[1].kind, MessageType::Process);
        assert!(received[2].is_end());

        let stats = handle.join().unwrap();
        assert_eq!(stats.process_items, 2);
        assert_eq!(stats.end_items, 1);
    }

    #[test]
    fn test_rejects_inbound_control() {
        let ctx = test_context();
        let mut element = PushDataSource::new(
            "pusher",
            ctx,
            "inproc://push-reject",
            MockDataSource::new(),
            RecordConverter,
        );
        let mut loop_ctx = ElementContext::new();
        for msg in [
            Message::registration(ClientId(1)),
            Message::unregistration(ClientId(1)),
            Message::data_request(ClientId(1)),
        ] {
            let result = match msg.kind {
                MessageType::Registration => element.on_register(msg, &mut loop_ctx),
                MessageType::Unregistration => element.on_unregister(msg, &mut loop_ctx),
                _ => element.on_data_request(msg, &mut loop_ctx),
            };
            assert!(matches!(result, Err(PipelineError::ProtocolViolation(_))));
        }
        assert!(element.connection().request_exit().is_err());
    }
}
