//! PipelineElement: source → processor → sink on one element thread.
//!
//! ```text
//!   MessageSource ──► Processor ──► DataSink
//!                                      │
//!        control traffic from peers ◄──┘ (try_get_message / get_message)
//! ```
//!
//! Messages waiting at the sink are served before the source is read, and
//! the source is not read at all while the sink reports it wants no more
//! input. Once the source has ended the element only serves the sink, and
//! it stops as soon as the sink is drained.

use crate::pipeline::connection::{CombinedConnection, PeerConnector};
use crate::pipeline::element::{ElementContext, ElementStrategy};
use crate::pipeline::error::PipelineResult;
use crate::pipeline::message::{Message, MessageType};
use crate::pipeline::processor::{self, Processor};
use crate::pipeline::sink::DataSink;
use crate::pipeline::source::MessageSource;

/// Where the message being dispatched came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Source,
    Sink,
}

pub struct PipelineElement {
    name: String,
    source: Box<dyn MessageSource>,
    processor: Box<dyn Processor>,
    sink: Box<dyn DataSink>,
    source_done: bool,
    origin: Origin,
}

impl PipelineElement {
    pub fn new(
        name: impl Into<String>,
        source: impl MessageSource + 'static,
        processor: impl Processor + 'static,
        sink: impl DataSink + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            source: Box::new(source),
            processor: Box::new(processor),
            sink: Box::new(sink),
            source_done: false,
            origin: Origin::Source,
        }
    }

    fn stop_if_drained(&self, ctx: &mut ElementContext) {
        if self.source_done && self.sink.is_drained() {
            ctx.stop();
        }
    }
}

impl ElementStrategy for PipelineElement {
    fn name(&self) -> &str {
        &self.name
    }

    fn connect_source(&mut self) -> PipelineResult<()> {
        self.source.connect()
    }

    fn connect_sink(&mut self) -> PipelineResult<()> {
        self.sink.connect()
    }

    fn disconnect_sink(&mut self) -> PipelineResult<()> {
        self.sink.disconnect()
    }

    fn disconnect_source(&mut self) -> PipelineResult<()> {
        self.source.disconnect()
    }

    fn next_work_item(&mut self) -> PipelineResult<Message> {
        if !self.source_done && self.sink.wants_input() {
            if let Some(msg) = self.sink.try_get_message()? {
                self.origin = Origin::Sink;
                return Ok(msg);
            }
            let msg = self.source.get_next_item()?;
            self.origin = Origin::Source;
            if msg.is_end() {
                self.source_done = true;
            }
            return Ok(msg);
        }
        self.origin = Origin::Sink;
        self.sink.get_message()
    }

    fn send_work_item_to_sink(&mut self, msg: Message) -> PipelineResult<()> {
        self.sink.send(msg)
    }

    fn process_work_item(&mut self, msg: Message, _ctx: &mut ElementContext) -> PipelineResult<()> {
        let output = processor::apply(self.processor.as_mut(), msg)?;
        if output.kind == MessageType::Ignore {
            return Ok(());
        }
        self.sink.send(output)
    }

    fn on_end_item(&mut self, msg: Message, ctx: &mut ElementContext) -> PipelineResult<()> {
        if self.origin == Origin::Sink {
            tracing::warn!("{}: ignoring END received from a sink peer", self.name);
            return Ok(());
        }
        self.sink.send(msg)?;
        self.stop_if_drained(ctx);
        Ok(())
    }

    fn on_register(&mut self, msg: Message, ctx: &mut ElementContext) -> PipelineResult<()> {
        let id = msg.identity()?;
        match self.origin {
            Origin::Source => self.source.register(id),
            Origin::Sink => {
                self.sink.register(id)?;
                self.stop_if_drained(ctx);
                Ok(())
            }
        }
    }

    fn on_unregister(&mut self, msg: Message, ctx: &mut ElementContext) -> PipelineResult<()> {
        let id = msg.identity()?;
        match self.origin {
            Origin::Source => self.source.unregister(id),
            Origin::Sink => {
                self.sink.unregister(id)?;
                self.stop_if_drained(ctx);
                Ok(())
            }
        }
    }

    fn on_data_request(&mut self, msg: Message, ctx: &mut ElementContext) -> PipelineResult<()> {
        self.sink.on_pull_request(msg.identity()?)?;
        self.stop_if_drained(ctx);
        Ok(())
    }

    /// The element may be blocked on either side, so a message goes
    /// through both when both are reachable. The sink comes first, since a
    /// send into a full inbox blocks until the element has gone.
    fn peer_connector(&self) -> Option<PeerConnector> {
        match (self.sink.peer_connector(), self.source.peer_connector()) {
            (Some(sink), Some(source)) => Some(CombinedConnection::connector(vec![sink, source])),
            (sink, source) => sink.or(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::element::ProcessingElement;
    use crate::pipeline::error::PipelineError;
    use crate::pipeline::id::ClientId;
    use crate::pipeline::nodes::InboxSource;
    use crate::pipeline::connection::ElementConnection;
    use crate::pipeline::processor::PassThrough;
    use bytes::Bytes;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Sink recording what it is sent, with scripted peer traffic.
    #[derive(Clone, Default)]
    struct RecordingSink {
        sent: Arc<Mutex<Vec<Message>>>,
        peer: Arc<Mutex<VecDeque<Message>>>,
        registered: Arc<Mutex<Vec<ClientId>>>,
        requests: Arc<Mutex<Vec<ClientId>>>,
        drained_after_end: bool,
    }

    impl RecordingSink {
        fn sent(&self) -> Vec<Message> {
            self.sent.lock().unwrap().clone()
        }

        fn got_end(&self) -> bool {
            self.sent.lock().unwrap().iter().any(Message::is_end)
        }
    }

    impl DataSink for RecordingSink {
        fn connect(&mut self) -> PipelineResult<()> {
            Ok(())
        }

        fn disconnect(&mut self) -> PipelineResult<()> {
            Ok(())
        }

        fn send(&mut self, msg: Message) -> PipelineResult<()> {
            self.sent.lock().unwrap().push(msg);
            Ok(())
        }

        fn try_get_message(&mut self) -> PipelineResult<Option<Message>> {
            Ok(self.peer.lock().unwrap().pop_front())
        }

        fn get_message(&mut self) -> PipelineResult<Message> {
            self.peer
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| PipelineError::protocol("peer script exhausted"))
        }

        fn on_pull_request(&mut self, id: ClientId) -> PipelineResult<()> {
            self.requests.lock().unwrap().push(id);
            Ok(())
        }

        fn register(&mut self, id: ClientId) -> PipelineResult<()> {
            self.registered.lock().unwrap().push(id);
            Ok(())
        }

        fn unregister(&mut self, id: ClientId) -> PipelineResult<()> {
            self.registered.lock().unwrap().retain(|r| *r != id);
            Ok(())
        }

        fn is_drained(&self) -> bool {
            self.drained_after_end
                && self.got_end()
                && self.registered.lock().unwrap().is_empty()
        }
    }

    fn record(body: &[u8]) -> Bytes {
        let mut raw = ((body.len() + 4) as u32).to_le_bytes().to_vec();
        raw.extend_from_slice(body);
        Bytes::from(raw)
    }

    #[test]
    fn test_processes_until_end() {
        let inbox = InboxSource::new(16);
        let connection = inbox.connection();
        connection.queue_work_item(vec![record(b"a"), record(b"b")]).unwrap();
        connection.no_more_data().unwrap();

        let sink = RecordingSink {
            drained_after_end: true,
            ..RecordingSink::default()
        };
        let element = PipelineElement::new("plain", inbox, PassThrough, sink.clone());
        let stats = ProcessingElement::new(Box::new(element)).run().unwrap();

        let sent = sink.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].parts, vec![record(b"a"), record(b"b")]);
        assert!(sent[1].is_end());
        assert_eq!(stats.process_items, 1);
    }

    #[test]
    fn test_empty_output_is_not_forwarded() {
        let inbox = InboxSource::new(16);
        let connection = inbox.connection();
        connection.queue_work_item(vec![record(b"drop me")]).unwrap();
        connection.no_more_data().unwrap();

        let sink = RecordingSink {
            drained_after_end: true,
            ..RecordingSink::default()
        };
        let drop_all = |_: Bytes| -> PipelineResult<Vec<Bytes>> { Ok(Vec::new()) };
        let element = PipelineElement::new("filter", inbox, drop_all, sink.clone());
        ProcessingElement::new(Box::new(element)).run().unwrap();

        assert_eq!(sink.sent().len(), 1);
        assert!(sink.sent()[0].is_end());
    }

    #[test]
    fn test_sink_traffic_served_first_and_waits_for_drain() {
        let inbox = InboxSource::new(16);
        let connection = inbox.connection();
        connection.queue_work_item(vec![record(b"x")]).unwrap();
        connection.no_more_data().unwrap();

        let sink = RecordingSink {
            drained_after_end: true,
            ..RecordingSink::default()
        };
        sink.peer.lock().unwrap().extend([
            Message::registration(ClientId(1)),
            Message::data_request(ClientId(1)),
            Message::unregistration(ClientId(1)),
        ]);
        let element = PipelineElement::new("served", inbox, PassThrough, sink.clone());
        let stats = ProcessingElement::new(Box::new(element)).run().unwrap();

        assert_eq!(*sink.requests.lock().unwrap(), vec![ClientId(1)]);
        assert!(sink.registered.lock().unwrap().is_empty());
        // Peer traffic was handled before the source was read at all.
        let sent = sink.sent();
        assert_eq!(sent[0].parts, vec![record(b"x")]);
        assert!(sent[1].is_end());
        assert_eq!(stats.registrations, 1);
        assert_eq!(stats.unregistrations, 1);
        assert_eq!(stats.data_requests, 1);
    }

    #[test]
    fn test_source_registrations_go_to_source() {
        let inbox = InboxSource::new(16);
        let connection = inbox.connection();
        connection.register_client(ClientId(8)).unwrap();
        connection.no_more_data().unwrap();

        let sink = RecordingSink {
            drained_after_end: true,
            ..RecordingSink::default()
        };
        let element = PipelineElement::new("src-reg", inbox, PassThrough, sink.clone());
        ProcessingElement::new(Box::new(element)).run().unwrap();

        // The inbox source absorbs it; the sink never sees the client.
        assert!(sink.registered.lock().unwrap().is_empty());
    }

    #[test]
    fn test_exit_request_through_connector() {
        let inbox = InboxSource::new(16);
        let sink = RecordingSink::default();
        let element = PipelineElement::new("exiting", inbox, PassThrough, sink);
        let handle = ProcessingElement::new(Box::new(element)).spawn().unwrap();
        let stats = handle.terminate_and_join().unwrap();
        assert_eq!(stats.exit_requests, 1);
    }
}
