//! Sink capability.

use crate::pipeline::connection::PeerConnector;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::id::ClientId;
use crate::pipeline::message::Message;

/// Message consumer fed by an element.
///
/// Plain sinks only implement the four required methods. Sinks that serve a
/// pull protocol also carry control traffic back to the element
/// (`try_get_message` / `get_message`) and handle the requests and
/// membership changes the element routes to them.
pub trait DataSink: Send {
    fn connect(&mut self) -> PipelineResult<()>;
    fn disconnect(&mut self) -> PipelineResult<()>;
    fn send(&mut self, msg: Message) -> PipelineResult<()>;

    /// Next peer message if one is already waiting.
    fn try_get_message(&mut self) -> PipelineResult<Option<Message>> {
        Ok(None)
    }

    /// Block for the next peer message.
    fn get_message(&mut self) -> PipelineResult<Message> {
        Err(PipelineError::protocol("sink carries no peer messages"))
    }

    fn on_pull_request(&mut self, id: ClientId) -> PipelineResult<()> {
        Err(PipelineError::protocol(format!(
            "sink does not serve pull requests (from {})",
            id
        )))
    }

    fn register(&mut self, id: ClientId) -> PipelineResult<()> {
        Err(PipelineError::protocol(format!(
            "sink does not accept registrations (from {})",
            id
        )))
    }

    fn unregister(&mut self, id: ClientId) -> PipelineResult<()> {
        Err(PipelineError::protocol(format!(
            "sink does not accept unregistrations (from {})",
            id
        )))
    }

    /// True once the sink owes its peers nothing more.
    fn is_drained(&self) -> bool {
        true
    }

    /// False while the sink would rather serve peers than take more input.
    fn wants_input(&self) -> bool {
        true
    }

    fn peer_connector(&self) -> Option<PeerConnector> {
        None
    }
}
