//! InboxSource: bounded in-process message queue.
//!
//! The receiving half feeds an element; [`InboxConnection`]s hand out the
//! sending half to any number of other threads.

use crate::pipeline::connection::{ElementConnection, PeerConnector};
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::message::Message;
use crate::pipeline::source::MessageSource;
use crossbeam_channel::{bounded, Receiver, Sender};

pub struct InboxSource {
    tx: Sender<Message>,
    rx: Receiver<Message>,
}

impl InboxSource {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity);
        Self { tx, rx }
    }

    /// A sending handle usable from any thread.
    pub fn connection(&self) -> InboxConnection {
        InboxConnection {
            tx: self.tx.clone(),
        }
    }

    /// Messages waiting to be consumed.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

impl MessageSource for InboxSource {
    fn connect(&mut self) -> PipelineResult<()> {
        Ok(())
    }

    fn disconnect(&mut self) -> PipelineResult<()> {
        let dropped = self.rx.try_iter().count();
        if dropped > 0 {
            tracing::warn!("InboxSource dropped {} unconsumed messages", dropped);
        }
        Ok(())
    }

    fn get_next_item(&mut self) -> PipelineResult<Message> {
        self.rx.recv().map_err(|_| PipelineError::ChannelRecv)
    }

    fn peer_connector(&self) -> Option<PeerConnector> {
        let connection = self.connection();
        Some(Box::new(move || {
            let connection: Box<dyn ElementConnection> = Box::new(connection);
            Ok(connection)
        }))
    }
}

/// Sending handle onto an [`InboxSource`].
#[derive(Clone)]
pub struct InboxConnection {
    tx: Sender<Message>,
}

impl ElementConnection for InboxConnection {
    fn send_message_to_thread(&self, msg: Message) -> PipelineResult<()> {
        self.tx.send(msg).map_err(|_| PipelineError::ChannelSend)
    }
}
