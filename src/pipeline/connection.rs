//! External-thread handles onto a running element.
//!
//! Any thread holding an [`ElementConnection`] can feed a running element by
//! message. Every provided method builds the matching [`Message`] and sends
//! it through `send_message_to_thread`; the element's inbound channel
//! serializes concurrent callers.

use crate::pipeline::codec;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::id::ClientId;
use crate::pipeline::message::Message;
use crate::transport::{Context, DealerSocket, PushSocket};
use bytes::Bytes;
use std::sync::Arc;

pub trait ElementConnection: Send {
    fn send_message_to_thread(&self, msg: Message) -> PipelineResult<()>;

    fn register_client(&self, id: ClientId) -> PipelineResult<()> {
        self.send_message_to_thread(Message::registration(id))
    }

    fn unregister_client(&self, id: ClientId) -> PipelineResult<()> {
        self.send_message_to_thread(Message::unregistration(id))
    }

    fn queue_work_item(&self, parts: Vec<Bytes>) -> PipelineResult<()> {
        self.send_message_to_thread(Message::process(parts))
    }

    fn request_item(&self, id: ClientId) -> PipelineResult<()> {
        self.send_message_to_thread(Message::data_request(id))
    }

    fn no_more_data(&self) -> PipelineResult<()> {
        self.send_message_to_thread(Message::end())
    }

    fn request_exit(&self) -> PipelineResult<()> {
        self.send_message_to_thread(Message::exit())
    }
}

/// Opens a fresh connection to an element from another thread.
pub type PeerConnector = Box<dyn FnOnce() -> PipelineResult<Box<dyn ElementConnection>> + Send>;

/// Connection to an element whose source is a bound pull endpoint.
pub struct PushConnection {
    push: PushSocket,
}

impl PushConnection {
    pub fn connect(ctx: &Arc<Context>, uri: &str) -> PipelineResult<Self> {
        Ok(Self {
            push: PushSocket::connect(ctx, uri)?,
        })
    }

    /// Connector for `terminate_and_join`.
    pub fn connector(ctx: Arc<Context>, uri: String) -> PeerConnector {
        Box::new(move || {
            let connection: Box<dyn ElementConnection> = Box::new(Self::connect(&ctx, &uri)?);
            Ok(connection)
        })
    }
}

impl ElementConnection for PushConnection {
    fn send_message_to_thread(&self, msg: Message) -> PipelineResult<()> {
        self.push.send(codec::encode(msg)?)?;
        Ok(())
    }
}

/// Connection to an element whose sink is a bound router endpoint.
pub struct DealerConnection {
    dealer: DealerSocket,
}

impl DealerConnection {
    /// Connect under a fresh identity, so the connection never collides
    /// with a registered client of the element.
    pub fn connect(ctx: &Arc<Context>, uri: &str) -> PipelineResult<Self> {
        Ok(Self {
            dealer: DealerSocket::connect(ctx, uri, ClientId::fresh())?,
        })
    }

    pub fn connector(ctx: Arc<Context>, uri: String) -> PeerConnector {
        Box::new(move || {
            let connection: Box<dyn ElementConnection> = Box::new(Self::connect(&ctx, &uri)?);
            Ok(connection)
        })
    }

    pub fn identity(&self) -> ClientId {
        self.dealer.identity()
    }
}

impl ElementConnection for DealerConnection {
    fn send_message_to_thread(&self, msg: Message) -> PipelineResult<()> {
        self.dealer.send(codec::encode(msg)?)?;
        Ok(())
    }
}

/// Delivers every message through each of several connections to one element.
///
/// An element that blocks on more than one inbound channel picks the
/// message up on whichever channel it reads next. Connections are tried in
/// order; a send succeeds when any of them took the message.
pub struct CombinedConnection {
    connections: Vec<Box<dyn ElementConnection>>,
}

impl CombinedConnection {
    /// Open every connector that can be reached. Fails only when none can.
    pub fn connector(connectors: Vec<PeerConnector>) -> PeerConnector {
        Box::new(move || {
            let mut connections = Vec::with_capacity(connectors.len());
            let mut last_error = None;
            for connector in connectors {
                match connector() {
                    Ok(connection) => connections.push(connection),
                    Err(e) => {
                        tracing::debug!("Skipping unreachable element channel: {}", e);
                        last_error = Some(e);
                    }
                }
            }
            if connections.is_empty() {
                return Err(last_error.unwrap_or_else(|| {
                    PipelineError::NotConnected("no element channels".to_string())
                }));
            }
            let connection: Box<dyn ElementConnection> = Box::new(Self { connections });
            Ok(connection)
        })
    }
}

impl ElementConnection for CombinedConnection {
    fn send_message_to_thread(&self, msg: Message) -> PipelineResult<()> {
        let mut delivered = false;
        let mut last_error = None;
        for connection in &self.connections {
            match connection.send_message_to_thread(msg.clone()) {
                Ok(()) => delivered = true,
                Err(e) => last_error = Some(e),
            }
        }
        match last_error {
            Some(e) if !delivered => Err(e),
            _ => Ok(()),
        }
    }
}

/// Connection to an element that accepts no inbound traffic.
#[derive(Debug, Clone)]
pub struct RejectingConnection {
    element: String,
}

impl RejectingConnection {
    pub fn new(element: impl Into<String>) -> Self {
        Self {
            element: element.into(),
        }
    }
}

impl ElementConnection for RejectingConnection {
    fn send_message_to_thread(&self, msg: Message) -> PipelineResult<()> {
        Err(PipelineError::protocol(format!(
            "'{}' is a one-way element and cannot accept {:?}",
            self.element, msg.kind
        )))
    }
}
