//! Source capabilities.
//!
//! - [`DataSource`] yields raw records from an external medium.
//! - [`MessageSource`] yields messages to a [`PipelineElement`](crate::pipeline::nodes::PipelineElement).
//! - [`ConvertingSource`] lifts the former into the latter with a converter.

use crate::pipeline::connection::PeerConnector;
use crate::pipeline::converter::DataItemConverter;
use crate::pipeline::error::PipelineResult;
use crate::pipeline::id::ClientId;
use crate::pipeline::message::Message;
use crate::pipeline::record::RawItem;

/// Raw record producer. `read` blocks; the empty item ends the stream.
#[cfg_attr(test, mockall::automock)]
pub trait DataSource: Send {
    fn connect(&mut self) -> PipelineResult<()>;
    fn disconnect(&mut self) -> PipelineResult<()>;
    fn read(&mut self) -> PipelineResult<RawItem>;
}

/// Message producer feeding an element.
pub trait MessageSource: Send {
    fn connect(&mut self) -> PipelineResult<()>;
    fn disconnect(&mut self) -> PipelineResult<()>;

    /// Block for the next message.
    fn get_next_item(&mut self) -> PipelineResult<Message>;

    /// A peer announced itself through this source.
    fn register(&mut self, id: ClientId) -> PipelineResult<()> {
        tracing::debug!("Source ignores registration of {}", id);
        Ok(())
    }

    /// A peer withdrew through this source.
    fn unregister(&mut self, id: ClientId) -> PipelineResult<()> {
        tracing::debug!("Source ignores unregistration of {}", id);
        Ok(())
    }

    /// How another thread reaches this source, if it can.
    fn peer_connector(&self) -> Option<PeerConnector> {
        None
    }
}

impl<T: MessageSource + ?Sized> MessageSource for Box<T> {
    fn connect(&mut self) -> PipelineResult<()> {
        (**self).connect()
    }

    fn disconnect(&mut self) -> PipelineResult<()> {
        (**self).disconnect()
    }

    fn get_next_item(&mut self) -> PipelineResult<Message> {
        (**self).get_next_item()
    }

    fn register(&mut self, id: ClientId) -> PipelineResult<()> {
        (**self).register(id)
    }

    fn unregister(&mut self, id: ClientId) -> PipelineResult<()> {
        (**self).unregister(id)
    }

    fn peer_connector(&self) -> Option<PeerConnector> {
        (**self).peer_connector()
    }
}

/// A [`DataSource`] whose raw items pass through a converter.
pub struct ConvertingSource<D, C> {
    source: D,
    converter: C,
}

impl<D: DataSource, C: DataItemConverter> ConvertingSource<D, C> {
    pub fn new(source: D, converter: C) -> Self {
        Self { source, converter }
    }

    pub fn into_inner(self) -> D {
        self.source
    }
}

impl<D: DataSource, C: DataItemConverter> MessageSource for ConvertingSource<D, C> {
    fn connect(&mut self) -> PipelineResult<()> {
        self.source.connect()
    }

    fn disconnect(&mut self) -> PipelineResult<()> {
        self.source.disconnect()
    }

    fn get_next_item(&mut self) -> PipelineResult<Message> {
        let item = self.source.read()?;
        self.converter.convert(item)
    }
}
