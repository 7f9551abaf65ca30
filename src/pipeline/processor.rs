//! Record processors.
//!
//! A [`Processor`] maps one input record to zero or more output records.
//! [`apply`] runs it over every record of a `Process` message and repackages
//! the results.

use crate::pipeline::codec;
use crate::pipeline::error::PipelineResult;
use crate::pipeline::message::Message;
use bytes::Bytes;

pub trait Processor: Send {
    fn process(&mut self, record: Bytes) -> PipelineResult<Vec<Bytes>>;
}

/// Forwards every record unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThrough;

impl Processor for PassThrough {
    fn process(&mut self, record: Bytes) -> PipelineResult<Vec<Bytes>> {
        Ok(vec![record])
    }
}

impl<F> Processor for F
where
    F: FnMut(Bytes) -> PipelineResult<Vec<Bytes>> + Send,
{
    fn process(&mut self, record: Bytes) -> PipelineResult<Vec<Bytes>> {
        self(record)
    }
}

/// Run `processor` over a `Process` message.
///
/// Returns `Ignore` when nothing was produced, otherwise a `Process`
/// message with one part per output record.
pub fn apply(processor: &mut dyn Processor, msg: Message) -> PipelineResult<Message> {
    let mut outputs = Vec::new();
    for record in codec::records(&msg)? {
        outputs.extend(processor.process(record)?);
    }
    if outputs.is_empty() {
        Ok(Message::ignore())
    } else {
        Ok(Message::process(outputs))
    }
}
