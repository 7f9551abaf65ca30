//! Raw item → message converters.

use crate::pipeline::codec;
use crate::pipeline::error::PipelineResult;
use crate::pipeline::message::Message;
use crate::pipeline::record::{count_records, DataDescriptor, RawItem};

/// Lifts a raw item read from a [`DataSource`](crate::pipeline::DataSource)
/// into a message. The empty item always becomes `End`.
pub trait DataItemConverter: Send {
    fn convert(&mut self, item: RawItem) -> PipelineResult<Message>;
}

/// One record per item: `Process` with a single part holding the record.
#[derive(Debug, Default, Clone, Copy)]
pub struct RecordConverter;

impl DataItemConverter for RecordConverter {
    fn convert(&mut self, item: RawItem) -> PipelineResult<Message> {
        if item.is_end() {
            return Ok(Message::end());
        }
        Ok(Message::process(vec![item.into_bytes()]))
    }
}

/// A block of back-to-back records per item: batched `Process` with the
/// item count and the block.
#[derive(Debug, Default, Clone, Copy)]
pub struct BlockConverter;

impl BlockConverter {
    pub fn convert_descriptor(&self, desc: DataDescriptor) -> Message {
        codec::batch_descriptor(desc)
    }
}

impl DataItemConverter for BlockConverter {
    fn convert(&mut self, item: RawItem) -> PipelineResult<Message> {
        if item.is_end() {
            return Ok(Message::end());
        }
        let block = item.into_bytes();
        let count = count_records(&block)?;
        Ok(self.convert_descriptor(DataDescriptor::from_block(count, block)?))
    }
}
