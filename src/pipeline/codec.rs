//! Wire framing for messages.
//!
//! A message with N parts travels as N + 1 frames: a 4-byte little-endian
//! type code, then one frame per part in order. Record payloads crossing a
//! transport are always batched: a `Process` message with two parts, the
//! 4-byte item count and a block of back-to-back records.

use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::message::{Message, MessageType};
use crate::pipeline::record::{is_whole_record, DataDescriptor};
use crate::transport::Frames;
use bytes::Bytes;

const TYPE_FRAME_SIZE: usize = 4;

/// Serialize a message into transport frames.
pub fn encode(msg: Message) -> PipelineResult<Frames> {
    if !msg.kind.is_wire_visible() {
        return Err(PipelineError::protocol(format!(
            "{:?} messages cannot be placed on the wire",
            msg.kind
        )));
    }
    let mut frames = Vec::with_capacity(msg.parts.len() + 1);
    frames.push(Bytes::copy_from_slice(&msg.kind.code().to_le_bytes()));
    frames.extend(msg.parts);
    Ok(frames)
}

/// Serialize a message for a transport hop, batching `Process` records.
pub fn encode_batched(msg: Message) -> PipelineResult<Frames> {
    if msg.kind == MessageType::Process {
        return encode(batch(&records(&msg)?)?);
    }
    encode(msg)
}

/// Rebuild a message from transport frames.
pub fn decode(frames: Frames) -> PipelineResult<Message> {
    let mut frames = frames.into_iter();
    let type_frame = frames
        .next()
        .ok_or_else(|| PipelineError::protocol("received a message with no frames"))?;
    let code: [u8; TYPE_FRAME_SIZE] = type_frame.as_ref().try_into().map_err(|_| {
        PipelineError::protocol(format!(
            "type frame must be {} bytes, got {}",
            TYPE_FRAME_SIZE,
            type_frame.len()
        ))
    })?;
    Ok(Message::new(
        MessageType::from_code(u32::from_le_bytes(code)),
        frames.collect(),
    ))
}

/// Package records as one batched `Process` message.
pub fn batch(records: &[Bytes]) -> PipelineResult<Message> {
    let desc = DataDescriptor::pack(records)?;
    Ok(batch_descriptor(desc))
}

/// Package an already built block as a batched `Process` message.
pub fn batch_descriptor(desc: DataDescriptor) -> Message {
    Message::process(vec![desc.count_bytes(), desc.data])
}

/// Interpret a batched `Process` message.
pub fn unpack_batch(msg: &Message) -> PipelineResult<DataDescriptor> {
    if msg.kind != MessageType::Process {
        return Err(PipelineError::protocol(format!(
            "expected a batched Process message, got {:?}",
            msg.kind
        )));
    }
    let [count, block] = msg.parts.as_slice() else {
        return Err(PipelineError::protocol(format!(
            "batched Process message needs 2 parts, got {}",
            msg.parts.len()
        )));
    };
    let count: [u8; 4] = count.as_ref().try_into().map_err(|_| {
        PipelineError::protocol(format!("item count frame must be 4 bytes, got {}", count.len()))
    })?;
    DataDescriptor::from_block(u32::from_le_bytes(count), block.clone())
}

/// Every record carried by a `Process` message, whichever shape it has.
///
/// A message whose parts are each one whole record is taken part by part.
/// Anything else must be a valid batch. A batch can never pass the
/// per-part test, since its count frame and block cannot both be single
/// records of their own length.
pub fn records(msg: &Message) -> PipelineResult<Vec<Bytes>> {
    if msg.parts.iter().all(|part| is_whole_record(part)) {
        return Ok(msg.parts.clone());
    }
    unpack_batch(msg)?.records()
}
