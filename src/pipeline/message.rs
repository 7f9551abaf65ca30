//! Message envelope passed between processing elements.
//!
//! A `Message` is a type tag plus an ordered list of owned binary parts.
//! Parts are `Bytes`, so handing a message to another component moves the
//! buffers with it and each buffer is released exactly once, when its last
//! owner drops it.

use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::id::ClientId;
use bytes::Bytes;
use std::fmt;

/// Message type tag. Wire codes are fixed and shared by every peer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum MessageType {
    /// Payload carries one or more records.
    Process,
    /// Sender announces itself; payload is its identity.
    Registration,
    /// Sender withdraws; payload is its identity.
    Unregistration,
    /// Receiving element should stop after handling this message.
    ExitRequest,
    /// Pull request for the next item; payload is the requester's identity.
    DataRequest,
    /// Synchronization point every registered consumer must observe.
    Barrier,
    /// Nothing to forward. Never placed on the wire.
    Ignore,
    /// No further `Process` messages follow on this stream.
    End,
    /// Any other code, forwarded untouched.
    Other(u32),
}

impl MessageType {
    pub const PROCESS_CODE: u32 = 2;
    pub const REGISTRATION_CODE: u32 = 4;
    pub const UNREGISTRATION_CODE: u32 = 5;
    pub const EXIT_REQUEST_CODE: u32 = 6;
    pub const DATA_REQUEST_CODE: u32 = 7;
    pub const BARRIER_CODE: u32 = 8;
    pub const IGNORE_CODE: u32 = 0xFFFF_FFFE;
    pub const END_CODE: u32 = 0xFFFF_FFFF;

    pub fn code(self) -> u32 {
        match self {
            MessageType::Process => Self::PROCESS_CODE,
            MessageType::Registration => Self::REGISTRATION_CODE,
            MessageType::Unregistration => Self::UNREGISTRATION_CODE,
            MessageType::ExitRequest => Self::EXIT_REQUEST_CODE,
            MessageType::DataRequest => Self::DATA_REQUEST_CODE,
            MessageType::Barrier => Self::BARRIER_CODE,
            MessageType::Ignore => Self::IGNORE_CODE,
            MessageType::End => Self::END_CODE,
            MessageType::Other(code) => code,
        }
    }

    /// Decode a wire code. `IGNORE_CODE` is not a wire code and maps to `Other`.
    pub fn from_code(code: u32) -> Self {
        match code {
            Self::PROCESS_CODE => MessageType::Process,
            Self::REGISTRATION_CODE => MessageType::Registration,
            Self::UNREGISTRATION_CODE => MessageType::Unregistration,
            Self::EXIT_REQUEST_CODE => MessageType::ExitRequest,
            Self::DATA_REQUEST_CODE => MessageType::DataRequest,
            Self::BARRIER_CODE => MessageType::Barrier,
            Self::END_CODE => MessageType::End,
            other => MessageType::Other(other),
        }
    }

    #[inline]
    pub fn is_wire_visible(self) -> bool {
        self != MessageType::Ignore
    }
}

/// The unit of inter-element communication.
#[derive(Clone, PartialEq, Eq)]
pub struct Message {
    pub kind: MessageType,
    pub parts: Vec<Bytes>,
}

impl Message {
    pub fn new(kind: MessageType, parts: Vec<Bytes>) -> Self {
        Self { kind, parts }
    }

    /// A message with no parts.
    pub fn control(kind: MessageType) -> Self {
        Self::new(kind, Vec::new())
    }

    pub fn process(parts: Vec<Bytes>) -> Self {
        Self::new(MessageType::Process, parts)
    }

    pub fn end() -> Self {
        Self::control(MessageType::End)
    }

    pub fn ignore() -> Self {
        Self::control(MessageType::Ignore)
    }

    pub fn exit() -> Self {
        Self::control(MessageType::ExitRequest)
    }

    pub fn barrier(parts: Vec<Bytes>) -> Self {
        Self::new(MessageType::Barrier, parts)
    }

    pub fn registration(id: ClientId) -> Self {
        Self::new(MessageType::Registration, vec![id.to_bytes()])
    }

    pub fn unregistration(id: ClientId) -> Self {
        Self::new(MessageType::Unregistration, vec![id.to_bytes()])
    }

    pub fn data_request(id: ClientId) -> Self {
        Self::new(MessageType::DataRequest, vec![id.to_bytes()])
    }

    #[inline]
    pub fn is_end(&self) -> bool {
        self.kind == MessageType::End
    }

    #[inline]
    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    /// Total payload size across all parts.
    pub fn byte_len(&self) -> usize {
        self.parts.iter().map(Bytes::len).sum()
    }

    /// Identity carried by a registration, unregistration or data request.
    pub fn identity(&self) -> PipelineResult<ClientId> {
        match self.parts.first() {
            Some(part) => ClientId::from_bytes(part),
            None => Err(PipelineError::protocol(format!(
                "{:?} message carries no sender identity",
                self.kind
            ))),
        }
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sizes: Vec<usize> = self.parts.iter().map(Bytes::len).collect();
        f.debug_struct("Message")
            .field("kind", &self.kind)
            .field("part_sizes", &sizes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_codes_round_trip() {
        for kind in [
            MessageType::Process,
            MessageType::Registration,
            MessageType::Unregistration,
            MessageType::ExitRequest,
            MessageType::DataRequest,
            MessageType::Barrier,
            MessageType::End,
            MessageType::Other(1234),
        ] {
            assert_eq!(MessageType::from_code(kind.code()), kind);
        }
    }

    #[test]
    fn test_known_wire_codes() {
        assert_eq!(MessageType::Process.code(), 2);
        assert_eq!(MessageType::End.code(), 0xFFFF_FFFF);
    }

    #[test]
    fn test_ignore_is_not_wire_visible() {
        assert!(!MessageType::Ignore.is_wire_visible());
        assert_eq!(
            MessageType::from_code(MessageType::IGNORE_CODE),
            MessageType::Other(MessageType::IGNORE_CODE)
        );
    }

    #[test]
    fn test_identity_from_control_messages() {
        let id = ClientId(99);
        assert_eq!(Message::registration(id).identity().unwrap(), id);
        assert_eq!(Message::unregistration(id).identity().unwrap(), id);
        assert_eq!(Message::data_request(id).identity().unwrap(), id);
    }

    #[test]
    fn test_identity_missing() {
        assert!(Message::exit().identity().is_err());
    }

    #[test]
    fn test_byte_len_and_debug() {
        let msg = Message::process(vec![Bytes::from_static(b"abcd"), Bytes::from_static(b"ef")]);
        assert_eq!(msg.part_count(), 2);
        assert_eq!(msg.byte_len(), 6);
        let debug = format!("{:?}", msg);
        assert!(debug.contains("Process"));
        assert!(debug.contains("[4, 2]"));
    }
}
