//! Peer identity for the pull protocols.
//!
//! A `ClientId` addresses one peer in a fan-out or fan-in topology. On the
//! wire it is 8 little-endian bytes. Each thread lazily receives a unique id
//! from a process-wide counter, so an element's sources and sinks announce
//! themselves with the identity of the thread that runs them.

use crate::pipeline::error::{PipelineError, PipelineResult};
use bytes::Bytes;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_CLIENT_ID: ClientId = ClientId::fresh();
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct ClientId(pub u64);

impl ClientId {
    /// Encoded size on the wire.
    pub const WIRE_SIZE: usize = 8;

    /// Identity of the calling thread. Stable for the thread's lifetime.
    pub fn current() -> Self {
        THREAD_CLIENT_ID.with(|id| *id)
    }

    /// Allocate an identity never handed out before in this process.
    pub fn fresh() -> Self {
        ClientId(NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub fn to_bytes(self) -> Bytes {
        Bytes::copy_from_slice(&self.0.to_le_bytes())
    }

    pub fn from_bytes(bytes: &[u8]) -> PipelineResult<Self> {
        let raw: [u8; Self::WIRE_SIZE] = bytes.try_into().map_err(|_| {
            PipelineError::protocol(format!(
                "client identity must be {} bytes, got {}",
                Self::WIRE_SIZE,
                bytes.len()
            ))
        })?;
        Ok(ClientId(u64::from_le_bytes(raw)))
    }
}

impl fmt::Debug for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClientId({})", self.0)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_is_stable_per_thread() {
        let a = ClientId::current();
        let b = ClientId::current();
        assert_eq!(a, b);

        let other = std::thread::spawn(ClientId::current).join().unwrap();
        assert_ne!(a, other);
    }

    #[test]
    fn test_fresh_ids_are_unique() {
        let a = ClientId::fresh();
        let b = ClientId::fresh();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wire_bytes() {
        let id = ClientId(0x0102_0304_0506_0708);
        let bytes = id.to_bytes();
        assert_eq!(bytes.len(), ClientId::WIRE_SIZE);
        assert_eq!(bytes[0], 0x08);
        assert_eq!(ClientId::from_bytes(&bytes).unwrap(), id);
    }

    #[test]
    fn test_from_bytes_rejects_wrong_size() {
        let err = ClientId::from_bytes(&[1, 2, 3]).unwrap_err();
        assert!(matches!(err, PipelineError::ProtocolViolation(_)));
    }
}
