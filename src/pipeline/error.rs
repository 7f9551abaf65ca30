//! Pipeline-specific error types.

use crate::transport::TransportError;
use thiserror::Error;

/// Errors that can occur within the pipeline system.
///
/// Every variant is fatal to the element that raises it: the error leaves the
/// dispatch loop, the element disconnects its sink and source, and the thread
/// returns the error from `join`.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("Allocation failure: {0}")]
    AllocationFailure(String),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not connected: {0}")]
    NotConnected(String),

    #[error("Channel send error")]
    ChannelSend,

    #[error("Channel receive error")]
    ChannelRecv,

    #[error("Element '{0}' panicked")]
    Panicked(String),
}

impl PipelineError {
    /// Shorthand for building a [`PipelineError::ProtocolViolation`].
    pub fn protocol(message: impl Into<String>) -> Self {
        PipelineError::ProtocolViolation(message.into())
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
