//! Transport-level errors.

use crate::pipeline::id::ClientId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("No endpoint bound at '{0}'")]
    NotBound(String),

    #[error("Address '{0}' is already bound")]
    AddressInUse(String),

    #[error("Endpoint '{uri}' is a {actual} endpoint, expected {expected}")]
    RoleMismatch {
        uri: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Unknown peer {0}")]
    UnknownPeer(ClientId),

    #[error("Endpoint '{0}' disconnected")]
    Disconnected(String),
}

pub type TransportResult<T> = std::result::Result<T, TransportError>;
