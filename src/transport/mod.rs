//! In-process message transport.
//!
//! A reliable, ordered, multi-part message transport with identity-addressed
//! routing, built on bounded crossbeam channels. Endpoints are published in a
//! [`Context`] under a URI; any number of threads sharing the context can
//! connect to them.
//!
//! ```text
//!  DealerSocket ─┐                         ┌─► PullSocket (bound)
//!  DealerSocket ─┼─► RouterSocket (bound)   │
//!  DealerSocket ─┘     send_to(identity)    PushSocket ─┘ (connected, many)
//! ```

pub mod context;
pub mod error;
pub mod socket;

pub use context::Context;
pub use error::{TransportError, TransportResult};
pub use socket::{DealerSocket, PullSocket, PushSocket, RouterSocket};

/// One transport message: an ordered list of frames.
pub type Frames = Vec<bytes::Bytes>;
