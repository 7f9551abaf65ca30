//! Message-driven processing elements.
//!
//! Every element runs its own thread and loop: fetch a message, dispatch it
//! by type, repeat until told to stop. Elements talk to each other only by
//! message, over the [`transport`](crate::transport) or an in-process inbox.
//!
//! # Architecture
//!
//! ```text
//! [RecordFileSource] ─► distributor ─► [FanoutBalancedSink] ══╗
//!                                                            ║ pull
//!                         worker ◄─ [FanoutBalancedSource] ◄══╝
//!                           │
//!                     [FanInSink] ══► [FanInSource] ─► collector ─► [RecordWriterSink]
//! ```
//!
//! # Design
//!
//! - **Typed messages**: `Message` is a type code plus reference-counted
//!   parts; buffers move with the message and are freed by the last owner.
//! - **Strategy hooks**: `ProcessingElement` owns the loop and lifecycle,
//!   an `ElementStrategy` supplies the behaviour.
//! - **Pull-based fan-out**: workers request work, so slow and fast
//!   workers pace themselves; barriers reach every worker exactly once.
//! - **Coordinated shutdown**: `End` runs the fan-out sink down and the
//!   fan-in source reports `End` only after its producers have left.

pub mod codec;
pub mod connection;
pub mod converter;
pub mod element;
pub mod error;
pub mod id;
pub mod message;
pub mod nodes;
pub mod processor;
pub mod record;
pub mod sink;
pub mod source;
pub mod topology;

pub use connection::{
    CombinedConnection, DealerConnection, ElementConnection, PeerConnector, PushConnection,
    RejectingConnection,
};
pub use converter::{BlockConverter, DataItemConverter, RecordConverter};
pub use element::{
    ElementContext, ElementHandle, ElementState, ElementStats, ElementStrategy, ProcessingElement,
};
pub use error::{PipelineError, PipelineResult};
pub use id::ClientId;
pub use message::{Message, MessageType};
pub use nodes::{
    FanInSink, FanInSource, FanoutBalancedSink, FanoutBalancedSource, FanoutQueue, InboxConnection,
    InboxSource, PipelineElement, PipelinePullSource, PushDataSource, RecordFileSource,
    RecordWriterSink,
};
pub use processor::{PassThrough, Processor};
pub use record::{DataDescriptor, RawItem};
pub use sink::DataSink;
pub use source::{ConvertingSource, DataSource, MessageSource};
pub use topology::{RunningTopology, TopologyBuilder, TopologyStats};
