//! # swtrigger: software trigger pipeline runtime
//!
//! A runtime for high-throughput record processing built from independent
//! processing elements that exchange typed, multi-part messages.
//!
//! ## Architecture
//!
//! - **Transport**: in-process router/dealer and push/pull endpoints over
//!   bounded crossbeam channels, addressed by URI through a shared `Context`
//! - **Elements**: one thread per element, a fixed dispatch loop and
//!   pluggable sources, processors and sinks
//! - **Fan-out / fan-in**: a load-balancing pull protocol with barriers and
//!   coordinated end-of-stream rundown
//! - **Records**: length-prefixed byte records, batched into blocks when
//!   they cross a transport
//!
//! ## Configuration
//!
//! Runtime settings live in a TOML file loaded into [`TriggerConfig`]; every
//! field has a default.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use swtrigger::{
//!     config::TriggerConfig,
//!     pipeline::{ConvertingSource, PassThrough, RecordConverter, RecordFileSource,
//!                RecordWriterSink, TopologyBuilder},
//!     transport::Context,
//! };
//!
//! fn main() -> swtrigger::Result<()> {
//!     let config = TriggerConfig::default();
//!     let ctx = Arc::new(Context::new(config.transport.clone()));
//!
//!     let source = ConvertingSource::new(
//!         RecordFileSource::open("events.rec", &config.source)?,
//!         RecordConverter,
//!     );
//!     let sink = RecordWriterSink::create("accepted.rec")?;
//!
//!     let topology = TopologyBuilder::new(ctx, config.fanout.clone())
//!         .spawn(source, |_| PassThrough, sink)?;
//!     let stats = topology.join()?;
//!     println!("{} records processed", stats.worker_items());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod pipeline;
pub mod transport;

// Re-export commonly used types
pub use config::TriggerConfig;
pub use error::{Result, ResultExt, TriggerError};
pub use pipeline::{Message, MessageType, PipelineError, PipelineResult, ProcessingElement};
pub use transport::Context;
