//! Built-in sources, sinks and elements.

pub mod fanin_sink;
pub mod fanin_source;
pub mod fanout_queue;
pub mod fanout_sink;
pub mod fanout_source;
pub mod inbox_source;
pub mod pipeline_element;
pub mod pull_source;
pub mod push_source;
pub mod record_file;

pub use fanin_sink::FanInSink;
pub use fanin_source::FanInSource;
pub use fanout_queue::{BarrierClassifier, Delivery, FanoutQueue};
pub use fanout_sink::FanoutBalancedSink;
pub use fanout_source::FanoutBalancedSource;
pub use inbox_source::{InboxConnection, InboxSource};
pub use pipeline_element::PipelineElement;
pub use pull_source::PipelinePullSource;
pub use push_source::PushDataSource;
pub use record_file::{RecordFileSource, RecordWriterSink};
