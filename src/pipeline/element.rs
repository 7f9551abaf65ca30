//! Processing element: one thread running a message dispatch loop.
//!
//! The loop is fixed; behaviour comes from an [`ElementStrategy`]:
//!
//! 1. Connect the source, then the sink.
//! 2. Fetch the next message and dispatch it by type to a strategy hook.
//! 3. Repeat until a hook stops the loop or an exit request arrives.
//! 4. Disconnect the sink, then the source. This also happens when a hook
//!    fails; the failure is returned from the thread afterwards.

use crate::pipeline::connection::PeerConnector;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::message::{Message, MessageType};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Lifecycle of an element, observable from other threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ElementState {
    Created = 0,
    Running = 1,
    Draining = 2,
    Terminated = 3,
}

impl ElementState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => ElementState::Created,
            1 => ElementState::Running,
            2 => ElementState::Draining,
            _ => ElementState::Terminated,
        }
    }
}

impl fmt::Display for ElementState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Loop control handed to every hook.
#[derive(Debug)]
pub struct ElementContext {
    running: bool,
}

impl Default for ElementContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ElementContext {
    pub fn new() -> Self {
        Self { running: true }
    }

    /// Leave the loop after the current hook returns.
    pub fn stop(&mut self) {
        self.running = false;
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running
    }
}

/// The hooks a processing element is built from.
pub trait ElementStrategy: Send {
    /// Human-readable name, also used as the thread name.
    fn name(&self) -> &str;

    fn connect_source(&mut self) -> PipelineResult<()>;
    fn connect_sink(&mut self) -> PipelineResult<()>;
    fn disconnect_sink(&mut self) -> PipelineResult<()>;
    fn disconnect_source(&mut self) -> PipelineResult<()>;

    /// Block for the next message to dispatch.
    fn next_work_item(&mut self) -> PipelineResult<Message>;

    fn send_work_item_to_sink(&mut self, msg: Message) -> PipelineResult<()>;

    fn process_work_item(&mut self, msg: Message, ctx: &mut ElementContext)
        -> PipelineResult<()>;

    fn on_end_item(&mut self, msg: Message, ctx: &mut ElementContext) -> PipelineResult<()>;

    fn on_register(&mut self, msg: Message, _ctx: &mut ElementContext) -> PipelineResult<()> {
        tracing::warn!("{}: ignoring registration {:?}", self.name(), msg);
        Ok(())
    }

    fn on_unregister(&mut self, msg: Message, _ctx: &mut ElementContext) -> PipelineResult<()> {
        tracing::warn!("{}: ignoring unregistration {:?}", self.name(), msg);
        Ok(())
    }

    /// Called after the loop has already been told to stop.
    fn on_exit_requested(&mut self, _msg: Message, _ctx: &mut ElementContext) -> PipelineResult<()> {
        Ok(())
    }

    fn on_data_request(&mut self, _msg: Message, _ctx: &mut ElementContext) -> PipelineResult<()> {
        Ok(())
    }

    /// Unknown types are forwarded; `Ignore` is dropped.
    fn on_other_message_type(
        &mut self,
        msg: Message,
        _ctx: &mut ElementContext,
    ) -> PipelineResult<()> {
        if msg.kind == MessageType::Ignore {
            return Ok(());
        }
        self.send_work_item_to_sink(msg)
    }

    /// How another thread reaches this element once it runs.
    fn peer_connector(&self) -> Option<PeerConnector> {
        None
    }
}

/// Per-type count of dispatched messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementStats {
    pub process_items: u64,
    pub registrations: u64,
    pub unregistrations: u64,
    pub end_items: u64,
    pub exit_requests: u64,
    pub data_requests: u64,
    pub other: u64,
}

impl ElementStats {
    pub fn record(&mut self, kind: MessageType) {
        match kind {
            MessageType::Process => self.process_items += 1,
            MessageType::Registration => self.registrations += 1,
            MessageType::Unregistration => self.unregistrations += 1,
            MessageType::End => self.end_items += 1,
            MessageType::ExitRequest => self.exit_requests += 1,
            MessageType::DataRequest => self.data_requests += 1,
            _ => self.other += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.process_items
            + self.registrations
            + self.unregistrations
            + self.end_items
            + self.exit_requests
            + self.data_requests
            + self.other
    }
}

/// Driver that runs an [`ElementStrategy`] through its lifecycle.
pub struct ProcessingElement {
    strategy: Box<dyn ElementStrategy>,
    state: Arc<AtomicU8>,
    stats: ElementStats,
}

impl ProcessingElement {
    pub fn new(strategy: Box<dyn ElementStrategy>) -> Self {
        Self {
            strategy,
            state: Arc::new(AtomicU8::new(ElementState::Created as u8)),
            stats: ElementStats::default(),
        }
    }

    pub fn name(&self) -> &str {
        self.strategy.name()
    }

    pub fn state(&self) -> ElementState {
        ElementState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: ElementState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Run on the calling thread until the element terminates.
    pub fn run(mut self) -> PipelineResult<ElementStats> {
        let name = self.strategy.name().to_string();
        self.set_state(ElementState::Running);
        tracing::info!("Element '{}' started", name);

        let result = self.dispatch_loop();
        self.set_state(ElementState::Draining);

        let sink_result = self.strategy.disconnect_sink();
        let source_result = self.strategy.disconnect_source();
        self.set_state(ElementState::Terminated);

        match &result {
            Ok(()) => tracing::info!(
                "Element '{}' exiting after {} messages ({} process, {} control)",
                name,
                self.stats.total(),
                self.stats.process_items,
                self.stats.total() - self.stats.process_items
            ),
            Err(e) => tracing::error!("Element '{}' failed: {}", name, e),
        }

        result.and(sink_result).and(source_result)?;
        Ok(self.stats)
    }

    fn dispatch_loop(&mut self) -> PipelineResult<()> {
        self.strategy.connect_source()?;
        self.strategy.connect_sink()?;

        let mut ctx = ElementContext::new();
        while ctx.is_running() {
            let msg = self.strategy.next_work_item()?;
            self.stats.record(msg.kind);
            self.dispatch(msg, &mut ctx)?;
        }
        Ok(())
    }

    fn dispatch(&mut self, msg: Message, ctx: &mut ElementContext) -> PipelineResult<()> {
        let strategy = &mut self.strategy;
        match msg.kind {
            MessageType::Process => strategy.process_work_item(msg, ctx),
            MessageType::Registration => strategy.on_register(msg, ctx),
            MessageType::Unregistration => strategy.on_unregister(msg, ctx),
            MessageType::End => strategy.on_end_item(msg, ctx),
            MessageType::ExitRequest => {
                ctx.stop();
                strategy.on_exit_requested(msg, ctx)
            }
            MessageType::DataRequest => strategy.on_data_request(msg, ctx),
            _ => strategy.on_other_message_type(msg, ctx),
        }
    }

    /// Start the element on its own named thread.
    pub fn spawn(self) -> PipelineResult<ElementHandle> {
        let name = self.strategy.name().to_string();
        let state = self.state.clone();
        let connector = self.strategy.peer_connector();
        let thread = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || self.run())?;
        Ok(ElementHandle {
            name,
            state,
            thread,
            connector,
        })
    }
}

/// Owner-side handle of a spawned element.
pub struct ElementHandle {
    name: String,
    state: Arc<AtomicU8>,
    thread: JoinHandle<PipelineResult<ElementStats>>,
    connector: Option<PeerConnector>,
}

impl ElementHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ElementState {
        ElementState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the element to terminate.
    pub fn join(self) -> PipelineResult<ElementStats> {
        self.thread
            .join()
            .map_err(|_| PipelineError::Panicked(self.name))?
    }

    /// Ask a running element to exit through its peer connector.
    ///
    /// Does nothing for an element without a connector, one that is already
    /// stopping, or one that was asked before.
    pub fn request_exit(&mut self) {
        let live = matches!(self.state(), ElementState::Created | ElementState::Running);
        if let (true, Some(connector)) = (live, self.connector.take()) {
            match connector() {
                Ok(connection) => {
                    if let Err(e) = connection.request_exit() {
                        tracing::warn!("Failed to ask '{}' to exit: {}", self.name, e);
                    }
                }
                Err(e) => tracing::warn!("Failed to connect to '{}': {}", self.name, e),
            }
        }
    }

    /// [`request_exit`](Self::request_exit), then join.
    pub fn terminate_and_join(mut self) -> PipelineResult<ElementStats> {
        self.request_exit();
        self.join()
    }
}
