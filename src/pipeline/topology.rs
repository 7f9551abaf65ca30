//! Fan-out / fan-in topology: the standard trigger farm layout.
//!
//! ```text
//!                      ┌─► worker-0 ─┐
//! source ─► distributor ├─► worker-1 ─┼─► collector ─► sink
//!                      └─► worker-N ─┘
//! ```
//!
//! The distributor serves records to pulling workers through a
//! [`FanoutBalancedSink`]; each worker runs its own processor and pushes
//! results through a [`FanInSink`] into the collector's [`FanInSource`].

use crate::config::FanoutConfig;
use crate::pipeline::element::{ElementHandle, ElementStats, ProcessingElement};
use crate::pipeline::error::PipelineResult;
use crate::pipeline::nodes::{
    FanInSink, FanInSource, FanoutBalancedSink, FanoutBalancedSource, PipelineElement,
};
use crate::pipeline::processor::{PassThrough, Processor};
use crate::pipeline::sink::DataSink;
use crate::pipeline::source::MessageSource;
use crate::transport::Context;
use std::sync::Arc;
use std::time::Duration;

/// Builder for the distributor → workers → collector layout.
pub struct TopologyBuilder {
    ctx: Arc<Context>,
    config: FanoutConfig,
}

impl TopologyBuilder {
    pub fn new(ctx: Arc<Context>, config: FanoutConfig) -> Self {
        Self { ctx, config }
    }

    /// Spawn every element. `make_processor` is called once per worker
    /// with the worker's index.
    pub fn spawn<S, K, P, F>(
        self,
        source: S,
        mut make_processor: F,
        sink: K,
    ) -> PipelineResult<RunningTopology>
    where
        S: MessageSource + 'static,
        K: DataSink + 'static,
        P: Processor + 'static,
        F: FnMut(usize) -> P,
    {
        let workers = self.config.workers;

        let collector = PipelineElement::new(
            "collector",
            FanInSource::new(self.ctx.clone(), self.config.collector_uri.clone())
                .with_expected_producers(workers),
            PassThrough,
            sink,
        );
        let collector = ProcessingElement::new(Box::new(collector)).spawn()?;

        let mut worker_handles = Vec::with_capacity(workers);
        for index in 0..workers {
            let worker = PipelineElement::new(
                format!("worker-{}", index),
                FanoutBalancedSource::new(self.ctx.clone(), self.config.distributor_uri.clone()),
                make_processor(index),
                FanInSink::new(self.ctx.clone(), self.config.collector_uri.clone()),
            );
            worker_handles.push(ProcessingElement::new(Box::new(worker)).spawn()?);
        }

        let distributor = PipelineElement::new(
            "distributor",
            source,
            PassThrough,
            FanoutBalancedSink::new(self.ctx.clone(), self.config.distributor_uri.clone())
                .with_high_water_mark(self.config.high_water_mark)
                .with_expected_clients(workers),
        );
        let distributor = ProcessingElement::new(Box::new(distributor)).spawn()?;

        tracing::info!(
            "Topology running: distributor '{}', {} workers, collector '{}'",
            self.config.distributor_uri,
            workers,
            self.config.collector_uri
        );
        let mut elements = Vec::with_capacity(workers + 2);
        elements.push((Role::Distributor, distributor));
        elements.extend(
            worker_handles
                .into_iter()
                .enumerate()
                .map(|(index, handle)| (Role::Worker(index), handle)),
        );
        elements.push((Role::Collector, collector));
        Ok(RunningTopology {
            elements,
            poll: self.ctx.config().connect_poll_interval(),
        })
    }
}

/// Per-element statistics of a finished topology.
#[derive(Debug, Clone, Default)]
pub struct TopologyStats {
    pub distributor: ElementStats,
    pub workers: Vec<ElementStats>,
    pub collector: ElementStats,
}

impl TopologyStats {
    /// Process messages handled across all workers.
    pub fn worker_items(&self) -> u64 {
        self.workers.iter().map(|w| w.process_items).sum()
    }
}

/// Place of an element in the topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Distributor,
    Worker(usize),
    Collector,
}

/// Handles of a spawned topology.
pub struct RunningTopology {
    elements: Vec<(Role, ElementHandle)>,
    poll: Duration,
}

impl RunningTopology {
    pub fn worker_count(&self) -> usize {
        self.elements
            .iter()
            .filter(|(role, _)| matches!(role, Role::Worker(_)))
            .count()
    }

    /// Wait for every element, in the order they finish.
    ///
    /// The first failure asks every element still running to exit, since
    /// its peers would otherwise wait for it forever. All elements are
    /// joined either way; the first failure is returned.
    pub fn join(self) -> PipelineResult<TopologyStats> {
        let mut stats = TopologyStats {
            workers: vec![ElementStats::default(); self.worker_count()],
            ..TopologyStats::default()
        };
        let mut first_error = None;
        let mut pending = self.elements;

        while !pending.is_empty() {
            let (finished, running): (Vec<_>, Vec<_>) =
                pending.into_iter().partition(|(_, handle)| handle.is_finished());
            pending = running;
            if finished.is_empty() {
                std::thread::sleep(self.poll);
                continue;
            }

            for (role, handle) in finished {
                let name = handle.name().to_string();
                match handle.join() {
                    Ok(element) => match role {
                        Role::Distributor => stats.distributor = element,
                        Role::Worker(index) => stats.workers[index] = element,
                        Role::Collector => stats.collector = element,
                    },
                    Err(e) => {
                        tracing::error!("Element '{}' failed: {}", name, e);
                        if first_error.is_none() {
                            tracing::warn!("Stopping {} remaining elements", pending.len());
                            for (_, other) in pending.iter_mut() {
                                other.request_exit();
                            }
                            first_error = Some(e);
                        }
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(stats),
        }
    }
}
