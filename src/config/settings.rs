//! Configuration sections.

use super::{
    DEFAULT_BLOCK_RECORDS, DEFAULT_COLLECTOR_URI, DEFAULT_CONNECT_POLL_MS,
    DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_DISTRIBUTOR_URI, DEFAULT_HIGH_WATER_MARK,
    DEFAULT_LINGER_MS, DEFAULT_SOCKET_CAPACITY, DEFAULT_WORKERS,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ==================== Transport ====================

/// Channel sizing and connection timing for the in-process transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Capacity of every socket channel.
    pub socket_capacity: usize,

    /// How long a connect waits for its endpoint to be bound.
    pub connect_timeout_ms: u64,

    /// Interval between endpoint lookups while connecting.
    pub connect_poll_ms: u64,

    /// How long a closing push endpoint waits for its peer to take queued
    /// frames, measured from the last frame taken.
    pub linger_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            socket_capacity: DEFAULT_SOCKET_CAPACITY,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            connect_poll_ms: DEFAULT_CONNECT_POLL_MS,
            linger_ms: DEFAULT_LINGER_MS,
        }
    }
}

impl TransportConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn connect_poll_interval(&self) -> Duration {
        Duration::from_millis(self.connect_poll_ms.max(1))
    }

    pub fn linger(&self) -> Duration {
        Duration::from_millis(self.linger_ms)
    }
}

// ==================== Fan-out / Fan-in ====================

/// Layout of the distributor → workers → collector topology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FanoutConfig {
    /// Number of worker elements pulling from the distributor.
    pub workers: usize,

    /// Router endpoint of the distributor.
    pub distributor_uri: String,

    /// Pull endpoint of the collector.
    pub collector_uri: String,

    /// Queued messages at which the distributor stops reading its source
    /// and waits for requests instead.
    pub high_water_mark: usize,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            distributor_uri: DEFAULT_DISTRIBUTOR_URI.to_string(),
            collector_uri: DEFAULT_COLLECTOR_URI.to_string(),
            high_water_mark: DEFAULT_HIGH_WATER_MARK,
        }
    }
}

// ==================== Record source ====================

/// How records are read from a record file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReadMode {
    /// One record per item.
    #[default]
    Single,
    /// Up to `block_records` records per item.
    Block,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub mode: ReadMode,

    /// Records per block in `ReadMode::Block`.
    pub block_records: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            mode: ReadMode::Single,
            block_records: DEFAULT_BLOCK_RECORDS,
        }
    }
}
