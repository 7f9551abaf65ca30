//! Configuration module for swtrigger
//!
//! Settings are read from a TOML file. Every field has a default, so a file
//! only needs the values it changes:
//!
//! ```toml
//! [transport]
//! connect_timeout_ms = 5000
//!
//! [fanout]
//! workers = 8
//!
//! [source]
//! mode = "block"
//! block_records = 128
//! ```

pub mod settings;

pub use settings::*;

use crate::error::{Result, TriggerError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default capacity of a socket channel
pub const DEFAULT_SOCKET_CAPACITY: usize = 1024;

/// Default time a connect waits for its endpoint, in milliseconds
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 2_000;

/// Default endpoint polling interval while connecting, in milliseconds
pub const DEFAULT_CONNECT_POLL_MS: u64 = 5;

/// Default linger of a closing push endpoint, in milliseconds
pub const DEFAULT_LINGER_MS: u64 = 2_000;

/// Default number of worker elements
pub const DEFAULT_WORKERS: usize = 4;

/// Default distributor endpoint
pub const DEFAULT_DISTRIBUTOR_URI: &str = "inproc://swtrigger/distributor";

/// Default collector endpoint
pub const DEFAULT_COLLECTOR_URI: &str = "inproc://swtrigger/collector";

/// Default distributor queue depth before reading pauses
pub const DEFAULT_HIGH_WATER_MARK: usize = 1024;

/// Default records per block in block read mode
pub const DEFAULT_BLOCK_RECORDS: usize = 64;

/// Complete runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TriggerConfig {
    pub transport: TransportConfig,
    pub fanout: FanoutConfig,
    pub source: SourceConfig,
}

impl TriggerConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| TriggerError::Config(format!("Failed to parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            TriggerError::Config(format!("Failed to read configuration {:?}: {}", path, e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Save the configuration as TOML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)
            .map_err(|e| TriggerError::Config(format!("Failed to serialize configuration: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            TriggerError::Config(format!("Failed to write configuration {:?}: {}", path, e))
        })
    }

    /// Reject values the runtime cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.transport.socket_capacity == 0 {
            return Err(TriggerError::Config(
                "socket_capacity must be at least 1".to_string(),
            ));
        }
        if self.fanout.workers == 0 {
            return Err(TriggerError::Config("at least one worker is required".to_string()));
        }
        if self.fanout.high_water_mark == 0 {
            return Err(TriggerError::Config(
                "high_water_mark must be at least 1".to_string(),
            ));
        }
        if self.fanout.distributor_uri == self.fanout.collector_uri {
            return Err(TriggerError::Config(format!(
                "distributor and collector cannot share the endpoint '{}'",
                self.fanout.collector_uri
            )));
        }
        if self.source.mode == ReadMode::Block && self.source.block_records == 0 {
            return Err(TriggerError::Config(
                "block_records must be at least 1 in block mode".to_string(),
            ));
        }
        Ok(())
    }
}
