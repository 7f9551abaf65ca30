//! Error handling for swtrigger
//!
//! This module defines the crate-level error type and a Result alias used
//! by configuration loading and topology assembly. Element-level failures
//! are [`PipelineError`]s and convert into [`TriggerError::Pipeline`].

use crate::pipeline::error::PipelineError;
use thiserror::Error;

/// Main error type for swtrigger operations
#[derive(Error, Debug)]
pub enum TriggerError {
    /// Errors raised inside a processing element
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<TriggerError>,
    },
}

impl TriggerError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        TriggerError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

impl From<crate::transport::TransportError> for TriggerError {
    fn from(err: crate::transport::TransportError) -> Self {
        TriggerError::Pipeline(PipelineError::Transport(err))
    }
}

/// Result type alias for swtrigger operations
pub type Result<T> = std::result::Result<T, TriggerError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, PipelineError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| TriggerError::from(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| TriggerError::from(e).with_context(f()))
    }
}
