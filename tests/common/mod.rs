//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod mock_helpers;

use std::sync::Arc;
use std::time::Duration;
use swtrigger::config::TransportConfig;
use swtrigger::transport::Context;

/// Upper bound for anything a test waits on
pub fn test_timeout() -> Duration {
    Duration::from_secs(5)
}

/// Transport context with fast connect polling
pub fn test_context() -> Arc<Context> {
    Arc::new(Context::new(TransportConfig {
        connect_timeout_ms: test_timeout().as_millis() as u64,
        connect_poll_ms: 1,
        linger_ms: 500,
        ..TransportConfig::default()
    }))
}

/// Unique endpoint name per call, so tests sharing a process never collide
pub fn unique_uri(prefix: &str) -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static NEXT: AtomicU64 = AtomicU64::new(0);
    format!("inproc://{}-{}", prefix, NEXT.fetch_add(1, Ordering::Relaxed))
}
