//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod mock_helpers;

use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static TRACING: Once = Once::new();

/// Initialize logging once per test binary. Set `RUST_LOG` to see bridge
/// diagnostics while debugging a failing test.
pub fn init_tracing() {
    TRACING.call_once(|| {
        tracing_subscriber::registry()
            .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
            .with(tracing_subscriber::fmt::layer().with_test_writer())
            .init();
    });
}

/// Millisecond shorthand for scheduler-driven tests
pub fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

/// Drain every outbound message currently queued on the host receiver
pub fn drain(rx: &uibridge_rs::HostReceiver) -> Vec<uibridge_rs::ValueMessage> {
    rx.try_iter().collect()
}
