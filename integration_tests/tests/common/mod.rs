//! Common test utilities and fixtures
#![allow(dead_code)]

use std::sync::Once;

use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Initialize test logging (call once per test module)
pub fn init_logging() {
    INIT.call_once(|| {
        let filter = EnvFilter::from_default_env().add_directive("airtunes2=debug".parse().unwrap());

        fmt().with_env_filter(filter).with_test_writer().init();
    });
}

/// A configuration with short timeouts, for tests that exercise real sockets against a
/// local fake receiver.
pub fn test_config() -> airtunes2::config::StreamConfig {
    airtunes2::config::StreamConfig::builder()
        .rtsp_request_timeout(std::time::Duration::from_millis(500))
        .build()
}
