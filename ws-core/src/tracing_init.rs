//! Tracing initialization for the workspace services
//!
//! Uses the standard RUST_LOG environment variable for filtering:
//! - `RUST_LOG=debug` - Set global level
//! - `RUST_LOG=ws_api=info,ws_orchestrator=debug` - Set per-crate levels
//!
//! Uses WS_LOG_FORMAT for output format (optional):
//! - `json` - JSON formatted output
//! - `pretty` - Pretty formatted output (default)
//! - `compact` - Compact single-line output

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{CoreError, Result};

/// Initialize the tracing subscriber with an `info` default filter.
pub fn init() -> Result<()> {
    init_with_defaults("info")
}

/// Initialize with a default filter if RUST_LOG is not set
///
/// Returns an error if a global subscriber is already installed.
pub fn init_with_defaults(default_filter: &str) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let format = std::env::var("WS_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = match format.as_str() {
        "json" => registry
            .with(fmt::layer().with_ansi(false).json())
            .try_init(),
        "compact" => registry.with(fmt::layer().compact()).try_init(),
        _ => registry.with(fmt::layer().pretty()).try_init(),
    };

    result.map_err(|e| CoreError::Internal(format!("Failed to initialize tracing: {}", e)))
}

/// Initialize for tests; output goes through the libtest capture.
pub fn init_for_testing() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::new("debug"))
        .with(fmt::layer().with_test_writer())
        .try_init()
        .map_err(|e| CoreError::Internal(format!("Failed to initialize test tracing: {}", e)))
}
