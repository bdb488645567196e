//! Logging setup for basequery.
//!
//! Structured logging is controlled by environment variables:
//!
//! - `BASEQUERY_DEBUG=true|1|yes` - Enable debug logging
//! - `BASEQUERY_LOG_LEVEL=trace|debug|info|warn|error` - Set a specific level
//! - `BASEQUERY_LOG_FORMAT=json|pretty|compact` - Output format (default: json)
//!
//! ```rust,no_run
//! use basequery_engine::logging;
//!
//! // Call once at startup.
//! logging::init();
//! ```
//!
//! Inside the crate the plain `tracing` macros are used; plan compilation logs
//! at `debug`, rendered SQL at `trace`, dropped filters at `warn`.

use std::env;
use std::sync::Once;

static INIT: Once = Once::new();

/// Check if debug logging is enabled via `BASEQUERY_DEBUG`.
#[inline]
pub fn is_debug_enabled() -> bool {
    env::var("BASEQUERY_DEBUG")
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

/// Get the configured log level from `BASEQUERY_LOG_LEVEL`.
///
/// Defaults to "debug" if `BASEQUERY_DEBUG` is enabled, otherwise "warn".
pub fn get_log_level() -> &'static str {
    let fallback = if is_debug_enabled() { "debug" } else { "warn" };
    match env::var("BASEQUERY_LOG_LEVEL") {
        Ok(level) => match level.to_lowercase().as_str() {
            "trace" => "trace",
            "debug" => "debug",
            "info" => "info",
            "warn" => "warn",
            "error" => "error",
            _ => fallback,
        },
        Err(_) => fallback,
    }
}

/// Get the configured log format from `BASEQUERY_LOG_FORMAT`.
pub fn get_log_format() -> &'static str {
    env::var("BASEQUERY_LOG_FORMAT")
        .map(|f| match f.to_lowercase().as_str() {
            "pretty" => "pretty",
            "compact" => "compact",
            _ => "json",
        })
        .unwrap_or("json")
}

/// Initialize logging. Subsequent calls are no-ops.
///
/// Without the `tracing-subscriber` feature this does nothing and the host
/// application installs its own subscriber.
pub fn init() {
    INIT.call_once(|| {
        if !is_debug_enabled() && env::var("BASEQUERY_LOG_LEVEL").is_err() {
            return;
        }

        #[cfg(feature = "tracing-subscriber")]
        {
            use tracing_subscriber::{EnvFilter, fmt, prelude::*};

            let level = get_log_level();
            let filter = EnvFilter::try_new(format!(
                "basequery={},basequery_engine={},basequery_postgres={}",
                level, level, level
            ))
            .unwrap_or_else(|_| EnvFilter::new("warn"));

            let registry = tracing_subscriber::registry().with(filter);
            let installed = match get_log_format() {
                "json" => registry.with(fmt::layer().json()).try_init(),
                "compact" => registry.with(fmt::layer().compact()).try_init(),
                _ => registry.with(fmt::layer().pretty()).try_init(),
            };

            if installed.is_ok() {
                tracing::info!(level = level, format = get_log_format(), "basequery logging initialized");
            }
        }
    });
}

/// Conditional debug logging, only when `BASEQUERY_DEBUG` is set at runtime.
#[macro_export]
macro_rules! bq_debug {
    ($($arg:tt)*) => {
        if $crate::logging::is_debug_enabled() {
            tracing::debug!($($arg)*);
        }
    };
}
