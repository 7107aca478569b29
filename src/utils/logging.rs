//! Logging initialization
//!
//! Resolution runs report through `tracing`. A binary embedding the
//! resolver installs a subscriber once at startup:
//! - RUST_LOG takes precedence over any configured filter
//! - the configured filter applies otherwise, defaulting to "info"
//! - NO_COLOR disables ANSI output
//!
//! # Usage
//! ```rust
//! use webfx_modgraph::utils::init_logging;
//!
//! init_logging(None); // Uses RUST_LOG or defaults to "info"
//! ```

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn env_filter(filter: Option<&str>) -> EnvFilter {
    if std::env::var("RUST_LOG").is_ok() {
        return EnvFilter::from_default_env();
    }
    EnvFilter::new(filter.unwrap_or("info"))
}

/// Initialize human-readable logging on stderr
///
/// # Arguments
/// * `filter` - Optional log filter from config (e.g., "info", "webfx_modgraph::resolve=debug").
///              Ignored when RUST_LOG is set.
///
/// # Example
/// ```rust
/// use webfx_modgraph::utils::init_logging;
///
/// // Override with config filter (RUST_LOG still takes precedence)
/// init_logging(Some("webfx_modgraph=debug"));
/// ```
pub fn init_logging(filter: Option<&str>) {
    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_writer(std::io::stderr)
                .with_ansi(std::env::var("NO_COLOR").is_err()),
        )
        .with(env_filter(filter))
        .try_init();
}

/// Initialize logging with JSON output
///
/// Useful when logs are parsed by log aggregation systems.
#[cfg(feature = "json-logging")]
pub fn init_json_logging(filter: Option<&str>) {
    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .json()
                .with_target(true)
                .with_current_span(true)
                .with_span_list(true)
                .with_writer(std::io::stderr),
        )
        .with(env_filter(filter))
        .try_init();
}

/// Initialize logging from [`LoggingConfig`](crate::config::LoggingConfig)
///
/// # Example
/// ```rust
/// use webfx_modgraph::utils::init_logging_from_config;
/// use webfx_modgraph::config::ResolverConfig;
///
/// let config = ResolverConfig::default();
/// init_logging_from_config(config.logging.as_ref());
/// ```
pub fn init_logging_from_config(config: Option<&crate::config::LoggingConfig>) {
    let filter = config.and_then(|c| c.filter.as_deref());

    if config.map(|c| c.json_format).unwrap_or(false) {
        #[cfg(feature = "json-logging")]
        {
            init_json_logging(filter);
        }
        #[cfg(not(feature = "json-logging"))]
        {
            // Fall back to regular logging if json-logging feature not enabled
            init_logging(filter);
        }
    } else {
        init_logging(filter);
    }
}
