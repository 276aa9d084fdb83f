//! Tracing setup for binaries and test harnesses that embed the sync engine.
//!
//! # Usage
//!
//! ```ignore
//! use tuon_common::telemetry::{self, TelemetryConfig};
//!
//! let config = TelemetryConfig::from_env("tuon-sync");
//! telemetry::init(config);
//!
//! tracing::info!("sync engine started");
//! ```

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Telemetry configuration
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name, attached to the startup log line.
    pub service_name: String,
    /// Console log level (default: INFO, DEBUG in debug builds)
    pub console_level: Level,
}

impl TelemetryConfig {
    /// Build config for `service_name`.
    ///
    /// `RUST_LOG` is honoured at [`init`] time and overrides `console_level`.
    pub fn from_env(service_name: impl Into<String>) -> Self {
        let console_level = if cfg!(debug_assertions) {
            Level::DEBUG
        } else {
            Level::INFO
        };

        Self {
            service_name: service_name.into(),
            console_level,
        }
    }
}

/// Initialize tracing with a compact console layer.
///
/// Safe to call more than once; later calls are ignored because a global
/// subscriber is already installed.
pub fn init(config: TelemetryConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.console_level.as_str().to_lowercase()));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .with_filter(env_filter);

    if tracing_subscriber::registry()
        .with(console_layer)
        .try_init()
        .is_ok()
    {
        tracing::info!(service = %config.service_name, "telemetry initialized");
    }
}
