//! Shared plumbing for the tuon crates: errors, configuration, telemetry and
//! the TTL cache used for short-lived values such as signed image URLs.

pub mod cache;
pub mod config;
pub mod error;
#[cfg(feature = "telemetry")]
pub mod telemetry;

pub use crate::cache::TtlCache;
pub use crate::config::SyncConfig;
pub use crate::error::ConfigError;
