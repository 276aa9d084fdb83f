//! Error types shared across the tuon crates.

use miette::Diagnostic;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("invalid configuration value for {field}: {message}")]
    #[diagnostic(
        code(config::invalid),
        help("Check the {var} environment variable")
    )]
    Invalid {
        field: &'static str,
        var: &'static str,
        message: String,
    },

    #[error("configuration value for {field} must be greater than zero")]
    #[diagnostic(code(config::zero))]
    Zero { field: &'static str },
}
