//! Error types for the widget harness

use thiserror::Error;

/// Result type alias for harness operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while fetching or assembling a widget
///
/// The loader itself never returns these to callers; it degrades the affected
/// bundle field instead. They surface from the collaborator traits
/// (`Fetcher`, `ModuleLoader`) and from configuration parsing.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to initialize a collaborator (HTTP client, resolver)
    #[error("Harness initialization failed: {0}")]
    InitializationError(String),

    /// Failed to load a widget resource (manifest, template, asset)
    #[error("Failed to load resource: {0}")]
    LoadError(String),

    /// Network error
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Invalid configuration (persona catalogs, base URLs)
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// A script module could not be loaded
    #[error("Module load failed: {0}")]
    ModuleError(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::ConfigError(err.to_string())
    }
}
