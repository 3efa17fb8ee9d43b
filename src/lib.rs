//! Website-Poller: periodic HTTP polling of configured pages
//!
//! Each configured page gets its own [`PagePoller`], which fires requests on a
//! fixed or jittered schedule, rotates through a list of user agents, and hands
//! every response (or transport error) to a caller-supplied [`Handler`].

pub mod config;
pub mod poller;

use thiserror::Error;

/// Main error type for Website-Poller operations
#[derive(Debug, Error)]
pub enum PollerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Poller {id} has already been started")]
    AlreadyStarted { id: String },
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unrecognized HTTP method: {0}")]
    UnrecognizedMethod(String),

    #[error("URL does not have a scheme: {0}")]
    MissingScheme(String),

    #[error("Invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        source: ::url::ParseError,
    },
}

/// Error delivered to a handler when a single poll attempt fails
#[derive(Debug, Error)]
pub enum PollError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Request cancelled before completion")]
    Cancelled,
}

impl PollError {
    /// Returns true if the request hit the client timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Request(e) if e.is_timeout())
    }
}

/// Result type alias for Website-Poller operations
pub type Result<T> = std::result::Result<T, PollerError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::{PageConfig, PollOptions, UserAgentOptions};
pub use poller::{Handler, PagePoller, PollResult, Poller, Transport};
