//! Configuration module for Website-Poller
//!
//! This module handles loading TOML configuration files and resolving each
//! page entry into a [`ValidatedPage`] the pollers can run on.
//!
//! # Example
//!
//! ```no_run
//! use website_poller::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("pages.toml")).unwrap();
//! println!("Polling {} pages", config.pages.len());
//! ```

mod parser;
mod types;
pub mod validation;

// Re-export types
pub use types::{ClientConfig, Config, PageConfig, PollOptions, UserAgentOptions};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};

// Re-export resolved page types
pub use validation::{validate_page, PollPlan, ValidatedPage};
