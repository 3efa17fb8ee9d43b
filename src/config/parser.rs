use crate::config::types::Config;
use crate::{ConfigError, ConfigResult};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// Only the file structure is checked here. Each page is resolved on its own
/// when its poller is built, so one bad page does not prevent the others
/// from running.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded configuration
/// * `Err(ConfigError)` - Failed to load, parse, or check the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use website_poller::config::load_config;
///
/// let config = load_config(Path::new("pages.toml")).unwrap();
/// println!("Timeout: {}s", config.client.timeout_secs);
/// ```
pub fn load_config(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    check_structure(&config)?;
    Ok(config)
}

/// Checks the parts of the file that no single page can correct on its own
fn check_structure(config: &Config) -> ConfigResult<()> {
    if config.pages.is_empty() {
        return Err(ConfigError::Validation(
            "at least one [[page]] entry is required".to_string(),
        ));
    }

    if config.client.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "client timeout-secs must be >= 1".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for id in config.pages.iter().filter_map(|page| page.id.as_deref()) {
        if !id.trim().is_empty() && !seen.insert(id.trim()) {
            return Err(ConfigError::Validation(format!(
                "page id '{}' is used more than once",
                id
            )));
        }
    }

    Ok(())
}

/// Computes a SHA-256 hash of the configuration file content
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> ConfigResult<String> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> ConfigResult<(Config, String)> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}
