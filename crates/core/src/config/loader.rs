//! Configuration file loader for the `.meshkit/` directory structure.
//!
//! This module loads the shell configuration from `.meshkit/config.toml`:
//! engine timing (tick interval, idle poll period) and the directory the
//! per-pass error logs are written into.

use crate::config::error::ConfigError;
use crate::config::error::ConfigResult;
use mk_protocol::config_models::ShellConfig;
use std::path::Path;

/// Loads the shell configuration from the `.meshkit/` directory.
///
/// # Arguments
///
/// * `root` - Root directory containing the `.meshkit/` folder
///
/// # Returns
///
/// A `ShellConfig`. If the directory or `config.toml` is missing, returns
/// the default configuration rather than an error.
///
/// # Errors
///
/// Returns `ConfigError` if:
/// - `config.toml` exists but cannot be read
/// - `config.toml` has invalid TOML syntax
/// - A setting is out of range (e.g. a zero idle poll period)
///
/// # Example
///
/// ```rust,no_run
/// use mk_core::config::loader::load_config;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("."))?;
/// println!("Engine ticks every {}ms", config.engine.tick_interval_ms);
/// # Ok(())
/// # }
/// ```
pub fn load_config(root: &Path) -> ConfigResult<ShellConfig> {
    let mk_dir = root.join(".meshkit");
    let config_path = mk_dir.join("config.toml");

    // If the directory or file doesn't exist, return default config
    if !config_path.exists() {
        return Ok(ShellConfig::default());
    }

    let content =
        std::fs::read_to_string(&config_path).map_err(|source| ConfigError::FileRead {
            path: config_path.clone(),
            source,
        })?;

    let config: ShellConfig =
        toml::from_str(&content).map_err(|source| ConfigError::TomlParse {
            path: config_path.clone(),
            source,
        })?;

    validate(&config, &config_path)?;

    Ok(config)
}

/// Rejects settings the engine cannot run with.
fn validate(config: &ShellConfig, path: &Path) -> ConfigResult<()> {
    if config.engine.idle_poll_ms == 0 {
        return Err(ConfigError::InvalidConfig {
            path: path.to_path_buf(),
            reason: "engine.idle_poll_ms must be non-zero".to_string(),
        });
    }
    Ok(())
}
