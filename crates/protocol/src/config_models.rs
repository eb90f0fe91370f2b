//! Shell configuration models from `config.toml`.
//!
//! These structures are deserialized from `.meshkit/config.toml` by the
//! core's config loader. Every field has a default so a missing file or a
//! partial file still yields a usable configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Timing settings for the background work engine.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct EngineSettings {
    /// Sleep between worker ticks while a job set is in flight, in
    /// milliseconds.
    pub tick_interval_ms: u64,

    /// Sleep between polls while the worker is idle, in milliseconds.
    /// Must be non-zero.
    pub idle_poll_ms: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1,
            idle_poll_ms: 10,
        }
    }
}

impl EngineSettings {
    /// Tick interval as a [`Duration`].
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Idle poll period as a [`Duration`].
    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }
}

/// Top-level shell configuration.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ShellConfig {
    /// Work engine timing.
    pub engine: EngineSettings,

    /// Directory the per-pass error logs are written into.
    pub log_dir: PathBuf,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            engine: EngineSettings::default(),
            log_dir: PathBuf::from("."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_settings_defaults() {
        let settings = EngineSettings::default();
        assert_eq!(settings.tick_interval(), Duration::from_millis(1));
        assert_eq!(settings.idle_poll(), Duration::from_millis(10));
    }
}
