//! Configuration loading and management.
//!
//! This module provides functionality to load and parse the shell
//! configuration from the `.meshkit/` directory structure.

pub mod error;
pub mod loader;

pub use error::{ConfigError, ConfigResult};
pub use loader::load_config;
