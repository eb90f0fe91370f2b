//! # mk-protocol
//!
//! Core protocol definitions and data models for meshkit.
//!
//! This crate defines all shared data structures used for:
//! - Status reporting between the editor shell UI and the core
//! - Run and pass outcome records (summaries, failure reports)
//! - Configuration file parsing (TOML shell config)
//!
//! ## Modules
//!
//! - [`config_models`]: Shell and engine configuration from config.toml
//! - [`pass_models`]: Pass failure records and run summaries
//! - [`status_models`]: Status lines and run phases shown by the driver UI
//!
//! ## Design Principles
//!
//! - Minimal dependencies: Only serde, uuid, and chrono
//! - Independent compilation: No dependencies on other meshkit crates

pub mod config_models;
pub mod pass_models;
pub mod status_models;

// Re-export all public types for convenience
pub use config_models::*;
pub use pass_models::*;
pub use status_models::*;
