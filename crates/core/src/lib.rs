//! # mk-core
//!
//! Background work engine and pass pipeline for meshkit.
//!
//! This crate provides:
//! - Configuration loading from the `.meshkit/` directory
//! - A background work engine that consumes queued work items on a
//!   dedicated worker thread and reports fractional progress
//! - A pass pipeline that sequences multi-pass transformations over the
//!   engine, with abort-on-failure semantics and per-pass error logs
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading and management
//! - [`engine`]: The background work engine and its worker thread
//! - [`pipeline`]: Pass sequencing, status reporting, and error sinks
//!
//! ## Threading model
//!
//! Exactly two threads touch this core: the engine's worker thread, and the
//! driver thread (the editor's render loop) that polls the pipeline once
//! per frame and issues `kick`/`add_item`/`clear` calls between frames.

pub mod config;
pub mod engine;
pub mod pipeline;
