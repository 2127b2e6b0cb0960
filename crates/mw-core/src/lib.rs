//! Core configuration and shared types for minerva-watch.
//!
//! This crate provides the foundational types used across the workspace:
//!
//! - Configuration loading, defaults, and validation ([`Config`])
//! - The [`ConfigError`] type for fatal startup errors
//! - The [`PathSet`] alias backing the pending-change set

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod hash;

pub use config::{
    ComposeConfig, Config, DEFAULT_COMPOSE_COMMAND, DEFAULT_DEBOUNCE_MS, DEFAULT_IGNORE_GLOBS,
    DEFAULT_INCLUDE_EXTENSIONS, DEFAULT_SERVICE_NAME, FileConfig, StageCommands, WatchConfig,
};
pub use error::ConfigError;
pub use hash::{FxHashSet, PathSet, drain_sorted, path_set};
