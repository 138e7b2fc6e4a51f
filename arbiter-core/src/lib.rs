//! Core shared library for the Arbiter workspace.
//!
//! This crate exposes the ambient primitives the rule engine and its tooling
//! depend on: the canonical error type, configuration loading and logging
//! setup.

pub mod config;
pub mod errors;
pub mod logging;

pub use config::{EngineSettings, Environment};
pub use errors::{ArbiterError, ConfigError, Result as CoreResult};
