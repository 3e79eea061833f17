//! rollcheck-core — shared types for the rollout status engine.
//!
//! Holds the closed set of status codes, the (code, message) outcome pair,
//! immutable sub-resource snapshots, and the `rollcheck.toml` parser.

pub mod config;
pub mod error;
pub mod types;

pub use config::{format_duration, parse_duration, ResourceConfig, RollcheckConfig, StatusCheckConfig};
pub use error::{ConfigError, ConfigResult};
pub use types::*;
