//! minion-core — shared types for the minion elastic launcher.
//!
//! Holds the `minion.toml` configuration model and the payload handed to
//! a provisioned worker when it is launched.

pub mod config;
pub mod types;

pub use config::{ConfigError, LambdaConfig, LauncherConfig, MinionConfig, RateLimitConfig};
pub use types::*;
