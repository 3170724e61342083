//! minion-launcher — demand-driven elastic worker provisioning.
//!
//! Tracks pending jobs against provisioning attempts in flight and launches
//! a new remote worker whenever demand outruns supply. Provisioned workers
//! dial back to the configured callback address and are served elsewhere;
//! this crate only decides *when* to launch one and issues the call.
//!
//! # Trigger rule
//!
//! ```text
//! inbound():  pending += 1
//!             if pending > active - 1:
//!                 spawn attempt
//!
//! attempt:    active += 1            (released on every exit path)
//!             limiter.wait(shutdown) (cancellable, abort on error)
//!             payload = {"CallBackServer": cb, "MaxServeTime": 15}
//!             provisioner.invoke("lambda-handler", payload)
//! ```
//!
//! The check and the spawn are not one atomic step. Two inbound calls racing
//! on stale counters can both spawn an attempt; over-provisioning is
//! accepted over starving the first job.

pub mod error;
pub mod launcher;
pub mod limiter;
pub mod provisioner;
mod state;

pub use error::{LaunchError, LaunchResult, LimiterError, ProvisionError};
pub use launcher::{ElasticLauncher, LauncherStats};
pub use limiter::{RateLimiter, TokenBucket, WaitFuture};
pub use provisioner::{InvokeFuture, Provisioner};
