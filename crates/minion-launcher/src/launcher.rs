//! ElasticLauncher — decides when a new worker is needed and provisions it.
//!
//! Callers report demand with `inbound()` and its resolution with `done()`
//! or `timedout()`. All three are synchronous and never block. When demand
//! outruns in-flight supply, `inbound()` hands a provisioning attempt to the
//! runtime and returns; nobody observes the attempt's outcome.

use std::sync::Arc;

use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use minion_core::{LauncherConfig, PROVISION_TARGET, ProvisionRequest};

use crate::error::{LaunchError, LaunchResult};
use crate::limiter::RateLimiter;
use crate::provisioner::Provisioner;
use crate::state::{Attempt, LauncherState, Outcome, should_provision};

/// Point-in-time view of the launcher counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LauncherStats {
    pub pending_jobs: i64,
    pub active_workers: i64,
    pub attempts_triggered: u64,
    pub provisioned: u64,
    pub failed: u64,
    pub aborted: u64,
}

struct Inner {
    state: Arc<LauncherState>,
    callback_address: String,
    instance_id: u32,
    provisioner: Arc<dyn Provisioner>,
    limiter: Arc<dyn RateLimiter>,
    shutdown: watch::Receiver<bool>,
}

/// Demand-driven worker launcher. Cheap to clone; clones share counters.
#[derive(Clone)]
pub struct ElasticLauncher {
    inner: Arc<Inner>,
    runtime: Handle,
}

impl ElasticLauncher {
    /// Create a launcher that spawns attempts on the current tokio runtime.
    pub fn new(
        config: &LauncherConfig,
        provisioner: Arc<dyn Provisioner>,
        limiter: Arc<dyn RateLimiter>,
        shutdown: watch::Receiver<bool>,
    ) -> LaunchResult<Self> {
        let runtime = Handle::try_current().map_err(|_| LaunchError::NoRuntime)?;
        Ok(Self::with_runtime(
            runtime,
            config,
            provisioner,
            limiter,
            shutdown,
        ))
    }

    /// Create a launcher that spawns attempts on the given runtime.
    pub fn with_runtime(
        runtime: Handle,
        config: &LauncherConfig,
        provisioner: Arc<dyn Provisioner>,
        limiter: Arc<dyn RateLimiter>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Arc::new(LauncherState::new()),
                callback_address: config.callback_address.clone(),
                instance_id: config.instance_id,
                provisioner,
                limiter,
                shutdown,
            }),
            runtime,
        }
    }

    /// One unit of new demand. May trigger a provisioning attempt.
    pub fn inbound(&self) {
        let state = &self.inner.state;
        let pending = state.add_pending();
        // Not atomic with the increment above: racing callers can both
        // see stale supply and both trigger.
        let active = state.active_workers();
        debug!(instance = self.inner.instance_id, pending, active, "job inbound");

        if should_provision(pending, active) {
            let attempt = state.open_attempt();
            let inner = Arc::clone(&self.inner);
            self.runtime.spawn(inner.attempt_provision(attempt));
        }
    }

    /// One unit of demand was served.
    pub fn done(&self) {
        let pending = self.inner.state.remove_pending();
        debug!(instance = self.inner.instance_id, pending, "job done");
    }

    /// One unit of demand expired without being served.
    pub fn timedout(&self) {
        let pending = self.inner.state.remove_pending();
        debug!(instance = self.inner.instance_id, pending, "job timed out");
    }

    pub fn pending_jobs(&self) -> i64 {
        self.inner.state.pending_jobs()
    }

    pub fn active_workers(&self) -> i64 {
        self.inner.state.active_workers()
    }

    pub fn instance_id(&self) -> u32 {
        self.inner.instance_id
    }

    pub fn callback_address(&self) -> &str {
        &self.inner.callback_address
    }

    pub fn stats(&self) -> LauncherStats {
        let state = &self.inner.state;
        LauncherStats {
            pending_jobs: state.pending_jobs(),
            active_workers: state.active_workers(),
            attempts_triggered: state.triggered(),
            provisioned: state.provisioned(),
            failed: state.failed(),
            aborted: state.aborted(),
        }
    }

    /// Wait until every attempt triggered so far has finished.
    ///
    /// Attempts triggered while waiting extend the wait.
    pub async fn settle(&self) {
        let state = &self.inner.state;
        loop {
            let notified = state.settled().notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if state.is_settled() {
                return;
            }
            notified.await;
        }
    }
}

impl Inner {
    async fn attempt_provision(self: Arc<Self>, mut attempt: Attempt) {
        let _active = self.state.begin_active();
        let instance = self.instance_id;
        info!(instance, "more workers needed, provisioning one");

        match self.provision().await {
            Ok(response_bytes) => {
                info!(instance, response_bytes, "worker provisioned");
                attempt.finish(Outcome::Provisioned);
            }
            Err(e @ LaunchError::Provision(_)) => {
                warn!(instance, error = %e, "worker provisioning failed");
                attempt.finish(Outcome::Failed);
            }
            Err(e @ LaunchError::Limiter(_)) => {
                warn!(instance, error = %e, "rate limiter refused provisioning attempt");
                attempt.finish(Outcome::Aborted);
            }
            Err(e) => {
                warn!(instance, error = %e, "provisioning attempt aborted");
                attempt.finish(Outcome::Aborted);
            }
        }
    }

    /// Wait for the limiter, then call the backend once. Returns the response size.
    async fn provision(&self) -> LaunchResult<usize> {
        debug!(instance = self.instance_id, "checking the rate");
        self.limiter.wait(self.shutdown.clone()).await?;

        let payload = ProvisionRequest::new(&self.callback_address).to_payload()?;
        let response = self.provisioner.invoke(PROVISION_TARGET, payload).await?;
        Ok(response.len())
    }
}
