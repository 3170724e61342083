//! Rate limiting for provisioning attempts.
//!
//! The launcher only needs a cancellable "wait until permitted" primitive.
//! `TokenBucket` is the built-in implementation: it refills at a fixed rate
//! up to `burst` tokens, and a wait that finds the bucket empty reserves a
//! future token and sleeps until it matures.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;

use crate::error::LimiterError;

/// Boxed future returned by [`RateLimiter::wait`].
pub type WaitFuture<'a> = Pin<Box<dyn Future<Output = Result<(), LimiterError>> + Send + 'a>>;

/// Gate shared by every provisioning attempt.
///
/// `shutdown` flips to `true` when the process is stopping. Implementations
/// must return `LimiterError::Cancelled` promptly once it does.
pub trait RateLimiter: Send + Sync {
    fn wait(&self, shutdown: watch::Receiver<bool>) -> WaitFuture<'_>;
}

struct Bucket {
    /// Available tokens. Negative while reservations are outstanding.
    tokens: f64,
    last: Instant,
}

/// Token-bucket limiter admitting `per_second` attempts with bursts of `burst`.
pub struct TokenBucket {
    per_second: f64,
    burst: u32,
    bucket: Mutex<Bucket>,
}

impl TokenBucket {
    /// Create a bucket that starts full.
    pub fn new(per_second: f64, burst: u32) -> Self {
        Self {
            per_second,
            burst,
            bucket: Mutex::new(Bucket {
                tokens: burst as f64,
                last: Instant::now(),
            }),
        }
    }

    pub fn per_second(&self) -> f64 {
        self.per_second
    }

    pub fn burst(&self) -> u32 {
        self.burst
    }

    /// Take one token, returning how long the caller must sleep before using it.
    fn reserve(&self) -> Result<Duration, LimiterError> {
        if self.burst == 0 {
            return Err(LimiterError::Exhausted { burst: 0 });
        }

        let mut bucket = self.bucket.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(bucket.last).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.per_second).min(self.burst as f64);
        bucket.last = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            return Ok(Duration::ZERO);
        }
        if self.per_second <= 0.0 {
            return Err(LimiterError::Exhausted { burst: self.burst });
        }

        let delay = Duration::try_from_secs_f64((1.0 - bucket.tokens) / self.per_second)
            .map_err(|_| LimiterError::Exhausted { burst: self.burst })?;
        bucket.tokens -= 1.0;
        Ok(delay)
    }

    /// Hand back a reservation whose wait was cancelled.
    fn release(&self) {
        let mut bucket = self.bucket.lock().unwrap_or_else(PoisonError::into_inner);
        bucket.tokens = (bucket.tokens + 1.0).min(self.burst as f64);
    }
}

impl RateLimiter for TokenBucket {
    fn wait(&self, mut shutdown: watch::Receiver<bool>) -> WaitFuture<'_> {
        Box::pin(async move {
            let stopping = *shutdown.borrow();
            if stopping {
                return Err(LimiterError::Cancelled);
            }

            let delay = self.reserve()?;
            if delay.is_zero() {
                return Ok(());
            }

            debug!(delay_ms = delay.as_millis() as u64, "rate limited, waiting for a token");
            tokio::select! {
                _ = tokio::time::sleep(delay) => Ok(()),
                _ = stopped(&mut shutdown) => {
                    self.release();
                    Err(LimiterError::Cancelled)
                }
            }
        })
    }
}

/// Resolves once shutdown is signalled or its sender is gone.
async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
