//! Line-oriented demand feed.
//!
//! Each non-empty line is one event: `inbound`, `done`, `timedout`, or
//! `stats`. Lines starting with `#` are ignored.

use std::str::FromStr;

use thiserror::Error;

use minion_launcher::ElasticLauncher;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Inbound,
    Done,
    Timedout,
    Stats,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FeedError {
    #[error("unknown demand event: {0:?}")]
    Unknown(String),

    #[error("failed to encode stats: {0}")]
    Encode(String),
}

impl FromStr for Event {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inbound" | "in" => Ok(Event::Inbound),
            "done" => Ok(Event::Done),
            "timedout" | "timeout" => Ok(Event::Timedout),
            "stats" => Ok(Event::Stats),
            other => Err(FeedError::Unknown(other.to_string())),
        }
    }
}

/// Apply one feed line. Returns the JSON stats line for `stats`.
pub fn apply(launcher: &ElasticLauncher, line: &str) -> Result<Option<String>, FeedError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    match line.parse::<Event>()? {
        Event::Inbound => launcher.inbound(),
        Event::Done => launcher.done(),
        Event::Timedout => launcher.timedout(),
        Event::Stats => {
            let json = serde_json::to_string(&launcher.stats())
                .map_err(|e| FeedError::Encode(e.to_string()))?;
            return Ok(Some(json));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use minion_core::LauncherConfig;
    use minion_launcher::{InvokeFuture, Provisioner, RateLimiter, WaitFuture};
    use tokio::sync::watch;

    struct NoopProvisioner;

    impl Provisioner for NoopProvisioner {
        fn invoke<'a>(&'a self, _target: &'a str, _payload: Vec<u8>) -> InvokeFuture<'a> {
            Box::pin(async { Ok(Vec::new()) })
        }
    }

    struct OpenLimiter;

    impl RateLimiter for OpenLimiter {
        fn wait(&self, _shutdown: watch::Receiver<bool>) -> WaitFuture<'_> {
            Box::pin(async { Ok(()) })
        }
    }

    fn test_launcher() -> (ElasticLauncher, watch::Sender<bool>) {
        let (tx, rx) = watch::channel(false);
        let config = LauncherConfig {
            callback_address: "cb:1".to_string(),
            instance_id: 0,
        };
        let launcher =
            ElasticLauncher::new(&config, Arc::new(NoopProvisioner), Arc::new(OpenLimiter), rx)
                .unwrap();
        (launcher, tx)
    }

    #[test]
    fn parses_events() {
        assert_eq!("inbound".parse::<Event>(), Ok(Event::Inbound));
        assert_eq!(" DONE ".parse::<Event>(), Ok(Event::Done));
        assert_eq!("timeout".parse::<Event>(), Ok(Event::Timedout));
        assert_eq!("stats".parse::<Event>(), Ok(Event::Stats));
        assert_eq!(
            "launch".parse::<Event>(),
            Err(FeedError::Unknown("launch".to_string()))
        );
    }

    #[tokio::test]
    async fn apply_updates_launcher() {
        let (launcher, _tx) = test_launcher();

        for line in ["inbound", "inbound", "", "# comment", "done", "timedout", "inbound"] {
            assert_eq!(apply(&launcher, line), Ok(None));
        }
        assert_eq!(launcher.pending_jobs(), 1);
        assert!(apply(&launcher, "scale").is_err());
    }

    #[tokio::test]
    async fn stats_line_is_json() {
        let (launcher, _tx) = test_launcher();
        apply(&launcher, "inbound").unwrap();
        launcher.settle().await;

        let json = apply(&launcher, "stats").unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["pending_jobs"], 1);
        assert_eq!(value["active_workers"], 0);
        assert_eq!(value["provisioned"], 1);
    }
}
