//! minion.toml configuration parser.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading or validating `minion.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to render config: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinionConfig {
    #[serde(default)]
    pub launcher: LauncherConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub lambda: LambdaConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LauncherConfig {
    /// Address provisioned workers connect back to.
    #[serde(default)]
    pub callback_address: String,
    /// Diagnostic id attached to every log line of this launcher.
    #[serde(default)]
    pub instance_id: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_per_second")]
    pub per_second: f64,
    #[serde(default = "default_burst")]
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_second: default_per_second(),
            burst: default_burst(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LambdaConfig {
    /// host:port of the invoke endpoint.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout")]
    pub timeout: String,
}

impl Default for LambdaConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout: default_timeout(),
        }
    }
}

impl LambdaConfig {
    /// The invoke timeout as a `Duration`.
    pub fn timeout(&self) -> Result<Duration, ConfigError> {
        parse_duration(&self.timeout)
            .ok_or_else(|| ConfigError::Invalid(format!("bad lambda.timeout: {:?}", self.timeout)))
    }
}

fn default_per_second() -> f64 {
    1.0
}

fn default_burst() -> u32 {
    1
}

fn default_endpoint() -> String {
    "127.0.0.1:9001".to_string()
}

fn default_timeout() -> String {
    "30s".to_string()
}

impl MinionConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::read_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a config file without validating it, for callers that
    /// override fields before calling `validate()` themselves.
    pub fn read_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: MinionConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Build a config with defaults for everything but the callback address.
    pub fn with_callback(callback_address: &str) -> Self {
        MinionConfig {
            launcher: LauncherConfig {
                callback_address: callback_address.to_string(),
                instance_id: 0,
            },
            rate_limit: RateLimitConfig::default(),
            lambda: LambdaConfig::default(),
        }
    }

    /// Reject values the launcher cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.launcher.callback_address.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "launcher.callback_address must not be empty".to_string(),
            ));
        }
        if !self.rate_limit.per_second.is_finite() || self.rate_limit.per_second < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "rate_limit.per_second must be a non-negative number, got {}",
                self.rate_limit.per_second
            )));
        }
        let per_second = self.rate_limit.per_second;
        if per_second > 0.0 && Duration::try_from_secs_f64(1.0 / per_second).is_err() {
            return Err(ConfigError::Invalid(format!(
                "rate_limit.per_second is too small to ever refill, got {per_second}"
            )));
        }
        if self.lambda.endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "lambda.endpoint must not be empty".to_string(),
            ));
        }
        self.lambda.timeout()?;
        Ok(())
    }
}

/// Parse a duration string like "5s", "500ms", "1m".
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(secs) = s.strip_suffix('s') {
        if let Some(ms) = secs.strip_suffix('m') {
            ms.parse::<u64>().ok().map(Duration::from_millis)
        } else {
            secs.parse::<u64>().ok().map(Duration::from_secs)
        }
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal() {
        let toml_str = r#"
[launcher]
callback_address = "10.0.0.5:50051"
"#;
        let config = MinionConfig::from_toml(toml_str).unwrap();
        assert_eq!(config.launcher.callback_address, "10.0.0.5:50051");
        assert_eq!(config.launcher.instance_id, 0);
        assert_eq!(config.rate_limit.burst, 1);
        assert_eq!(config.rate_limit.per_second, 1.0);
        assert_eq!(config.lambda.endpoint, "127.0.0.1:9001");
        assert_eq!(config.lambda.timeout().unwrap(), Duration::from_secs(30));
    }

    #[test]
    fn parse_full() {
        let toml_str = r#"
[launcher]
callback_address = "grpc.internal:443"
instance_id = 7

[rate_limit]
per_second = 0.5
burst = 3

[lambda]
endpoint = "lambda.local:8080"
timeout = "1500ms"
"#;
        let config = MinionConfig::from_toml(toml_str).unwrap();
        assert_eq!(config.launcher.instance_id, 7);
        assert_eq!(config.rate_limit.per_second, 0.5);
        assert_eq!(config.rate_limit.burst, 3);
        assert_eq!(config.lambda.endpoint, "lambda.local:8080");
        assert_eq!(config.lambda.timeout().unwrap(), Duration::from_millis(1500));
    }

    #[test]
    fn missing_callback_is_rejected() {
        let err = MinionConfig::from_toml("[rate_limit]\nburst = 2\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = MinionConfig::from_toml("[launcher]\ncallback_address = \"  \"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn negative_rate_is_rejected() {
        let toml_str = r#"
[launcher]
callback_address = "h:1"
[rate_limit]
per_second = -1.0
"#;
        assert!(matches!(
            MinionConfig::from_toml(toml_str),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn tiny_rate_is_rejected() {
        let toml_str = r#"
[launcher]
callback_address = "h:1"
[rate_limit]
per_second = 1e-30
"#;
        assert!(matches!(
            MinionConfig::from_toml(toml_str),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn read_file_skips_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("minion.toml");
        std::fs::write(&path, "[rate_limit]\nburst = 4\n").unwrap();

        let config = MinionConfig::read_file(&path).unwrap();
        assert_eq!(config.launcher.callback_address, "");
        assert_eq!(config.rate_limit.burst, 4);
        assert!(matches!(
            MinionConfig::from_file(&path),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn bad_timeout_is_rejected() {
        let toml_str = r#"
[launcher]
callback_address = "h:1"
[lambda]
timeout = "soon"
"#;
        assert!(matches!(
            MinionConfig::from_toml(toml_str),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn rendered_config_parses_back() {
        let config = MinionConfig::with_callback("cb:9000");
        let rendered = config.to_toml_string().unwrap();
        assert!(rendered.contains("cb:9000"));

        let parsed = MinionConfig::from_toml(&rendered).unwrap();
        assert_eq!(parsed.launcher.callback_address, "cb:9000");
    }

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration("5s"), Some(Duration::from_secs(5)));
        assert_eq!(parse_duration("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_duration("2m"), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration("10"), Some(Duration::from_secs(10)));
        assert_eq!(parse_duration("later"), None);
        assert_eq!(parse_duration(&format!("{}m", u64::MAX)), None);
    }
}
