//! zkelect Configuration
//!
//! Configuration structures for the leader election node. All durations
//! are given in milliseconds in the TOML file and exposed as `Duration`
//! through accessor methods.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main zkelect configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Coordination-service connection configuration
    #[serde(default)]
    pub coordination: CoordinationConfig,

    /// Election configuration
    #[serde(default)]
    pub election: ElectionConfig,

    /// Leader-side data rotation configuration
    #[serde(default)]
    pub leader: LeaderConfig,

    /// Failover/backoff configuration
    #[serde(default)]
    pub failover: FailoverConfig,

    /// Metrics API configuration
    #[serde(default)]
    pub api: ApiConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Coordination-service connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinationConfig {
    /// ZooKeeper ensemble endpoints (host:port)
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<String>,

    /// Session timeout in milliseconds
    #[serde(default = "default_session_timeout_ms")]
    pub session_timeout_ms: u64,

    /// TCP connect timeout per endpoint in milliseconds
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

/// Election configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionConfig {
    /// Path of the ephemeral election marker node
    #[serde(default = "default_marker_path")]
    pub marker_path: String,

    /// Interval between attempts to create the marker, in milliseconds
    #[serde(default = "default_attempt_interval_ms")]
    pub attempt_interval_ms: u64,
}

/// Leader-side data rotation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderConfig {
    /// Directory node under which the leader rotates its data files
    #[serde(default = "default_data_path")]
    pub data_path: String,

    /// Maximum number of rotating files kept in the data directory
    #[serde(default = "default_storage_capacity")]
    pub storage_capacity: usize,

    /// Interval between leader file writes, in milliseconds
    #[serde(default = "default_write_interval_ms")]
    pub write_interval_ms: u64,
}

/// Failover/backoff configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailoverConfig {
    /// Fixed interval between quick reconnect attempts, in milliseconds
    #[serde(default = "default_quick_retry_ms")]
    pub quick_retry_ms: u64,

    /// Max time the ensemble needs to detect a dead leader, in milliseconds.
    /// The quick retry phase ends this long after failover entry.
    #[serde(default = "default_dead_leader_timeout_ms")]
    pub dead_leader_timeout_ms: u64,

    /// Increment added to the retry delay after each failed attempt once
    /// the quick phase is over, in milliseconds
    #[serde(default = "default_slow_retry_step_ms")]
    pub slow_retry_step_ms: u64,

    /// Max time a node may stay in failover before giving up, in milliseconds
    #[serde(default = "default_max_state_duration_ms")]
    pub max_state_duration_ms: u64,
}

/// Metrics API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Enable the HTTP metrics endpoint
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// HTTP bind address
    #[serde(default = "default_api_address")]
    pub bind_address: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (pretty, json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_endpoints() -> Vec<String> {
    vec![
        "zoo1:2181".to_string(),
        "zoo2:2182".to_string(),
        "zoo3:2183".to_string(),
    ]
}

fn default_session_timeout_ms() -> u64 {
    300
}

fn default_connect_timeout_ms() -> u64 {
    1000
}

fn default_marker_path() -> String {
    "/election".to_string()
}

fn default_attempt_interval_ms() -> u64 {
    300
}

fn default_data_path() -> String {
    "/data".to_string()
}

fn default_storage_capacity() -> usize {
    5
}

fn default_write_interval_ms() -> u64 {
    300
}

fn default_quick_retry_ms() -> u64 {
    50
}

fn default_dead_leader_timeout_ms() -> u64 {
    400
}

fn default_slow_retry_step_ms() -> u64 {
    500
}

fn default_max_state_duration_ms() -> u64 {
    10_000
}

fn default_true() -> bool {
    true
}

fn default_api_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            endpoints: default_endpoints(),
            session_timeout_ms: default_session_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl Default for ElectionConfig {
    fn default() -> Self {
        Self {
            marker_path: default_marker_path(),
            attempt_interval_ms: default_attempt_interval_ms(),
        }
    }
}

impl Default for LeaderConfig {
    fn default() -> Self {
        Self {
            data_path: default_data_path(),
            storage_capacity: default_storage_capacity(),
            write_interval_ms: default_write_interval_ms(),
        }
    }
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self {
            quick_retry_ms: default_quick_retry_ms(),
            dead_leader_timeout_ms: default_dead_leader_timeout_ms(),
            slow_retry_step_ms: default_slow_retry_step_ms(),
            max_state_duration_ms: default_max_state_duration_ms(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: default_api_address(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> crate::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.coordination.endpoints.is_empty() {
            return Err(crate::Error::Config(
                "coordination.endpoints cannot be empty".into(),
            ));
        }

        if self.leader.storage_capacity == 0 {
            return Err(crate::Error::Config(
                "leader.storage_capacity must be at least 1".into(),
            ));
        }

        for (name, path) in [
            ("election.marker_path", &self.election.marker_path),
            ("leader.data_path", &self.leader.data_path),
        ] {
            if !path.starts_with('/') || path.len() < 2 || path.ends_with('/') {
                return Err(crate::Error::Config(format!(
                    "{name} must be an absolute path below the root, got {path:?}"
                )));
            }
        }

        if self.failover.quick_retry_ms == 0 {
            return Err(crate::Error::Config(
                "failover.quick_retry_ms must be positive".into(),
            ));
        }

        if self.failover.quick_retry_ms > self.failover.dead_leader_timeout_ms {
            return Err(crate::Error::Config(
                "failover.quick_retry_ms cannot exceed failover.dead_leader_timeout_ms".into(),
            ));
        }

        Ok(())
    }

    /// Get the coordination session timeout as Duration
    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.coordination.session_timeout_ms)
    }

    /// Get the per-endpoint TCP connect timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.coordination.connect_timeout_ms)
    }

    /// Get the marker attempt poll interval as Duration
    pub fn attempt_interval(&self) -> Duration {
        Duration::from_millis(self.election.attempt_interval_ms)
    }

    /// Get the leader write interval as Duration
    pub fn write_interval(&self) -> Duration {
        Duration::from_millis(self.leader.write_interval_ms)
    }

    /// Get the quick retry interval as Duration
    pub fn quick_retry_interval(&self) -> Duration {
        Duration::from_millis(self.failover.quick_retry_ms)
    }

    /// Get the dead leader detection timeout as Duration
    pub fn dead_leader_timeout(&self) -> Duration {
        Duration::from_millis(self.failover.dead_leader_timeout_ms)
    }

    /// Get the slow retry step as Duration
    pub fn slow_retry_step(&self) -> Duration {
        Duration::from_millis(self.failover.slow_retry_step_ms)
    }

    /// Get the max failover state duration as Duration
    pub fn max_failover_duration(&self) -> Duration {
        Duration::from_millis(self.failover.max_state_duration_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml = r#"
[coordination]
endpoints = ["zk-a:2181", "zk-b:2181"]
session_timeout_ms = 500

[leader]
data_path = "/rotation"
storage_capacity = 3

[failover]
quick_retry_ms = 25
"#;

        let config = Config::from_str(toml).unwrap();
        assert_eq!(config.coordination.endpoints.len(), 2);
        assert_eq!(config.session_timeout(), Duration::from_millis(500));
        assert_eq!(config.leader.data_path, "/rotation");
        assert_eq!(config.leader.storage_capacity, 3);
        assert_eq!(config.quick_retry_interval(), Duration::from_millis(25));
        // Untouched sections keep their defaults
        assert_eq!(config.election.marker_path, "/election");
        assert_eq!(config.max_failover_duration(), Duration::from_secs(10));
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_str("").unwrap();
        assert_eq!(config.coordination.endpoints.len(), 3);
        assert_eq!(config.attempt_interval(), Duration::from_millis(300));
        assert_eq!(config.write_interval(), Duration::from_millis(300));
        assert_eq!(config.dead_leader_timeout(), Duration::from_millis(400));
        assert_eq!(config.slow_retry_step(), Duration::from_millis(500));
        assert_eq!(config.leader.storage_capacity, 5);
        assert!(config.api.enabled);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.coordination.endpoints.clear();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.leader.storage_capacity = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.election.marker_path = "election".into();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.failover.quick_retry_ms = 800;
        assert!(config.validate().is_err());
    }
}
