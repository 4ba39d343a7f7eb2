//! Configuration settings and validation.

use std::path::PathBuf;
use std::time::Duration;

use crate::dispatch::DEFAULT_BUFFER;
use crate::events::FilterConfig;
use crate::repository::{Credentials, DEFAULT_REMOTE};
use crate::sync::PollerConfig;
use crate::{Error, Result};

/// Main configuration for the git-events server.
#[derive(Debug, Clone)]
pub struct Config {
    /// Remote to clone when `repo_dir` holds no repository yet.
    pub repo_url: Option<String>,

    /// Branch to track.
    pub branch: String,

    /// Local working copy.
    pub repo_dir: PathBuf,

    /// Remote name to fetch from.
    pub remote: String,

    /// Seconds between poll cycles.
    pub interval_secs: u64,

    /// Host address to bind to.
    pub host: String,

    /// Port to listen on.
    pub port: u16,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON.
    pub log_json: bool,

    /// Seconds a single send to a subscriber may block.
    pub send_timeout_secs: u64,

    /// Events buffered per subscription.
    pub subscriber_buffer: usize,

    /// Paths, patterns and topics dropped before dispatch.
    pub filter: FilterConfig,

    /// SSH credentials for the remote.
    pub credentials: Credentials,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            repo_url: None,
            branch: "master".to_string(),
            repo_dir: PathBuf::from("/var/gitevents/data"),
            remote: DEFAULT_REMOTE.to_string(),
            interval_secs: 300,
            host: "127.0.0.1".to_string(),
            port: 9000,
            log_level: "info".to_string(),
            log_json: false,
            send_timeout_secs: 5,
            subscriber_buffer: DEFAULT_BUFFER,
            filter: FilterConfig::default(),
            credentials: Credentials::default(),
        }
    }
}

impl Config {
    /// Create a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(Error::config("port cannot be 0"));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(Error::config(format!(
                "invalid log level '{}', must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.host.is_empty() {
            return Err(Error::config("host cannot be empty"));
        }

        if self.branch.trim().is_empty() {
            return Err(Error::config("branch cannot be empty"));
        }

        if self.remote.trim().is_empty() {
            return Err(Error::config("remote cannot be empty"));
        }

        if self.interval_secs == 0 {
            return Err(Error::config("interval cannot be 0"));
        }

        if self.send_timeout_secs == 0 {
            return Err(Error::config("send timeout cannot be 0"));
        }

        if self.subscriber_buffer == 0 {
            return Err(Error::config("subscriber buffer cannot be 0"));
        }

        if let Some(url) = &self.repo_url {
            if url.trim().is_empty() {
                return Err(Error::config("repository URL cannot be empty when set"));
            }
        }

        Ok(())
    }

    /// Poll interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Settings for the poller.
    #[must_use]
    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig {
            branch: self.branch.clone(),
            interval: self.interval(),
            send_timeout: Duration::from_secs(self.send_timeout_secs),
        }
    }

    /// Get the server address as a string.
    #[must_use]
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Topic;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port, 9000);
        assert_eq!(config.branch, "master");
        assert_eq!(config.interval_secs, 300);
        assert_eq!(config.repo_dir, PathBuf::from("/var/gitevents/data"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_new() {
        let config = Config::new();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_invalid_port() {
        let config = Config {
            port: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("port"));
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let config = Config {
            log_level: "invalid".to_string(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log level"));
    }

    #[test]
    fn test_validate_zero_interval() {
        let config = Config {
            interval_secs: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("interval"));
    }

    #[test]
    fn test_validate_zero_send_timeout() {
        let config = Config {
            send_timeout_secs: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("send timeout"));
    }

    #[test]
    fn test_validate_zero_buffer() {
        let config = Config {
            subscriber_buffer: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_empty_branch() {
        let config = Config {
            branch: "  ".to_string(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("branch"));
    }

    #[test]
    fn test_validate_empty_host() {
        let config = Config {
            host: String::new(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("host"));
    }

    #[test]
    fn test_validate_blank_url() {
        let config = Config {
            repo_url: Some(String::new()),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("URL"));
    }

    #[test]
    fn test_log_level_case_insensitive() {
        for level in ["TRACE", "Debug", "INFO", "Warn", "ERROR"] {
            let config = Config {
                log_level: level.to_string(),
                ..Default::default()
            };
            assert!(
                config.validate().is_ok(),
                "Level '{level}' should be valid (case insensitive)"
            );
        }
    }

    #[test]
    fn test_poller_config() {
        let config = Config {
            branch: "main".to_string(),
            interval_secs: 60,
            send_timeout_secs: 2,
            filter: FilterConfig {
                excluded_topics: vec![Topic::Copied],
                ..Default::default()
            },
            ..Default::default()
        };
        let poller = config.poller_config();
        assert_eq!(poller.branch, "main");
        assert_eq!(poller.interval, Duration::from_secs(60));
        assert_eq!(poller.send_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_server_addr() {
        let config = Config {
            host: "0.0.0.0".to_string(),
            port: 9090,
            ..Default::default()
        };
        assert_eq!(config.server_addr(), "0.0.0.0:9090");
    }
}
