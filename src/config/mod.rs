//! Configuration management for OSC Console GW
//!
//! Handles loading, parsing, validation and hot-reloading of YAML configuration files.

pub mod watcher;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;
use tokio::fs;

pub use watcher::ConfigWatcher;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct AppConfig {
    pub console: ConsoleConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub status: StatusConfig,
    /// Addresses loaded on start and after every reconnect
    #[serde(default)]
    pub watch: Vec<String>,
}

/// Console network endpoint
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ConsoleConfig {
    pub host: String,
    #[serde(default = "default_console_port")]
    pub port: u16,
    /// Local address the UDP socket binds to
    #[serde(default = "default_bind")]
    pub bind: String,
}

/// Timing and admission knobs of the sync core
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SyncConfig {
    #[serde(default = "default_fade_tick_ms")]
    pub fade_tick_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_request_concurrency")]
    pub request_concurrency: usize,
    #[serde(default = "default_debounce_wait_ms")]
    pub debounce_wait_ms: u64,
    #[serde(default = "default_debounce_max_wait_ms")]
    pub debounce_max_wait_ms: u64,
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    /// Idle window after which the console drops a push subscription
    #[serde(default = "default_subscription_timeout_ms")]
    pub subscription_timeout_ms: u64,
    #[serde(default = "default_subscribe_address")]
    pub subscribe_address: String,
}

/// Caller-side connection status policy
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct StatusConfig {
    #[serde(default = "default_unreachable_after")]
    pub unreachable_after_failures: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            fade_tick_ms: default_fade_tick_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            request_concurrency: default_request_concurrency(),
            debounce_wait_ms: default_debounce_wait_ms(),
            debounce_max_wait_ms: default_debounce_max_wait_ms(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            subscription_timeout_ms: default_subscription_timeout_ms(),
            subscribe_address: default_subscribe_address(),
        }
    }
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            unreachable_after_failures: default_unreachable_after(),
        }
    }
}

impl SyncConfig {
    pub fn fade_tick(&self) -> Duration {
        Duration::from_millis(self.fade_tick_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn debounce_wait(&self) -> Duration {
        Duration::from_millis(self.debounce_wait_ms)
    }

    pub fn debounce_max_wait(&self) -> Duration {
        Duration::from_millis(self.debounce_max_wait_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// Validate intervals and their relationships
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("fade_tick_ms", self.fade_tick_ms),
            ("request_timeout_ms", self.request_timeout_ms),
            ("debounce_wait_ms", self.debounce_wait_ms),
            ("debounce_max_wait_ms", self.debounce_max_wait_ms),
            ("heartbeat_interval_ms", self.heartbeat_interval_ms),
            ("subscription_timeout_ms", self.subscription_timeout_ms),
        ] {
            if value == 0 {
                anyhow::bail!("sync.{} must be greater than 0", name);
            }
        }

        if self.request_concurrency == 0 {
            anyhow::bail!("sync.request_concurrency must be at least 1");
        }

        if self.debounce_max_wait_ms < self.debounce_wait_ms {
            anyhow::bail!(
                "sync.debounce_max_wait_ms ({}) must not be below debounce_wait_ms ({})",
                self.debounce_max_wait_ms,
                self.debounce_wait_ms
            );
        }

        if self.heartbeat_interval_ms >= self.subscription_timeout_ms {
            anyhow::bail!(
                "sync.heartbeat_interval_ms ({}) must be shorter than subscription_timeout_ms ({})",
                self.heartbeat_interval_ms,
                self.subscription_timeout_ms
            );
        }

        validate_address(&self.subscribe_address).context("Invalid sync.subscribe_address")?;
        Ok(())
    }
}

impl ConsoleConfig {
    /// Resolve the console endpoint
    pub fn remote_addr(&self) -> Result<SocketAddr> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .with_context(|| format!("Failed to resolve console host: {}", self.host))?
            .next()
            .with_context(|| format!("No address found for console host: {}", self.host))
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.bind
            .parse()
            .with_context(|| format!("Invalid console.bind address: {}", self.bind))
    }
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config = Self::parse(&contents)
            .with_context(|| format!("Failed to load config: {}", path))?;

        Ok(config)
    }

    /// Parse and validate a YAML document
    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig =
            serde_yaml::from_str(contents).context("Failed to parse YAML config")?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self, path: &str) -> Result<()> {
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;

        fs::write(path, yaml)
            .await
            .with_context(|| format!("Failed to write config file: {}", path))?;

        Ok(())
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        if self.console.host.is_empty() {
            anyhow::bail!("console.host cannot be empty");
        }
        self.console.bind_addr()?;

        self.sync.validate()?;

        if self.status.unreachable_after_failures == 0 {
            anyhow::bail!("status.unreachable_after_failures must be at least 1");
        }

        for (idx, address) in self.watch.iter().enumerate() {
            validate_address(address).with_context(|| format!("Invalid watch entry {}", idx))?;
        }

        Ok(())
    }

    /// Watch addresses present in `self` but not in `previous`
    pub fn added_watches<'a>(&'a self, previous: &AppConfig) -> Vec<&'a str> {
        self.watch
            .iter()
            .filter(|a| !previous.watch.contains(a))
            .map(String::as_str)
            .collect()
    }

    /// True when a reload changed settings that only apply at startup
    pub fn needs_restart(&self, previous: &AppConfig) -> bool {
        self.console != previous.console || self.sync != previous.sync
    }
}

fn validate_address(address: &str) -> Result<()> {
    if !address.starts_with('/') {
        anyhow::bail!("address '{}' must start with '/'", address);
    }
    if address.chars().any(char::is_whitespace) {
        anyhow::bail!("address '{}' must not contain whitespace", address);
    }
    Ok(())
}

// Default value functions
fn default_console_port() -> u16 { 10023 }
fn default_bind() -> String { "0.0.0.0:0".to_string() }
fn default_fade_tick_ms() -> u64 { 50 }
fn default_request_timeout_ms() -> u64 { 200 }
fn default_request_concurrency() -> usize { 100 }
fn default_debounce_wait_ms() -> u64 { 100 }
fn default_debounce_max_wait_ms() -> u64 { 500 }
fn default_heartbeat_interval_ms() -> u64 { 9000 }
fn default_subscription_timeout_ms() -> u64 { 10000 }
fn default_subscribe_address() -> String { "/xremote".to_string() }
fn default_unreachable_after() -> u32 { 5 }

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MINIMAL: &str = r#"
console:
  host: "192.168.1.50"
"#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = AppConfig::parse(MINIMAL).unwrap();

        assert_eq!(config.console.port, 10023);
        assert_eq!(config.console.bind, "0.0.0.0:0");
        assert_eq!(config.sync, SyncConfig::default());
        assert_eq!(config.sync.fade_tick(), Duration::from_millis(50));
        assert_eq!(config.sync.request_timeout(), Duration::from_millis(200));
        assert_eq!(config.sync.request_concurrency, 100);
        assert_eq!(config.sync.heartbeat_interval(), Duration::from_secs(9));
        assert_eq!(config.sync.subscribe_address, "/xremote");
        assert_eq!(config.status.unreachable_after_failures, 5);
        assert!(config.watch.is_empty());
    }

    #[test]
    fn test_full_config() {
        let yaml = r#"
console:
  host: "127.0.0.1"
  port: 9000
  bind: "127.0.0.1:0"
sync:
  fade_tick_ms: 20
  request_timeout_ms: 300
  request_concurrency: 8
  debounce_wait_ms: 50
  debounce_max_wait_ms: 250
  heartbeat_interval_ms: 4000
  subscription_timeout_ms: 5000
  subscribe_address: "/subscribe"
status:
  unreachable_after_failures: 3
watch:
  - /ch/01/mix/fader
  - /ch/01/mix/on
"#;
        let config = AppConfig::parse(yaml).unwrap();
        assert_eq!(config.sync.fade_tick_ms, 20);
        assert_eq!(config.sync.request_concurrency, 8);
        assert_eq!(config.watch.len(), 2);
        assert_eq!(
            config.console.remote_addr().unwrap(),
            "127.0.0.1:9000".parse().unwrap()
        );
    }

    #[test]
    fn test_heartbeat_must_be_shorter_than_expiry() {
        let yaml = r#"
console:
  host: "127.0.0.1"
sync:
  heartbeat_interval_ms: 10000
  subscription_timeout_ms: 10000
"#;
        let err = AppConfig::parse(yaml).unwrap_err();
        assert!(format!("{:#}", err).contains("heartbeat_interval_ms"));
    }

    #[test]
    fn test_rejects_invalid_values() {
        let cases = [
            "console:\n  host: \"\"\n",
            "console:\n  host: a\n  bind: nope\n",
            "console:\n  host: a\nsync:\n  fade_tick_ms: 0\n",
            "console:\n  host: a\nsync:\n  request_concurrency: 0\n",
            "console:\n  host: a\nsync:\n  debounce_wait_ms: 600\n",
            "console:\n  host: a\nsync:\n  subscribe_address: xremote\n",
            "console:\n  host: a\nstatus:\n  unreachable_after_failures: 0\n",
            "console:\n  host: a\nwatch:\n  - ch/01\n",
        ];
        for yaml in cases {
            assert!(AppConfig::parse(yaml).is_err(), "accepted: {}", yaml);
        }
    }

    #[test]
    fn test_reload_diff() {
        let old = AppConfig::parse("console:\n  host: a\nwatch:\n  - /a\n").unwrap();
        let mut new = old.clone();
        new.watch.push("/b".to_string());

        assert_eq!(new.added_watches(&old), vec!["/b"]);
        assert!(!new.needs_restart(&old));

        new.sync.fade_tick_ms = 25;
        assert!(new.needs_restart(&old));
    }

    #[tokio::test]
    async fn test_load_and_save_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        let path = path.to_string_lossy().to_string();

        let config = AppConfig::parse(MINIMAL).unwrap();
        config.save(&path).await.unwrap();

        let loaded = AppConfig::load(&path).await.unwrap();
        assert_eq!(loaded, config);
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let err = AppConfig::load("/nonexistent/config.yaml").await.unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to read config file"));
    }
}
