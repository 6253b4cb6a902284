//! Daemon configuration.
//!
//! Loaded from `<config dir>/partyq/config.json` unless a path is given on the
//! command line. Every field has a default, so a missing file or a partial file
//! is fine.

mod validation;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{DaemonError, Result};

/// Hard ceiling on guests per session.
pub const MAX_GUESTS: usize = 4;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub session: SessionSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Framed JSON-RPC listener
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// HTTP status endpoints
    #[serde(default = "default_status_addr")]
    pub status_addr: SocketAddr,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3000))
}
fn default_status_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3001))
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            status_addr: default_status_addr(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSettings {
    #[serde(default = "default_max_guests")]
    pub max_guests: usize,

    /// Heartbeat age after which a participant is evicted
    #[serde(default = "default_heartbeat_timeout")]
    pub heartbeat_timeout_secs: u64,

    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    #[serde(default = "default_tally_period")]
    pub tally_period_secs: u64,

    /// Code draws before session creation gives up
    #[serde(default = "default_code_attempts")]
    pub code_attempts: u32,
}

fn default_max_guests() -> usize {
    MAX_GUESTS
}
fn default_heartbeat_timeout() -> u64 {
    900
}
fn default_sweep_interval() -> u64 {
    60
}
fn default_tally_period() -> u64 {
    30
}
fn default_code_attempts() -> u32 {
    64
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_guests: default_max_guests(),
            heartbeat_timeout_secs: default_heartbeat_timeout(),
            sweep_interval_secs: default_sweep_interval(),
            tally_period_secs: default_tally_period(),
            code_attempts: default_code_attempts(),
        }
    }
}

impl SessionSettings {
    #[must_use]
    pub fn heartbeat_timeout_ms(&self) -> u64 {
        self.heartbeat_timeout_secs.saturating_mul(1000)
    }

    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    #[must_use]
    pub fn tally_period(&self) -> Duration {
        Duration::from_secs(self.tally_period_secs)
    }

    fn normalize(&mut self) -> Result<()> {
        if self.max_guests > MAX_GUESTS {
            warn!(
                "session.maxGuests {} exceeds the limit, using {MAX_GUESTS}",
                self.max_guests
            );
            self.max_guests = MAX_GUESTS;
        }
        if self.sweep_interval_secs == 0 || self.tally_period_secs == 0 {
            return Err(DaemonError::Config(
                "session.sweepIntervalSecs and session.tallyPeriodSecs must be positive".into(),
            ));
        }
        if self.code_attempts == 0 {
            return Err(DaemonError::Config(
                "session.codeAttempts must be positive".into(),
            ));
        }
        Ok(())
    }
}

impl Config {
    /// Default config file location, if the platform has a config directory.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "partyq").map(|dirs| dirs.config_dir().join("config.json"))
    }

    /// Load config from file. A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON, or
    /// holds values the daemon cannot run with.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        validation::warn_unknown_fields(&content, "config.json");
        let mut config: Self = serde_json::from_str(&content)?;
        config.session.normalize()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.listen_addr.port(), 3000);
        assert_eq!(config.server.status_addr.port(), 3001);
        assert_eq!(config.session.max_guests, 4);
        assert_eq!(config.session.heartbeat_timeout_ms(), 900_000);
        assert_eq!(config.session.sweep_interval(), Duration::from_secs(60));
        assert_eq!(config.session.tally_period(), Duration::from_secs(30));
        assert_eq!(config.session.code_attempts, 64);
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let file = write_config(r#"{"session": {"tallyPeriodSecs": 5}}"#);
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.session.tally_period_secs, 5);
        assert_eq!(config.session.sweep_interval_secs, 60);
        assert_eq!(config.server, ServerConfig::default());
    }

    #[test]
    fn test_max_guests_clamped() {
        let file = write_config(r#"{"session": {"maxGuests": 10}}"#);
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.session.max_guests, MAX_GUESTS);
    }

    #[test]
    fn test_zero_period_rejected() {
        let file = write_config(r#"{"session": {"tallyPeriodSecs": 0}}"#);
        assert!(matches!(
            Config::load(file.path()),
            Err(DaemonError::Config(_))
        ));
    }

    #[test]
    fn test_bad_address_is_json_error() {
        let file = write_config(r#"{"server": {"listenAddr": "nowhere"}}"#);
        assert!(matches!(Config::load(file.path()), Err(DaemonError::Json(_))));
    }

    #[test]
    fn test_camel_case_keys() {
        let json = serde_json::to_value(Config::default()).unwrap();
        assert_eq!(json["server"]["listenAddr"], "0.0.0.0:3000");
        assert_eq!(json["session"]["heartbeatTimeoutSecs"], 900);
    }
}
