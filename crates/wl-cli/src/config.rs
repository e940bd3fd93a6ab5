//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors.
///
/// All of these fail the command at startup; a misconfigured tracker must
/// not run at all rather than silently corrupt session data.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Extraction from files/environment failed.
    #[error("invalid configuration: {0}")]
    Load(#[from] Box<figment::Error>),
    /// An interval was configured as zero.
    #[error("{field} must be non-zero")]
    ZeroInterval { field: &'static str },
    /// Debounce would be meaningless with a timeout at or below the scan
    /// interval.
    #[error("absence_timeout_secs ({timeout}) must exceed scan_interval_secs ({interval})")]
    TimeoutNotAboveInterval { timeout: u64, interval: u64 },
}

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,
    /// Scan tool invoked by `wl watch`.
    pub scan_program: PathBuf,
    /// Seconds between presence scans.
    pub scan_interval_secs: u64,
    /// Seconds of continuous absence before a session is closed.
    pub absence_timeout_secs: u64,
    /// Seconds a single scan may take before it is abandoned.
    pub scan_timeout_secs: u64,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_path", &self.database_path)
            .field("scan_program", &self.scan_program)
            .field("scan_interval_secs", &self.scan_interval_secs)
            .field("absence_timeout_secs", &self.absence_timeout_secs)
            .field("scan_timeout_secs", &self.scan_timeout_secs)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("wl.db"),
            scan_program: PathBuf::from("arp-scan"),
            scan_interval_secs: 30,
            absence_timeout_secs: 120,
            scan_timeout_secs: 10,
        }
    }
}

impl Config {
    /// Loads configuration from default locations.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Loads configuration, optionally from a specific file.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (WL_*)
        figment = figment.merge(Env::prefixed("WL_"));

        let config: Self = figment.extract().map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.scan_interval_secs == 0 {
            return Err(ConfigError::ZeroInterval {
                field: "scan_interval_secs",
            });
        }
        if self.scan_timeout_secs == 0 {
            return Err(ConfigError::ZeroInterval {
                field: "scan_timeout_secs",
            });
        }
        if self.absence_timeout_secs <= self.scan_interval_secs {
            return Err(ConfigError::TimeoutNotAboveInterval {
                timeout: self.absence_timeout_secs,
                interval: self.scan_interval_secs,
            });
        }
        Ok(())
    }

    /// Time between presence scans.
    #[must_use]
    pub const fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    /// Continuous absence needed before a session closes.
    #[must_use]
    pub fn absence_timeout(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.absence_timeout_secs).unwrap_or(i64::MAX))
    }

    /// Hard limit on a single scan's runtime.
    #[must_use]
    pub const fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }
}

/// Returns the platform-specific config directory for wl.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("wl"))
}

/// Returns the platform-specific data directory for wl.
///
/// On Linux: `~/.local/share/wl`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("wl"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_data_dir_for_db() {
        let config = Config::default();
        let data_dir = dirs_data_path().unwrap();
        assert_eq!(config.database_path, data_dir.join("wl.db"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn timeout_must_exceed_scan_interval() {
        let config = Config {
            scan_interval_secs: 120,
            absence_timeout_secs: 120,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::TimeoutNotAboveInterval { .. })
        ));
    }

    #[test]
    fn zero_intervals_are_rejected() {
        let config = Config {
            scan_interval_secs: 0,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroInterval { .. })
        ));
    }

    #[test]
    fn config_file_overrides_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(
            &path,
            "database_path = \"/tmp/other.db\"\nscan_interval_secs = 15\n",
        )
        .unwrap();

        let config = Config::load_from(Some(&path)).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/tmp/other.db"));
        assert_eq!(config.scan_interval_secs, 15);
        // Untouched fields keep their defaults
        assert_eq!(config.absence_timeout_secs, 120);
    }
}
