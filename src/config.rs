//! Configuration loading and defaults for padguard.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Main configuration for padguard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Seconds to wait after the last key press before enabling the
    /// touchpad again (default: 2.0).
    pub idle_time: f64,

    /// Milliseconds between keyboard polls (default: 200).
    pub poll_interval_ms: u64,

    /// Do not count presses of modifier keys as typing.
    pub ignore_modifier_keys: bool,

    /// Also ignore Modifier+Key combos. Implies `ignore_modifier_keys`.
    pub ignore_modifier_combos: bool,

    /// `XInput` device id to control.
    /// If unset, the first touchpad, mouse or trackball found is used.
    pub device_id: Option<u8>,

    /// Pid file written after detaching.
    pub pid_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            idle_time: 2.0,
            poll_interval_ms: 200,
            ignore_modifier_keys: false,
            ignore_modifier_combos: false,
            device_id: None,
            pid_file: None,
        }
    }
}

/// Command-line values layered on top of the file configuration.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub idle_time: Option<f64>,
    pub poll_interval_ms: Option<u64>,
    pub ignore_modifier_keys: bool,
    pub ignore_modifier_combos: bool,
    pub device_id: Option<u8>,
    pub pid_file: Option<PathBuf>,
}

/// Invalid configuration values.
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Idle time must be a positive, representable number of seconds, got {0}")]
    InvalidIdleTime(f64),
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Load configuration from the default path, or return defaults if not found.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(p) = path {
            return Self::load(p);
        }

        if let Some(default_path) = Self::default_path()
            && default_path.exists()
        {
            return Self::load(&default_path);
        }

        Ok(Self::default())
    }

    /// `$XDG_CONFIG_HOME/padguard/config.toml`.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("padguard").join("config.toml"))
    }

    /// Apply command-line values. Flags only ever switch options on.
    #[must_use]
    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        if let Some(idle_time) = overrides.idle_time {
            self.idle_time = idle_time;
        }
        if let Some(poll_interval_ms) = overrides.poll_interval_ms {
            self.poll_interval_ms = poll_interval_ms;
        }
        self.ignore_modifier_keys |= overrides.ignore_modifier_keys;
        self.ignore_modifier_combos |= overrides.ignore_modifier_combos;
        if overrides.device_id.is_some() {
            self.device_id = overrides.device_id;
        }
        if overrides.pid_file.is_some() {
            self.pid_file = overrides.pid_file;
        }
        self
    }

    /// Check values and resolve implied options.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        if self.idle_time <= 0.0 || Duration::try_from_secs_f64(self.idle_time).is_err() {
            return Err(ConfigError::InvalidIdleTime(self.idle_time));
        }
        if self.ignore_modifier_combos {
            self.ignore_modifier_keys = true;
        }
        Ok(self)
    }

    /// Idle period after which the device is enabled again.
    ///
    /// Out-of-range values saturate; [`validate`](Self::validate) rejects them.
    #[must_use]
    pub fn idle_threshold(&self) -> Duration {
        Duration::try_from_secs_f64(self.idle_time).unwrap_or(Duration::MAX)
    }

    /// Delay between two keyboard samples.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!((config.idle_time - 2.0).abs() < f64::EPSILON);
        assert_eq!(config.poll_interval_ms, 200);
        assert!(!config.ignore_modifier_keys);
        assert!(!config.ignore_modifier_combos);
        assert_eq!(config.device_id, None);
        assert_eq!(config.pid_file, None);
    }

    #[test]
    fn test_durations() {
        let config = Config {
            idle_time: 1.5,
            poll_interval_ms: 50,
            ..Config::default()
        };
        assert_eq!(config.idle_threshold(), Duration::from_millis(1500));
        assert_eq!(config.poll_interval(), Duration::from_millis(50));
    }

    #[test]
    fn test_validate_rejects_non_positive_idle_time() {
        for idle_time in [0.0, -1.0, f64::NAN, f64::INFINITY, 1e20] {
            let config = Config {
                idle_time,
                ..Config::default()
            };
            assert!(config.validate().is_err(), "idle_time {idle_time} accepted");
        }
    }

    #[test]
    fn test_validate_accepts_large_idle_time() {
        let config = Config {
            idle_time: 1e9,
            ..Config::default()
        }
        .validate()
        .unwrap();
        assert_eq!(config.idle_threshold(), Duration::from_secs(1_000_000_000));
    }

    #[test]
    fn test_idle_threshold_saturates_when_unvalidated() {
        let config = Config {
            idle_time: 1e20,
            ..Config::default()
        };
        assert_eq!(config.idle_threshold(), Duration::MAX);
    }

    #[test]
    fn test_combo_ignore_implies_modifier_ignore() {
        let config = Config {
            ignore_modifier_combos: true,
            ..Config::default()
        }
        .validate()
        .unwrap();
        assert!(config.ignore_modifier_keys);
        assert!(config.ignore_modifier_combos);
    }

    #[test]
    fn test_overrides() {
        let file = Config {
            idle_time: 3.0,
            ignore_modifier_keys: true,
            device_id: Some(11),
            ..Config::default()
        };

        let config = file.clone().with_overrides(Overrides::default());
        assert_eq!(config, file);

        let config = file.with_overrides(Overrides {
            idle_time: Some(0.5),
            poll_interval_ms: Some(100),
            device_id: Some(14),
            pid_file: Some(PathBuf::from("/run/padguard.pid")),
            ..Overrides::default()
        });
        assert!((config.idle_time - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.poll_interval_ms, 100);
        assert!(config.ignore_modifier_keys);
        assert_eq!(config.device_id, Some(14));
        assert_eq!(config.pid_file, Some(PathBuf::from("/run/padguard.pid")));
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
            idle_time = 0.75
            poll_interval_ms = 100
            ignore_modifier_combos = true
            device_id = 12
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert!((config.idle_time - 0.75).abs() < f64::EPSILON);
        assert_eq!(config.poll_interval_ms, 100);
        assert!(config.ignore_modifier_combos);
        assert_eq!(config.device_id, Some(12));
        assert_eq!(config.pid_file, None);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "idle_time = 1.0\npid_file = \"/tmp/padguard.pid\"").unwrap();

        let config = Config::load_or_default(Some(file.path())).unwrap();
        assert!((config.idle_time - 1.0).abs() < f64::EPSILON);
        assert_eq!(config.pid_file, Some(PathBuf::from("/tmp/padguard.pid")));
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load_or_default(Some(&dir.path().join("missing.toml"))).is_err());
    }
}
