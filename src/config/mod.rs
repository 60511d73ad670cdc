//! Configuration management for Seatguard
//!
//! This module handles loading, parsing, and validating configuration
//! from TOML files. It covers cookie secret provisioning, the limits the
//! input translator enforces on touch frames, and general settings.

use crate::cookie::EntropySource;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration struct containing all Seatguard settings
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SeatGuardConfig {
    /// Cookie authority settings
    #[serde(default)]
    pub cookie: CookieConfig,

    /// Input translation limits
    #[serde(default)]
    pub input: InputConfig,

    /// General settings
    #[serde(default)]
    pub general: GeneralConfig,
}

/// Cookie secret provisioning
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CookieConfig {
    /// File holding a shared secret. When unset, a fresh secret is
    /// generated on every start and never leaves the process.
    #[serde(default)]
    pub secret_file: Option<PathBuf>,

    /// How long to wait for the kernel to report entropy (seconds)
    #[serde(default = "CookieConfig::default_entropy_timeout_secs")]
    pub entropy_timeout_secs: u64,

    /// Device polled for entropy readiness
    #[serde(default = "CookieConfig::default_random_device")]
    pub random_device: PathBuf,

    /// Device secret bytes are read from
    #[serde(default = "CookieConfig::default_urandom_device")]
    pub urandom_device: PathBuf,
}

/// Limits on touch frames built by the input translator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InputConfig {
    /// Maximum contacts per touch event
    #[serde(default = "InputConfig::default_max_touch_points")]
    pub max_touch_points: usize,

    /// Largest accepted touch id
    #[serde(default = "InputConfig::default_max_touch_id")]
    pub max_touch_id: i32,

    /// Re-check intra-event consistency at the seat and drop malformed
    /// touch events instead of trusting the producer
    #[serde(default)]
    pub revalidate_touch_events: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct GeneralConfig {
    /// Enable debug logging
    #[serde(default)]
    pub debug: bool,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            secret_file: None,
            entropy_timeout_secs: Self::default_entropy_timeout_secs(),
            random_device: Self::default_random_device(),
            urandom_device: Self::default_urandom_device(),
        }
    }
}

impl CookieConfig {
    fn default_entropy_timeout_secs() -> u64 {
        30
    }
    fn default_random_device() -> PathBuf {
        PathBuf::from("/dev/random")
    }
    fn default_urandom_device() -> PathBuf {
        PathBuf::from("/dev/urandom")
    }

    /// Entropy source described by this section
    pub fn entropy_source(&self) -> EntropySource {
        EntropySource {
            random_device: self.random_device.clone(),
            urandom_device: self.urandom_device.clone(),
            timeout: Duration::from_secs(self.entropy_timeout_secs),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            max_touch_points: Self::default_max_touch_points(),
            max_touch_id: Self::default_max_touch_id(),
            revalidate_touch_events: false,
        }
    }
}

impl InputConfig {
    fn default_max_touch_points() -> usize {
        16
    }
    fn default_max_touch_id() -> i32 {
        31
    }
}

/// Expand a leading `~` to `$HOME`
pub fn expand_home<P: AsRef<Path>>(path: P) -> Result<PathBuf> {
    let path = path.as_ref();
    if path.starts_with("~") {
        let home = std::env::var("HOME").context("Failed to get HOME environment variable")?;
        Ok(Path::new(&home).join(path.strip_prefix("~").unwrap_or(path)))
    } else {
        Ok(path.to_path_buf())
    }
}

impl SeatGuardConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let expanded_path = expand_home(path)?;

        let contents = fs::read_to_string(&expanded_path)
            .with_context(|| format!("Failed to read config file: {}", expanded_path.display()))?;

        let config: SeatGuardConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", expanded_path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.cookie.entropy_timeout_secs == 0 || self.cookie.entropy_timeout_secs > 300 {
            anyhow::bail!(
                "Invalid entropy_timeout_secs: {} (must be between 1 and 300)",
                self.cookie.entropy_timeout_secs
            );
        }

        if self.input.max_touch_points == 0 || self.input.max_touch_points > 64 {
            anyhow::bail!(
                "Invalid max_touch_points: {} (must be between 1 and 64)",
                self.input.max_touch_points
            );
        }

        if self.input.max_touch_id < 0 {
            anyhow::bail!("Invalid max_touch_id: {}", self.input.max_touch_id);
        }

        Ok(())
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        fs::write(path, contents).context("Failed to write configuration file")?;

        Ok(())
    }
}
