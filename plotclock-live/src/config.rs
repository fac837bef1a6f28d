//! Live session configuration, loaded from TOML.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::LiveError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    /// Number of rows kept and shown.
    pub lookback: usize,
    /// Minimum time between two realignments.
    pub min_update_interval_ms: u64,
    /// Realign at least this often even when the clock has not advanced,
    /// so an in-progress bar keeps getting patched.
    pub force_refresh_ms: Option<u64>,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            lookback: 23,
            min_update_interval_ms: 0,
            force_refresh_ms: None,
        }
    }
}

impl LiveConfig {
    /// Load a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, LiveError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| LiveError::Config(format!("read {}: {e}", path.display())))?;
        Self::from_toml(&content)
    }

    /// Parse and validate a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, LiveError> {
        let config: Self =
            toml::from_str(content).map_err(|e| LiveError::Config(format!("parse TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), LiveError> {
        if self.lookback == 0 {
            return Err(LiveError::Config("lookback must be at least 1".into()));
        }
        Ok(())
    }

    pub fn min_update_interval(&self) -> Duration {
        Duration::from_millis(self.min_update_interval_ms)
    }

    pub fn force_refresh(&self) -> Option<Duration> {
        self.force_refresh_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = LiveConfig::from_toml("").unwrap();
        assert_eq!(config.lookback, 23);
        assert_eq!(config.min_update_interval(), Duration::ZERO);
        assert_eq!(config.force_refresh(), None);
    }

    #[test]
    fn parses_intervals() {
        let config = LiveConfig::from_toml(
            "lookback = 100\nmin_update_interval_ms = 250\nforce_refresh_ms = 5000",
        )
        .unwrap();
        assert_eq!(config.lookback, 100);
        assert_eq!(config.min_update_interval(), Duration::from_millis(250));
        assert_eq!(config.force_refresh(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn zero_lookback_is_rejected() {
        assert!(matches!(
            LiveConfig::from_toml("lookback = 0"),
            Err(LiveError::Config(_))
        ));
    }

    #[test]
    fn unknown_keys_are_type_checked() {
        assert!(LiveConfig::from_toml("lookback = \"many\"").is_err());
    }
}
