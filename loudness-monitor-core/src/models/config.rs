use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::MonitorError;
use crate::processing::loudness::Calibration;
use crate::processing::tiers::{TierBands, DEFAULT_TIER_FRACTIONS};

/// Period between sampling ticks.
pub const DEFAULT_SAMPLE_PERIOD_MS: u64 = 500;

/// Samples per analysis frame.
pub const DEFAULT_WINDOW_SIZE: usize = 256;

/// Shortest accepted period, roughly one display refresh.
pub const MIN_SAMPLE_PERIOD_MS: u64 = 16;

pub const MAX_WINDOW_SIZE: usize = 32_768;

/// Configuration for a loudness monitor.
///
/// Every field has a default, so a JSON file only needs the keys it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfiguration {
    /// Milliseconds between sampling ticks (default: 500).
    pub sample_period_ms: u64,

    /// Samples per analysis frame (default: 256).
    pub window_size: usize,

    /// Decibel conversion and clamp bounds.
    pub calibration: Calibration,

    /// Cumulative-band widths of Quiet, Moderate and Loud as fractions of the
    /// calibrated span. Critical takes the remainder.
    pub tier_fractions: [f64; 3],

    /// Specific microphone device ID, or None for system default.
    pub device_id: Option<String>,
}

impl MonitorConfiguration {
    pub fn sample_period(&self) -> Duration {
        Duration::from_millis(self.sample_period_ms)
    }

    /// Tier cut points for the configured calibration.
    pub fn tier_bands(&self) -> Result<TierBands, String> {
        let Calibration { floor, ceiling, .. } = self.calibration;
        TierBands::from_fractions(floor, ceiling, self.tier_fractions)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.sample_period_ms < MIN_SAMPLE_PERIOD_MS {
            return Err(format!(
                "sample period {}ms is below the {}ms minimum",
                self.sample_period_ms, MIN_SAMPLE_PERIOD_MS
            ));
        }
        if self.window_size == 0 || self.window_size > MAX_WINDOW_SIZE {
            return Err(format!("unsupported window size: {}", self.window_size));
        }
        self.calibration.validate()?;
        self.tier_bands()?;
        Ok(())
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self, MonitorError> {
        let config: Self = serde_json::from_str(json).map_err(|e| {
            MonitorError::ConfigurationFailed(format!("failed to parse config: {}", e))
        })?;
        config.validate().map_err(MonitorError::ConfigurationFailed)?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    pub fn from_path(path: &Path) -> Result<Self, MonitorError> {
        let json = fs::read_to_string(path).map_err(|e| {
            MonitorError::ConfigurationFailed(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }
}

impl Default for MonitorConfiguration {
    fn default() -> Self {
        Self {
            sample_period_ms: DEFAULT_SAMPLE_PERIOD_MS,
            window_size: DEFAULT_WINDOW_SIZE,
            calibration: Calibration::default(),
            tier_fractions: DEFAULT_TIER_FRACTIONS,
            device_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = MonitorConfiguration::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sample_period(), Duration::from_millis(500));
        assert_eq!(config.window_size, 256);
    }

    #[test]
    fn rejects_fast_period_and_bad_window() {
        let config = MonitorConfiguration {
            sample_period_ms: 5,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = MonitorConfiguration {
            window_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = MonitorConfiguration::from_json_str(
            r#"{ "sample_period_ms": 250, "calibration": { "offset_db": 110.0 } }"#,
        )
        .unwrap();

        assert_eq!(config.sample_period_ms, 250);
        assert_eq!(config.window_size, DEFAULT_WINDOW_SIZE);
        assert_eq!(config.calibration.offset_db, 110.0);
        assert_eq!(config.calibration.floor, Calibration::default().floor);
    }

    #[test]
    fn invalid_json_is_configuration_error() {
        let err = MonitorConfiguration::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, MonitorError::ConfigurationFailed(_)));

        let inverted = r#"{ "calibration": { "floor": 90, "ceiling": 80 } }"#;
        let err = MonitorConfiguration::from_json_str(inverted).unwrap_err();
        assert!(matches!(err, MonitorError::ConfigurationFailed(_)));
    }

    #[test]
    fn from_path_reads_file() {
        let name = format!("loudness_config_{}.json", uuid::Uuid::new_v4());
        let path = std::env::temp_dir().join(name);
        fs::write(&path, r#"{ "window_size": 512 }"#).unwrap();

        let config = MonitorConfiguration::from_path(&path).unwrap();
        assert_eq!(config.window_size, 512);

        fs::remove_file(&path).ok();
    }

    #[test]
    fn missing_file_is_configuration_error() {
        let path = Path::new("/nonexistent/loudness.json");
        let err = MonitorConfiguration::from_path(path).unwrap_err();
        assert!(matches!(err, MonitorError::ConfigurationFailed(_)));
    }
}
