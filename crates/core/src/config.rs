//! Configuration structures for the basket-returns pipeline.

use crate::error::{Error, Result};
use crate::types::{parse_timestamp, Timestamp};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration for the pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Input dataset configuration.
    pub input: InputConfig,
    /// Chronological split configuration.
    pub split: SplitConfig,
    /// Feature computation configuration.
    pub features: FeatureConfig,
    /// Export configuration.
    pub output: OutputConfig,
}

impl Config {
    /// Parse a configuration from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Check that every section holds usable values.
    pub fn validate(&self) -> Result<()> {
        self.split.cutoff_datetime()?;

        let threshold = self.features.cheap_price_threshold;
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(Error::config(format!(
                "cheap_price_threshold must be a positive number, got {threshold}"
            )));
        }

        if !self.input.delimiter.is_ascii() {
            return Err(Error::config(format!(
                "delimiter must be a single ASCII character, got {:?}",
                self.input.delimiter
            )));
        }

        Ok(())
    }
}

/// Input dataset configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Path to the cleaned line-item CSV.
    pub path: PathBuf,
    /// Field delimiter.
    pub delimiter: char,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("outputs/online_retail_clean.csv"),
            delimiter: ',',
        }
    }
}

impl InputConfig {
    /// Delimiter as a byte, as the CSV reader expects it.
    pub fn delimiter_byte(&self) -> u8 {
        if self.delimiter.is_ascii() {
            self.delimiter as u8
        } else {
            b','
        }
    }
}

/// Chronological split configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Cutoff as an ISO date (`2011-10-01`) or datetime string.
    /// Orders at or after the cutoff go to the test set.
    pub cutoff: String,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            cutoff: "2011-10-01".to_string(),
        }
    }
}

impl SplitConfig {
    /// Parse the cutoff. A bare date means midnight.
    pub fn cutoff_datetime(&self) -> Result<Timestamp> {
        let raw = self.cutoff.trim();
        if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            return date
                .and_hms_opt(0, 0, 0)
                .ok_or_else(|| Error::config(format!("invalid cutoff date: {raw}")));
        }
        parse_timestamp(raw).ok_or_else(|| {
            Error::config(format!(
                "cutoff must be an ISO date or datetime, got {:?}",
                self.cutoff
            ))
        })
    }
}

/// Feature computation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Items priced strictly below this count towards CheapItemShare.
    pub cheap_price_threshold: f64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            cheap_price_threshold: 1.0,
        }
    }
}

/// Export configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory receiving the exported CSV files.
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("outputs"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.split.cutoff, "2011-10-01");
        assert_eq!(config.features.cheap_price_threshold, 1.0);
        assert_eq!(config.input.delimiter_byte(), b',');
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cutoff_date_is_midnight() {
        let cutoff = SplitConfig::default().cutoff_datetime().unwrap();
        assert_eq!((cutoff.year(), cutoff.month(), cutoff.day()), (2011, 10, 1));
        assert_eq!((cutoff.hour(), cutoff.minute()), (0, 0));
    }

    #[test]
    fn test_cutoff_datetime() {
        let split = SplitConfig {
            cutoff: "2011-10-01T12:30:00".to_string(),
        };
        let cutoff = split.cutoff_datetime().unwrap();
        assert_eq!((cutoff.hour(), cutoff.minute()), (12, 30));
    }

    #[test]
    fn test_invalid_cutoff() {
        let split = SplitConfig {
            cutoff: "first of october".to_string(),
        };
        assert!(matches!(split.cutoff_datetime(), Err(Error::Config(_))));
    }

    #[test]
    fn test_from_json_partial() {
        let config = Config::from_json_str(r#"{"split": {"cutoff": "2011-06-01"}}"#).unwrap();
        assert_eq!(config.split.cutoff, "2011-06-01");
        assert_eq!(config.features.cheap_price_threshold, 1.0);
    }

    #[test]
    fn test_rejects_bad_threshold() {
        let result = Config::from_json_str(r#"{"features": {"cheap_price_threshold": 0.0}}"#);
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
