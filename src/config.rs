//! Engine constants and consumer runtime configuration.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

/// Keys the engine constants map must provide.
pub const KEY_QUANTIZE_NBUCKETS: &str = "QUANTIZE_NBUCKETS";
pub const KEY_QUANTIZE_ZEROBUCKET: &str = "QUANTIZE_ZEROBUCKET";
pub const KEY_INT64_MIN: &str = "INT64_MIN";
pub const KEY_INT64_MAX: &str = "INT64_MAX";

/// Validated engine constants governing aggregation bucket layout.
///
/// Built once per consumer from the constants map the engine reports, before
/// any record is translated. The zero bucket sits in the middle of the
/// power-of-two table, so a well-formed table always has
/// `2 * zerobucket + 1` entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Total number of power-of-two quantize buckets.
    pub quantize_nbuckets: u32,

    /// Index of the bucket that holds exactly zero.
    pub quantize_zerobucket: u32,

    /// Smallest value the engine can record.
    pub int64_min: i64,

    /// Largest value the engine can record.
    pub int64_max: i64,
}

impl EngineConfig {
    /// Builds a validated config from the constants map reported by the engine.
    pub fn from_constants(constants: &HashMap<String, i64>) -> Result<Self> {
        let fetch = |key: &str| -> Result<i64> {
            constants
                .get(key)
                .copied()
                .with_context(|| format!("engine constants are missing {key}"))
        };
        let config = Self {
            quantize_nbuckets: u32::try_from(fetch(KEY_QUANTIZE_NBUCKETS)?)
                .context("QUANTIZE_NBUCKETS does not fit an unsigned 32-bit value")?,
            quantize_zerobucket: u32::try_from(fetch(KEY_QUANTIZE_ZEROBUCKET)?)
                .context("QUANTIZE_ZEROBUCKET does not fit an unsigned 32-bit value")?,
            int64_min: fetch(KEY_INT64_MIN)?,
            int64_max: fetch(KEY_INT64_MAX)?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.quantize_zerobucket == 0 {
            bail!("QUANTIZE_ZEROBUCKET must be at least 1");
        }
        if self.quantize_zerobucket > 63 {
            bail!("QUANTIZE_ZEROBUCKET must be at most 63 for a 64-bit value domain");
        }
        if self.quantize_nbuckets != 2 * self.quantize_zerobucket + 1 {
            bail!(
                "quantize table is not symmetric: {} buckets around zero bucket {}",
                self.quantize_nbuckets,
                self.quantize_zerobucket
            );
        }
        if self.int64_min != i64::MIN {
            bail!(
                "engine INT64_MIN constant {} is not the signed 64-bit minimum",
                self.int64_min
            );
        }
        if self.int64_max != i64::MAX {
            bail!(
                "engine INT64_MAX constant {} is not the signed 64-bit maximum",
                self.int64_max
            );
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    /// The layout native engines report: 127 buckets around zero bucket 63.
    fn default() -> Self {
        Self {
            quantize_nbuckets: 127,
            quantize_zerobucket: 63,
            int64_min: i64::MIN,
            int64_max: i64::MAX,
        }
    }
}

/// Runtime settings for a consumer.
#[derive(Debug, Clone, Deserialize)]
pub struct ConsumerConfig {
    /// Engine options applied once the session is ready.
    #[serde(default)]
    pub options: Vec<EngineOption>,

    /// Interval between pump drains. Default: 1s.
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Pump ticks between throughput log lines; 0 disables. Default: 60.
    #[serde(default = "default_stats_interval")]
    pub stats_interval: u64,
}

/// A single engine option, e.g. `bufsize=8m`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EngineOption {
    /// Option name as the engine understands it.
    pub name: String,

    /// Option value; flag options take an empty string. Default: "".
    #[serde(default)]
    pub value: String,
}

impl ConsumerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            bail!("poll_interval must be greater than zero");
        }
        for option in &self.options {
            if option.name.is_empty() {
                bail!("engine option names must not be empty");
            }
        }
        Ok(())
    }
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            options: Vec::new(),
            poll_interval: default_poll_interval(),
            stats_interval: default_stats_interval(),
        }
    }
}

// --- Default value functions ---

fn default_poll_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_stats_interval() -> u64 {
    60
}

#[cfg(test)]
mod tests {
    use super::*;

    fn native_constants() -> HashMap<String, i64> {
        HashMap::from([
            (KEY_QUANTIZE_NBUCKETS.to_owned(), 127),
            (KEY_QUANTIZE_ZEROBUCKET.to_owned(), 63),
            (KEY_INT64_MIN.to_owned(), i64::MIN),
            (KEY_INT64_MAX.to_owned(), i64::MAX),
        ])
    }

    #[test]
    fn test_native_constants_accepted() {
        let config = EngineConfig::from_constants(&native_constants()).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_missing_constant_rejected() {
        let mut constants = native_constants();
        constants.remove(KEY_QUANTIZE_ZEROBUCKET);
        let err = EngineConfig::from_constants(&constants).unwrap_err();
        assert!(err.to_string().contains(KEY_QUANTIZE_ZEROBUCKET));
    }

    #[test]
    fn test_asymmetric_table_rejected() {
        let mut constants = native_constants();
        constants.insert(KEY_QUANTIZE_NBUCKETS.to_owned(), 128);
        let err = EngineConfig::from_constants(&constants).unwrap_err();
        assert!(err.to_string().contains("not symmetric"));
    }

    #[test]
    fn test_foreign_value_domain_rejected() {
        let mut constants = native_constants();
        constants.insert(KEY_INT64_MIN.to_owned(), -1);
        let err = EngineConfig::from_constants(&constants).unwrap_err();
        assert!(err.to_string().contains("INT64_MIN"));
    }

    #[test]
    fn test_oversized_zero_bucket_rejected() {
        let mut constants = native_constants();
        constants.insert(KEY_QUANTIZE_ZEROBUCKET.to_owned(), 64);
        constants.insert(KEY_QUANTIZE_NBUCKETS.to_owned(), 129);
        let err = EngineConfig::from_constants(&constants).unwrap_err();
        assert!(err.to_string().contains("at most 63"));
    }

    #[test]
    fn test_default_consumer_config_is_valid() {
        ConsumerConfig::default().validate().unwrap();
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let config = ConsumerConfig {
            poll_interval: Duration::ZERO,
            ..ConsumerConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("poll_interval"));
    }

    #[test]
    fn test_empty_option_name_rejected() {
        let config = ConsumerConfig {
            options: vec![EngineOption {
                name: String::new(),
                value: "4m".to_owned(),
            }],
            ..ConsumerConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("option names"));
    }

    #[test]
    fn test_deserializes_with_defaults() {
        let config: ConsumerConfig = serde_json::from_str("{}").unwrap();
        assert!(config.options.is_empty());
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.stats_interval, 60);
    }

    #[test]
    fn test_deserializes_humantime_interval() {
        let config: ConsumerConfig = serde_json::from_str(
            r#"{"poll_interval": "250ms", "options": [{"name": "aggsize", "value": "8m"}]}"#,
        )
        .unwrap();
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.options[0].name, "aggsize");
        config.validate().unwrap();
    }
}
