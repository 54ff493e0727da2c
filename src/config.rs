//! Segmentation settings, loaded from an optional TOML file

use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::segment::SegmentRules;

/// Largest bin count that still yields a two-character score code
pub const MAX_BINS: usize = 9;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

/// Options recognized by the pipeline
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SegmentationConfig {
    /// Recency is measured in days before this date
    pub reference_date: NaiveDate,
    /// Invoice ids containing this substring are cancellations
    pub cancellation_marker: String,
    /// Quantile bins per score axis
    pub num_bins: usize,
    pub segment_rules: SegmentRules,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            reference_date: default_reference_date(),
            cancellation_marker: "C".to_string(),
            num_bins: 5,
            segment_rules: SegmentRules::default(),
        }
    }
}

/// Two days after the last invoice in the UCI Online Retail ledger
pub fn default_reference_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2011, 12, 11).unwrap_or(NaiveDate::MIN)
}

impl SegmentationConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Check ranges and warn about score codes the rule table leaves
    /// unclassified.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(2..=MAX_BINS).contains(&self.num_bins) {
            return Err(ConfigError::InvalidValue {
                field: "num_bins".to_string(),
                message: format!("must be between 2 and {MAX_BINS}, got {}", self.num_bins),
            });
        }

        if self.cancellation_marker.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "cancellation_marker".to_string(),
                message: "must not be blank".to_string(),
            });
        }

        if self.segment_rules.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "segment_rules".to_string(),
                message: "at least one rule is required".to_string(),
            });
        }

        for (index, rule) in self.segment_rules.rules().iter().enumerate() {
            let out_of_range = rule
                .recency
                .iter()
                .chain(rule.frequency.iter())
                .find(|&&score| score == 0 || score as usize > MAX_BINS);
            if let Some(score) = out_of_range {
                return Err(ConfigError::InvalidValue {
                    field: format!("segment_rules[{index}]"),
                    message: format!("score {score} is outside 1..={MAX_BINS}"),
                });
            }
        }

        let gaps = self.segment_rules.unclassified_codes(self.num_bins as u8);
        if !gaps.is_empty() {
            let codes: Vec<String> = gaps.iter().map(ToString::to_string).collect();
            warn!(
                codes = %codes.join(","),
                "segment rules leave score codes unclassified"
            );
        }

        Ok(())
    }
}
