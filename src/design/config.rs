use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::sequence::CompositionFilter;
use crate::core::types::{
    RegionMask, DEFAULT_GUIDE_LENGTH, DEFAULT_MIN_BRIDGE, MAX_KMER_LENGTH, SUPP_LENGTH,
};

/// Default 3' anchor length (seed prefix)
pub const DEFAULT_K3: usize = 4;

/// Default 5' anchor length (supplementary prefix)
pub const DEFAULT_K5: usize = 3;

/// Default upper bound of the bridge window
pub const DEFAULT_MAX_DISTANCE: usize = 15;

pub const DEFAULT_GC_MIN: f64 = 0.30;
pub const DEFAULT_GC_MAX: f64 = 0.64;

/// Default Watson-Crick pair count the reference oracle needs in the
/// supplementary region
pub const DEFAULT_MIN_BINDING: usize = 3;

/// Default number of candidates drawn per grip in design-only analyses
pub const DEFAULT_GENERATOR_BUDGET: usize = 4096;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Parameters of one design run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DesignConfig {
    /// Length of the 3' anchor k-mer (seed side)
    pub k3: usize,
    /// Length of the 5' anchor k-mer (supplementary side)
    pub k5: usize,
    pub min_bridge: usize,
    /// Largest accepted bridge, before and after folding
    pub max_distance: usize,
    pub guide_length: usize,
    pub gc_min: f64,
    pub gc_max: f64,
    /// Motifs no guide or anchor may contain
    pub exclusions: Vec<String>,
    /// Transcript regions anchors and windows may use
    pub region: RegionMask,
    pub min_binding: usize,
    /// Also require anchors to be absent from every excluded transcript
    pub strict_anchor_exclusion: bool,
    pub generator_budget: usize,
}

impl Default for DesignConfig {
    fn default() -> Self {
        Self {
            k3: DEFAULT_K3,
            k5: DEFAULT_K5,
            min_bridge: DEFAULT_MIN_BRIDGE,
            max_distance: DEFAULT_MAX_DISTANCE,
            guide_length: DEFAULT_GUIDE_LENGTH,
            gc_min: DEFAULT_GC_MIN,
            gc_max: DEFAULT_GC_MAX,
            exclusions: ["AAAA", "CCCC", "GGGG", "UUUU"]
                .iter()
                .map(ToString::to_string)
                .collect(),
            region: RegionMask::ALL,
            min_binding: DEFAULT_MIN_BINDING,
            strict_anchor_exclusion: false,
            generator_budget: DEFAULT_GENERATOR_BUDGET,
        }
    }
}

impl DesignConfig {
    /// Parse a JSON config; absent fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ParseError` on malformed JSON and
    /// `ConfigError::Invalid` when the values fail [`DesignConfig::validate`].
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON config from disk
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ReadError` if the file cannot be read, otherwise
    /// the errors of [`DesignConfig::from_json`].
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Check the values against each other and the guide geometry.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.k3 == 0 || self.k3 > MAX_KMER_LENGTH {
            return Err(ConfigError::Invalid(format!(
                "k3 must be between 1 and {MAX_KMER_LENGTH}, got {}",
                self.k3
            )));
        }
        if self.k5 == 0 || self.k5 > SUPP_LENGTH {
            return Err(ConfigError::Invalid(format!(
                "k5 must be between 1 and {SUPP_LENGTH}, got {}",
                self.k5
            )));
        }
        if self.min_bridge > self.max_distance {
            return Err(ConfigError::Invalid(format!(
                "min_bridge ({}) exceeds max_distance ({})",
                self.min_bridge, self.max_distance
            )));
        }
        if self.min_bridge < 3 {
            return Err(ConfigError::Invalid(format!(
                "min_bridge must leave room for the central box, got {}",
                self.min_bridge
            )));
        }
        if self.guide_length < 17 {
            return Err(ConfigError::Invalid(format!(
                "guide_length must cover the supplementary region, got {}",
                self.guide_length
            )));
        }
        if !(0.0..=1.0).contains(&self.gc_min)
            || !(0.0..=1.0).contains(&self.gc_max)
            || self.gc_min > self.gc_max
        {
            return Err(ConfigError::Invalid(format!(
                "GC bounds must satisfy 0 <= gc_min <= gc_max <= 1, got [{}, {}]",
                self.gc_min, self.gc_max
            )));
        }
        if self.region.is_empty() {
            return Err(ConfigError::Invalid("region list is empty".to_string()));
        }
        if let Some(bad) = self
            .exclusions
            .iter()
            .find(|m| m.is_empty() || !m.chars().all(|c| matches!(c, 'A' | 'C' | 'G' | 'U')))
        {
            return Err(ConfigError::Invalid(format!(
                "exclusion motif '{bad}' is not a nucleotide string"
            )));
        }
        Ok(())
    }

    /// Composition rules implied by this config
    pub fn composition(&self) -> CompositionFilter {
        CompositionFilter::new(self.exclusions.clone(), self.gc_min, self.gc_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_is_valid() {
        let config = DesignConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.min_bridge, 4);
        assert_eq!(config.guide_length, 21);
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let config = DesignConfig::from_json(r#"{"k3": 5, "region": ["utr3"]}"#).unwrap();
        assert_eq!(config.k3, 5);
        assert_eq!(config.k5, DEFAULT_K5);
        assert_eq!(config.region, RegionMask::UTR3);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let cases = [
            r#"{"k3": 8}"#,
            r#"{"k5": 6}"#,
            r#"{"min_bridge": 20, "max_distance": 10}"#,
            r#"{"gc_min": 0.7, "gc_max": 0.5}"#,
            r#"{"exclusions": ["AATT"]}"#,
            r#"{"region": []}"#,
        ];
        for json in cases {
            assert!(
                matches!(DesignConfig::from_json(json), Err(ConfigError::Invalid(_))),
                "{json} should be rejected"
            );
        }
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            DesignConfig::from_json("{not json"),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"max_distance": 12, "gc_max": 0.6}}"#).unwrap();
        let config = DesignConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.max_distance, 12);
        assert!((config.gc_max - 0.6).abs() < f64::EPSILON);

        let missing = DesignConfig::load_from_file(Path::new("/nonexistent/config.json"));
        assert!(matches!(missing, Err(ConfigError::ReadError(_))));
    }
}
