//! Engine configuration
//!
//! Every section has defaults, so a TOML file only needs the values it
//! overrides:
//!
//! ```toml
//! [scoring]
//! weight_bm25 = 0.5
//! weight_pmi = 0.2
//! weight_decay = 0.3
//!
//! [promotion]
//! threshold = 0.4
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MotifError, Result};

/// Allowed slack when checking that weights sum to 1
const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

const BM25_K1_RANGE: std::ops::RangeInclusive<f64> = 1.2..=2.0;
const BM25_B_RANGE: std::ops::RangeInclusive<f64> = 0.0..=1.0;

/// Minimum SM-2 easiness factor
pub const MIN_EASINESS_FACTOR: f64 = 1.3;

/// Top-level engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub scoring: ScoringConfig,
    pub retention: RetentionConfig,
    pub review: ReviewConfig,
    pub similarity: SimilarityConfig,
    pub promotion: PromotionConfig,
    pub store: StoreConfig,
}

/// BM25 parameters and composite weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Term frequency saturation
    pub bm25_k1: f64,
    /// Length normalization
    pub bm25_b: f64,
    pub weight_bm25: f64,
    pub weight_pmi: f64,
    pub weight_decay: f64,
    /// Multiplier applied to the composite of stopwords
    pub stopword_penalty: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            bm25_k1: 1.5,
            bm25_b: 0.75,
            weight_bm25: 0.4,
            weight_pmi: 0.3,
            weight_decay: 0.3,
            stopword_penalty: 0.5,
        }
    }
}

/// Ebbinghaus memory strength: `s = base_strength + growth_factor * count`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    pub base_strength: f64,
    pub growth_factor: f64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            base_strength: 1.0,
            growth_factor: 0.5,
        }
    }
}

/// SM-2 scheduling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// Easiness factor of a pattern entering review
    pub initial_easiness: f64,
    /// Horizon for the "due soon" bucket of the review summary
    pub due_soon_days: i64,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            initial_easiness: 2.5,
            due_soon_days: 7,
        }
    }
}

/// Near-duplicate detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityConfig {
    /// Maximum Levenshtein distance for a merge candidate
    pub max_distance: usize,
    /// Patterns below this count are not considered for merging
    pub min_count: u64,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            max_distance: 2,
            min_count: 1,
        }
    }
}

/// Promotion candidate selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromotionConfig {
    /// Composite must be strictly greater than this
    pub threshold: f64,
    pub max_candidates: usize,
    /// Minimum observed count (1 = no extra filter)
    pub min_count: u64,
    /// Minimum Beta posterior mean (0 = no extra filter)
    pub min_confidence: f64,
}

impl Default for PromotionConfig {
    fn default() -> Self {
        Self {
            threshold: 0.3,
            max_candidates: 20,
            min_count: 1,
            min_confidence: 0.0,
        }
    }
}

/// Persistence knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Cap on context snippets kept per pattern
    pub max_contexts: usize,
    /// Snippets longer than this (in chars) are truncated
    pub context_chars: usize,
    /// Number of pre-merge backups retained
    pub backup_keep: usize,
    /// Texts flagged as stopwords when first seen
    pub stopwords: Vec<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_contexts: 10,
            context_chars: 160,
            backup_keep: 5,
            stopwords: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: EngineConfig =
            toml::from_str(s).map_err(|e| MotifError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            MotifError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Check ranges and that composite weights sum to 1
    pub fn validate(&self) -> Result<()> {
        let s = &self.scoring;

        if !BM25_K1_RANGE.contains(&s.bm25_k1) {
            return Err(MotifError::Config(format!(
                "bm25_k1 out of range: {}",
                s.bm25_k1
            )));
        }
        if !BM25_B_RANGE.contains(&s.bm25_b) {
            return Err(MotifError::Config(format!(
                "bm25_b out of range: {}",
                s.bm25_b
            )));
        }

        let weights = [s.weight_bm25, s.weight_pmi, s.weight_decay];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(MotifError::Config(format!(
                "weights must be non-negative: {:?}",
                weights
            )));
        }
        let total: f64 = weights.iter().sum();
        if (total - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(MotifError::Config(format!(
                "weight sum must be ~1.0, got {}",
                total
            )));
        }
        if !(0.0..=1.0).contains(&s.stopword_penalty) {
            return Err(MotifError::Config(format!(
                "stopword_penalty must be within [0, 1], got {}",
                s.stopword_penalty
            )));
        }

        if self.retention.base_strength <= 0.0 || self.retention.growth_factor < 0.0 {
            return Err(MotifError::Config(
                "retention needs base_strength > 0 and growth_factor >= 0".to_string(),
            ));
        }

        if self.review.initial_easiness < MIN_EASINESS_FACTOR {
            return Err(MotifError::Config(format!(
                "initial_easiness must be >= {}",
                MIN_EASINESS_FACTOR
            )));
        }

        if !(0.0..=1.0).contains(&self.promotion.threshold)
            || !(0.0..=1.0).contains(&self.promotion.min_confidence)
        {
            return Err(MotifError::Config(
                "promotion threshold and min_confidence must be within [0, 1]".to_string(),
            ));
        }

        if self.store.max_contexts == 0 {
            return Err(MotifError::Config("max_contexts must be > 0".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.promotion.max_candidates, 20);
        assert_eq!(config.similarity.max_distance, 2);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            [promotion]
            threshold = 0.45

            [store]
            stopwords = ["the", "and"]
            "#,
        )
        .unwrap();

        assert_eq!(config.promotion.threshold, 0.45);
        assert_eq!(config.promotion.max_candidates, 20);
        assert_eq!(config.scoring.bm25_k1, 1.5);
        assert_eq!(config.store.stopwords, vec!["the", "and"]);
    }

    #[test]
    fn test_rejects_bad_weight_sum() {
        let err = EngineConfig::from_toml_str(
            r#"
            [scoring]
            weight_bm25 = 0.6
            weight_pmi = 0.3
            weight_decay = 0.3
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, MotifError::Config(_)));
    }

    #[test]
    fn test_rejects_out_of_range_bm25() {
        let mut config = EngineConfig::default();
        config.scoring.bm25_k1 = 3.0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.scoring.bm25_b = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_low_initial_easiness() {
        let mut config = EngineConfig::default();
        config.review.initial_easiness = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let err = EngineConfig::from_toml_str("[scoring\nbm25_k1 = ").unwrap_err();
        assert_eq!(err.code(), -32011);
    }
}
