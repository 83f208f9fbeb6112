//! Weighted composite of the normalized component scores

use crate::config::ScoringConfig;

/// Min-max bounds of one component across the pattern set
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinMax {
    pub min: f64,
    pub max: f64,
}

impl MinMax {
    /// Bounds of the finite values; `None` when there are none
    pub fn from_values(values: impl IntoIterator<Item = f64>) -> Option<Self> {
        values
            .into_iter()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                None => Some(MinMax { min: v, max: v }),
                Some(m) => Some(MinMax {
                    min: m.min.min(v),
                    max: m.max.max(v),
                }),
            })
    }

    /// Map into [0, 1]; a degenerate range maps everything to 0
    pub fn normalize(&self, value: f64) -> f64 {
        let range = self.max - self.min;
        if !value.is_finite() || range <= f64::EPSILON {
            return 0.0;
        }
        ((value - self.min) / range).clamp(0.0, 1.0)
    }
}

/// Inputs for one pattern's composite
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositeInputs {
    pub bm25_norm: f64,
    pub pmi_norm: f64,
    pub retention: f64,
    pub is_stopword: bool,
    pub promoted: bool,
}

/// `w_bm25 * bm25 + w_pmi * pmi + w_decay * R`, penalized for stopwords,
/// 0 for promoted patterns
pub fn composite_score(inputs: CompositeInputs, config: &ScoringConfig) -> f64 {
    if inputs.promoted {
        return 0.0;
    }

    let mut score = config.weight_bm25 * inputs.bm25_norm
        + config.weight_pmi * inputs.pmi_norm
        + config.weight_decay * inputs.retention;

    if inputs.is_stopword {
        score *= config.stopword_penalty;
    }

    score.clamp(0.0, 1.0)
}
