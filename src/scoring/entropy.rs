//! Normalized Shannon entropy of a pattern's spread across batches

use std::collections::BTreeMap;

use crate::types::{BatchRecord, Pattern};

/// `H = -Σ p log2 p` over positive weights
pub fn shannon_entropy(weights: &[f64]) -> f64 {
    let total: f64 = weights.iter().filter(|w| **w > 0.0).sum();
    if total <= 0.0 {
        return 0.0;
    }
    weights
        .iter()
        .filter(|w| **w > 0.0)
        .map(|w| {
            let p = w / total;
            -p * p.log2()
        })
        .sum()
}

/// Entropy divided by `log2(total_batches)`, clamped to [0, 1].
///
/// Uses per-batch occurrence counts when the batch index has them and
/// falls back to a uniform spread over `sessions` otherwise.
pub fn normalized_entropy(
    pattern: &Pattern,
    batches: &BTreeMap<String, BatchRecord>,
    total_batches: usize,
) -> f64 {
    if total_batches <= 1 {
        return 0.0;
    }

    let mut weights: Vec<f64> = pattern
        .sessions
        .iter()
        .filter_map(|id| batches.get(id))
        .filter_map(|batch| batch.terms.get(&pattern.text))
        .map(|&n| n as f64)
        .collect();
    if weights.is_empty() {
        weights = vec![1.0; pattern.sessions.len()];
    }

    let max = (total_batches as f64).log2();
    (shannon_entropy(&weights) / max).clamp(0.0, 1.0)
}
