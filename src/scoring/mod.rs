//! Scoring engine
//!
//! Implements:
//! - BM25 with each batch as a document
//! - Mean PMI over co-occurrence edges
//! - Ebbinghaus retention
//! - Normalized Shannon entropy
//! - Weighted composite over min-max normalized components
//!
//! Scores are derived state: `recompute_all` overwrites every score field
//! from counts, edges and batches, never patching incrementally.

mod bm25;
mod composite;
mod entropy;
mod pmi;
mod retention;

pub use bm25::*;
pub use composite::*;
pub use entropy::*;
pub use pmi::*;
pub use retention::*;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::storage::StoreDocument;
use crate::types::{round_score, PatternScores};

/// Outcome of a full recompute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub as_of: NaiveDate,
    pub patterns_scored: usize,
    pub total_batches: usize,
    pub total_tokens: u64,
    /// Highest composite after the recompute
    pub max_composite: f64,
}

/// Recompute every score field of every pattern
pub fn recompute_all(doc: &mut StoreDocument, config: &EngineConfig, as_of: NaiveDate) -> ScoreReport {
    let params = Bm25Params {
        k1: config.scoring.bm25_k1,
        b: config.scoring.bm25_b,
    };
    let total_batches = doc.batches.len();
    let total_tokens = doc.total_tokens();

    let bm25 = bm25_scores(&doc.batches, params);
    let pmi = mean_pmi(&doc.patterns, &doc.cooccurrences, total_tokens);

    let raw_bm25 = |text: &str| bm25.get(text).copied().unwrap_or(0.0);
    let raw_pmi = |text: &str| pmi.get(text).copied().unwrap_or(0.0);

    let bm25_range = MinMax::from_values(doc.patterns.keys().map(|t| raw_bm25(t.as_str())));
    let pmi_range = MinMax::from_values(doc.patterns.keys().map(|t| raw_pmi(t.as_str())));

    let mut scored: Vec<(String, PatternScores)> = Vec::with_capacity(doc.patterns.len());
    for (text, pattern) in &doc.patterns {
        let b = raw_bm25(text.as_str());
        let p = raw_pmi(text.as_str());
        let r = retention(pattern.count, pattern.last_seen, as_of, &config.retention);

        let inputs = CompositeInputs {
            bm25_norm: bm25_range.map(|m| m.normalize(b)).unwrap_or(0.0),
            pmi_norm: pmi_range.map(|m| m.normalize(p)).unwrap_or(0.0),
            retention: r,
            is_stopword: pattern.is_stopword,
            promoted: pattern.promoted,
        };

        scored.push((
            text.clone(),
            PatternScores {
                bm25: round_score(b),
                pmi: round_score(p),
                ebbinghaus_retention: r,
                shannon_entropy: round_score(normalized_entropy(pattern, &doc.batches, total_batches)),
                composite: round_score(composite_score(inputs, &config.scoring)),
            },
        ));
    }

    let mut max_composite = 0.0f64;
    for (text, scores) in scored {
        max_composite = max_composite.max(scores.composite);
        if let Some(pattern) = doc.patterns.get_mut(&text) {
            pattern.scores = scores;
        }
    }

    ScoreReport {
        as_of,
        patterns_scored: doc.patterns.len(),
        total_batches,
        total_tokens,
        max_composite,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::tokenize::tokenize_batch;
    use crate::tracker::{record_batch, BatchObservation};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, d).unwrap()
    }

    fn ingest(doc: &mut StoreDocument, id: &str, date: NaiveDate, text: &str) {
        let tokenized = tokenize_batch(text, 160);
        record_batch(
            doc,
            BatchObservation {
                batch_id: id,
                date,
                tokens: &tokenized.tokens,
                contexts: &tokenized.contexts,
            },
            &StoreConfig::default(),
        );
    }

    fn sample_doc() -> StoreDocument {
        let mut doc = StoreDocument::new();
        ingest(&mut doc, "2026-01-01", day(1), "deploy staging deploy staging");
        ingest(&mut doc, "2026-01-02", day(2), "deploy staging rollback");
        ingest(&mut doc, "2026-01-03", day(3), "rollback hotfix review");
        doc
    }

    #[test]
    fn test_empty_store() {
        let mut doc = StoreDocument::new();
        let report = recompute_all(&mut doc, &EngineConfig::default(), day(1));
        assert_eq!(report.patterns_scored, 0);
        assert_eq!(report.max_composite, 0.0);
    }

    #[test]
    fn test_scores_within_bounds() {
        let mut doc = sample_doc();
        recompute_all(&mut doc, &EngineConfig::default(), day(10));

        for pattern in doc.patterns.values() {
            let s = pattern.scores;
            assert!((0.0..=1.0).contains(&s.composite), "{}: {:?}", pattern.text, s);
            assert!((0.0..=1.0).contains(&s.shannon_entropy), "{}: {:?}", pattern.text, s);
            assert!(s.ebbinghaus_retention > 0.0 && s.ebbinghaus_retention <= 1.0);
        }
    }

    #[test]
    fn test_recompute_is_deterministic() {
        let mut a = sample_doc();
        let mut b = sample_doc();
        recompute_all(&mut a, &EngineConfig::default(), day(5));
        recompute_all(&mut b, &EngineConfig::default(), day(5));
        recompute_all(&mut b, &EngineConfig::default(), day(5));
        assert_eq!(a.patterns, b.patterns);
    }

    #[test]
    fn test_promoted_and_stopword() {
        let mut doc = sample_doc();
        doc.patterns.get_mut("deploy").unwrap().promoted = true;
        recompute_all(&mut doc, &EngineConfig::default(), day(3));
        let plain = doc.patterns["staging"].scores.composite;

        doc.patterns.get_mut("staging").unwrap().is_stopword = true;
        recompute_all(&mut doc, &EngineConfig::default(), day(3));

        assert_eq!(doc.patterns["deploy"].scores.composite, 0.0);
        assert!((doc.patterns["staging"].scores.composite - round_score(plain * 0.5)).abs() < 2e-6);
    }

    #[test]
    fn test_single_pattern_store() {
        let mut doc = StoreDocument::new();
        ingest(&mut doc, "b1", day(1), "deploy");
        recompute_all(&mut doc, &EngineConfig::default(), day(1));

        let s = doc.patterns["deploy"].scores;
        assert_eq!(s.pmi, 0.0);
        assert_eq!(s.shannon_entropy, 0.0);
        // only retention contributes: 0.3 * 1.0
        assert!((s.composite - 0.3).abs() < 1e-12);
    }
}
