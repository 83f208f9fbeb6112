//! BM25 relevance with each batch as a document
//!
//! `IDF(t) = ln(N / (df(t) + 1))` goes negative for terms present in most
//! batches. The raw value is kept; composite scoring min-max normalizes it.

use std::collections::{BTreeMap, HashMap};

use crate::types::BatchRecord;

/// BM25 tuning parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75 }
    }
}

/// IDF with the +1 smoothing in the denominator; 0 for an empty corpus
pub fn idf(total_batches: usize, document_frequency: usize) -> f64 {
    if total_batches == 0 {
        return 0.0;
    }
    (total_batches as f64 / (document_frequency as f64 + 1.0)).ln()
}

/// Saturated term frequency for one document
pub fn term_weight(tf: f64, doc_len: f64, avg_doc_len: f64, params: Bm25Params) -> f64 {
    let length_ratio = if avg_doc_len > 0.0 {
        doc_len / avg_doc_len
    } else {
        1.0
    };
    let denom = tf + params.k1 * (1.0 - params.b + params.b * length_ratio);
    if denom <= 0.0 {
        return 0.0;
    }
    tf * (params.k1 + 1.0) / denom
}

/// BM25 of every term in the corpus, summed over the batches containing it
pub fn bm25_scores(batches: &BTreeMap<String, BatchRecord>, params: Bm25Params) -> HashMap<String, f64> {
    let total_batches = batches.len();
    let mut scores = HashMap::new();
    if total_batches == 0 {
        return scores;
    }

    let total_len: u64 = batches.values().map(|b| b.length).sum();
    let avg_doc_len = total_len as f64 / total_batches as f64;

    let mut document_frequency: HashMap<&str, usize> = HashMap::new();
    for batch in batches.values() {
        for (term, &tf) in &batch.terms {
            if tf > 0 {
                *document_frequency.entry(term.as_str()).or_insert(0) += 1;
            }
        }
    }

    for batch in batches.values() {
        for (term, &tf) in &batch.terms {
            if tf == 0 {
                continue;
            }
            let df = document_frequency.get(term.as_str()).copied().unwrap_or(0);
            let weight = term_weight(tf as f64, batch.length as f64, avg_doc_len, params);
            *scores.entry(term.clone()).or_insert(0.0) += idf(total_batches, df) * weight;
        }
    }

    scores
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn batch(terms: &[(&str, u64)]) -> BatchRecord {
        let mut record = BatchRecord::new(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
        for (t, n) in terms {
            record.terms.insert(t.to_string(), *n);
            record.length += n;
        }
        record
    }

    #[test]
    fn test_idf_edge_cases() {
        assert_eq!(idf(0, 0), 0.0);
        assert!((idf(4, 1) - 2f64.ln()).abs() < 1e-12);
        // present in every batch: ln(N / (N + 1)) < 0
        assert!(idf(3, 3) < 0.0);
    }

    #[test]
    fn test_empty_corpus() {
        assert!(bm25_scores(&BTreeMap::new(), Bm25Params::default()).is_empty());
    }

    #[test]
    fn test_rare_term_beats_common_term() {
        let mut batches = BTreeMap::new();
        batches.insert("b1".to_string(), batch(&[("deploy", 1), ("rare", 1)]));
        batches.insert("b2".to_string(), batch(&[("deploy", 1), ("other", 1)]));
        batches.insert("b3".to_string(), batch(&[("deploy", 1), ("misc", 1)]));
        batches.insert("b4".to_string(), batch(&[("deploy", 1), ("misc", 1)]));

        let scores = bm25_scores(&batches, Bm25Params::default());
        assert!(scores["rare"] > scores["deploy"]);
        assert!(scores["rare"] > 0.0);
    }

    #[test]
    fn test_single_document_weight() {
        // tf=2, |d| = avgdl: 2 * 2.5 / (2 + 1.5) = 10/7
        let weight = term_weight(2.0, 4.0, 4.0, Bm25Params::default());
        assert!((weight - 10.0 / 7.0).abs() < 1e-12);
    }
}
