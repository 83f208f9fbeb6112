//! Frequency and co-occurrence tracking
//!
//! Counts are cumulative per call: recording the same batch twice doubles
//! its counts while leaving session membership unchanged. Callers must not
//! replay a batch unless that is what they want.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::StoreConfig;
use crate::storage::StoreDocument;
use crate::types::{BatchRecord, EdgeKey, Pattern};

/// One tokenized batch ready to be recorded
#[derive(Debug, Clone, Copy)]
pub struct BatchObservation<'a> {
    pub batch_id: &'a str,
    pub date: NaiveDate,
    pub tokens: &'a [String],
    /// Context snippet per distinct token
    pub contexts: &'a BTreeMap<String, String>,
}

/// What a recorded batch changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub batch_id: String,
    pub date: Option<NaiveDate>,
    pub tokens: usize,
    pub distinct_tokens: usize,
    pub new_patterns: usize,
    /// Pairs whose edge count was bumped
    pub edges_touched: usize,
}

/// Fold one batch into the document
pub fn record_batch(
    doc: &mut StoreDocument,
    batch: BatchObservation<'_>,
    config: &StoreConfig,
) -> BatchSummary {
    let mut occurrences: BTreeMap<&str, u64> = BTreeMap::new();
    for token in batch.tokens {
        *occurrences.entry(token.as_str()).or_insert(0) += 1;
    }

    let stopwords: BTreeSet<&str> = config.stopwords.iter().map(String::as_str).collect();
    let mut summary = BatchSummary {
        batch_id: batch.batch_id.to_string(),
        date: Some(batch.date),
        tokens: batch.tokens.len(),
        distinct_tokens: occurrences.len(),
        ..Default::default()
    };

    for (&text, &n) in &occurrences {
        let pattern = doc.patterns.entry(text.to_string()).or_insert_with(|| {
            summary.new_patterns += 1;
            let mut p = Pattern::new(text, batch.date);
            p.is_stopword = stopwords.contains(text);
            p
        });

        pattern.count += n;
        pattern.sessions.insert(batch.batch_id.to_string());
        pattern.last_seen = pattern.last_seen.max(batch.date);
        if let Some(snippet) = batch.contexts.get(text) {
            pattern.push_context(snippet, config.max_contexts);
        }
    }

    let record = doc
        .batches
        .entry(batch.batch_id.to_string())
        .or_insert_with(|| BatchRecord::new(batch.date));
    record.date = record.date.max(batch.date);
    record.length += batch.tokens.len() as u64;
    for (&text, &n) in &occurrences {
        *record.terms.entry(text.to_string()).or_insert(0) += n;
    }

    // presence, not multiplicity: one increment per distinct pair
    let distinct: Vec<&str> = occurrences.keys().copied().collect();
    for (i, a) in distinct.iter().enumerate() {
        for b in &distinct[i + 1..] {
            if let Some(key) = EdgeKey::new(a, b) {
                *doc.cooccurrences.entry(key).or_insert(0) += 1;
                summary.edges_touched += 1;
            }
        }
    }

    summary
}
