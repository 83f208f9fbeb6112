//! Persisted store document and its structural validation

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::MIN_EASINESS_FACTOR;
use crate::review::MAX_INTERVAL_DAYS;
use crate::types::{BatchRecord, EdgeKey, Pattern};

/// Current document schema version
pub const STORE_VERSION: u32 = 1;

/// Everything the engine persists, read and written as one unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreDocument {
    pub version: u32,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Pattern text -> pattern
    #[serde(default)]
    pub patterns: BTreeMap<String, Pattern>,
    /// Unordered pair -> joint batch count
    #[serde(default, with = "edge_list")]
    pub cooccurrences: BTreeMap<EdgeKey, u64>,
    /// Batch id -> per-batch term index
    #[serde(default)]
    pub batches: BTreeMap<String, BatchRecord>,
    /// Last computed promotion candidates; a cache, safe to discard
    #[serde(default)]
    pub promotion_candidates: Vec<String>,
}

impl Default for StoreDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreDocument {
    /// Empty document for a fresh store
    pub fn new() -> Self {
        Self {
            version: STORE_VERSION,
            updated_at: None,
            patterns: BTreeMap::new(),
            cooccurrences: BTreeMap::new(),
            batches: BTreeMap::new(),
            promotion_candidates: Vec::new(),
        }
    }

    /// Total tokens recorded across all batches
    pub fn total_tokens(&self) -> u64 {
        self.batches.values().map(|b| b.length).sum()
    }

    /// Joint batch count of two patterns (0 when they never co-occurred)
    pub fn cooccurrence(&self, x: &str, y: &str) -> u64 {
        EdgeKey::new(x, y)
            .and_then(|key| self.cooccurrences.get(&key).copied())
            .unwrap_or(0)
    }

    /// Check the invariants a loaded document must satisfy.
    ///
    /// Returns a description of the first violation found.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.version != STORE_VERSION {
            return Err(format!(
                "unsupported store version {} (expected {})",
                self.version, STORE_VERSION
            ));
        }

        for (key, pattern) in &self.patterns {
            if key != &pattern.text {
                return Err(format!(
                    "pattern key '{}' does not match its text '{}'",
                    key, pattern.text
                ));
            }
            if pattern.count < 1 {
                return Err(format!("pattern '{}' has count 0", key));
            }
            let bayes = &pattern.bayesian_state;
            if !(bayes.alpha >= 1.0 && bayes.beta >= 1.0) {
                return Err(format!(
                    "pattern '{}' has alpha/beta below 1 ({}, {})",
                    key, bayes.alpha, bayes.beta
                ));
            }
            if let Some(sm2) = &pattern.sm2_state {
                if !(sm2.easiness_factor >= MIN_EASINESS_FACTOR)
                    || !(1..=MAX_INTERVAL_DAYS).contains(&sm2.interval_days)
                {
                    return Err(format!(
                        "pattern '{}' has invalid SM-2 state (EF {}, interval {})",
                        key, sm2.easiness_factor, sm2.interval_days
                    ));
                }
            }
            if !pattern.promoted && pattern.promotion.is_some() {
                return Err(format!(
                    "pattern '{}' has a promotion record but is not promoted",
                    key
                ));
            }
        }

        for key in self.cooccurrences.keys() {
            for text in [key.a(), key.b()] {
                if !self.patterns.contains_key(text) {
                    return Err(format!(
                        "co-occurrence edge ({}, {}) references unknown pattern '{}'",
                        key.a(),
                        key.b(),
                        text
                    ));
                }
            }
        }

        for (batch_id, batch) in &self.batches {
            for text in batch.terms.keys() {
                if !self.patterns.contains_key(text) {
                    return Err(format!(
                        "batch '{}' references unknown pattern '{}'",
                        batch_id, text
                    ));
                }
            }
        }

        Ok(())
    }
}

/// Serialize the edge map as a list of `{pattern_a, pattern_b, count}`
mod edge_list {
    use std::collections::BTreeMap;

    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use crate::types::{CooccurrenceEdge, EdgeKey};

    pub fn serialize<S>(edges: &BTreeMap<EdgeKey, u64>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let list: Vec<CooccurrenceEdge> = edges
            .iter()
            .map(|(key, count)| CooccurrenceEdge {
                pattern_a: key.a().to_string(),
                pattern_b: key.b().to_string(),
                count: *count,
            })
            .collect();
        list.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BTreeMap<EdgeKey, u64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let list = Vec::<CooccurrenceEdge>::deserialize(deserializer)?;
        let mut edges = BTreeMap::new();

        for edge in list {
            let key = EdgeKey::new(&edge.pattern_a, &edge.pattern_b).ok_or_else(|| {
                D::Error::custom(format!("self co-occurrence edge on '{}'", edge.pattern_a))
            })?;
            if edges.insert(key, edge.count).is_some() {
                return Err(D::Error::custom(format!(
                    "duplicate co-occurrence edge ({}, {})",
                    edge.pattern_a, edge.pattern_b
                )));
            }
        }

        Ok(edges)
    }
}
