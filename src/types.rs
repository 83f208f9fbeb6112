//! Core types for Motif

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::confidence::BayesianState;
use crate::review::Sm2State;

/// Number of decimal digits kept for every persisted score
pub const SCORE_PRECISION: i32 = 6;

/// Round a score to the persisted precision
pub fn round_score(value: f64) -> f64 {
    let factor = 10f64.powi(SCORE_PRECISION);
    (value * factor).round() / factor
}

/// A recurring term tracked by the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    /// Normalized (lower-cased) text, unique within the store
    pub text: String,
    /// Total observed occurrences
    pub count: u64,
    /// Batch identifiers the pattern occurred in
    #[serde(default)]
    pub sessions: BTreeSet<String>,
    /// Surrounding snippets, most recent first
    #[serde(default)]
    pub contexts: Vec<String>,
    /// Most recent batch date the pattern occurred in
    pub last_seen: NaiveDate,
    /// Externally classified stopword; penalized in composite scoring
    #[serde(default)]
    pub is_stopword: bool,
    /// Derived scores, recomputed wholesale
    #[serde(flatten)]
    pub scores: PatternScores,
    /// Beta posterior over the pattern's usefulness
    #[serde(default)]
    pub bayesian_state: BayesianState,
    /// Spaced-repetition state, present once the pattern enters review
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sm2_state: Option<Sm2State>,
    /// Promoted patterns stay tracked but never become candidates again
    #[serde(default)]
    pub promoted: bool,
    /// Where the pattern was promoted to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion: Option<Promotion>,
    /// Texts of patterns absorbed into this one
    #[serde(default)]
    pub merged_from: Vec<String>,
}

impl Pattern {
    /// Create an unseen pattern; the tracker increments `count` right after
    pub fn new(text: impl Into<String>, first_seen: NaiveDate) -> Self {
        Self {
            text: text.into(),
            count: 0,
            sessions: BTreeSet::new(),
            contexts: Vec::new(),
            last_seen: first_seen,
            is_stopword: false,
            scores: PatternScores::default(),
            bayesian_state: BayesianState::default(),
            sm2_state: None,
            promoted: false,
            promotion: None,
            merged_from: Vec::new(),
        }
    }

    /// Push a snippet to the front, dropping duplicates and anything past `cap`
    pub fn push_context(&mut self, snippet: &str, cap: usize) {
        if snippet.is_empty() {
            return;
        }
        self.contexts.retain(|c| c != snippet);
        self.contexts.insert(0, snippet.to_string());
        self.contexts.truncate(cap);
    }
}

/// Derived score fields of a pattern
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternScores {
    /// BM25 relevance summed over batches (unbounded, may be negative)
    pub bm25: f64,
    /// Mean PMI over co-occurrence edges (0 without partners)
    pub pmi: f64,
    /// Ebbinghaus retention in (0, 1]
    pub ebbinghaus_retention: f64,
    /// Normalized Shannon entropy in [0, 1]
    pub shannon_entropy: f64,
    /// Weighted composite in [0, 1]
    pub composite: f64,
}

/// Kind of reusable artifact a pattern was promoted into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Skill,
    Agent,
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactKind::Skill => write!(f, "skill"),
            ArtifactKind::Agent => write!(f, "agent"),
        }
    }
}

impl std::str::FromStr for ArtifactKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "skill" => Ok(ArtifactKind::Skill),
            "agent" => Ok(ArtifactKind::Agent),
            _ => Err(format!("Unknown artifact kind: {}", s)),
        }
    }
}

/// Promotion record kept on a promoted pattern
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Promotion {
    pub kind: ArtifactKind,
    /// Caller-supplied reference to the artifact (e.g. a path)
    pub artifact_ref: String,
    pub promoted_at: NaiveDate,
}

/// Canonical unordered pair key: `a < b` always
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EdgeKey {
    a: String,
    b: String,
}

impl EdgeKey {
    /// Build the canonical key; `None` for a self-pair
    pub fn new(x: &str, y: &str) -> Option<Self> {
        match x.cmp(y) {
            std::cmp::Ordering::Less => Some(Self {
                a: x.to_string(),
                b: y.to_string(),
            }),
            std::cmp::Ordering::Greater => Some(Self {
                a: y.to_string(),
                b: x.to_string(),
            }),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn a(&self) -> &str {
        &self.a
    }

    pub fn b(&self) -> &str {
        &self.b
    }

    pub fn contains(&self, text: &str) -> bool {
        self.a == text || self.b == text
    }

    /// The other endpoint, if `text` is one of them
    pub fn partner(&self, text: &str) -> Option<&str> {
        if self.a == text {
            Some(&self.b)
        } else if self.b == text {
            Some(&self.a)
        } else {
            None
        }
    }
}

/// Persisted form of a co-occurrence edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CooccurrenceEdge {
    pub pattern_a: String,
    pub pattern_b: String,
    pub count: u64,
}

/// One ingested batch, the "document" unit for BM25 and entropy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRecord {
    pub date: NaiveDate,
    /// Total tokens recorded for this batch
    pub length: u64,
    /// Per-pattern occurrence counts within the batch
    #[serde(default)]
    pub terms: BTreeMap<String, u64>,
}

impl BatchRecord {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            length: 0,
            terms: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, d).unwrap()
    }

    #[test]
    fn test_round_score() {
        assert_eq!(round_score(0.123_456_789), 0.123_457);
        assert_eq!(round_score(-1.000_000_4), -1.0);
    }

    #[test]
    fn test_edge_key_is_canonical() {
        let k1 = EdgeKey::new("staging", "deploy").unwrap();
        let k2 = EdgeKey::new("deploy", "staging").unwrap();
        assert_eq!(k1, k2);
        assert_eq!(k1.a(), "deploy");
        assert_eq!(k1.partner("deploy"), Some("staging"));
        assert!(EdgeKey::new("deploy", "deploy").is_none());
    }

    #[test]
    fn test_push_context_caps_and_dedupes() {
        let mut p = Pattern::new("deploy", day(1));
        for i in 0..12 {
            p.push_context(&format!("line {}", i), 10);
        }
        assert_eq!(p.contexts.len(), 10);
        assert_eq!(p.contexts[0], "line 11");

        p.push_context("line 5", 10);
        assert_eq!(p.contexts[0], "line 5");
        assert_eq!(p.contexts.iter().filter(|c| *c == "line 5").count(), 1);
    }

    #[test]
    fn test_artifact_kind_parse() {
        assert_eq!("Skill".parse::<ArtifactKind>(), Ok(ArtifactKind::Skill));
        assert_eq!("agent".parse::<ArtifactKind>(), Ok(ArtifactKind::Agent));
        assert!("macro".parse::<ArtifactKind>().is_err());
    }

    #[test]
    fn test_pattern_serializes_flat_scores() {
        let p = Pattern::new("deploy", day(1));
        let json = serde_json::to_value(&p).unwrap();
        assert!(json.get("composite").is_some());
        assert!(json.get("ebbinghaus_retention").is_some());
        assert!(json.get("sm2_state").is_none());
    }
}
