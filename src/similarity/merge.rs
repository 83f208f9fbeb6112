//! Near-duplicate detection and merging

use std::cmp::Ordering;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::bktree::BkTree;
use super::levenshtein::levenshtein_within;
use crate::storage::StoreDocument;
use crate::types::{EdgeKey, Pattern};

/// A pair of patterns close enough to merge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeCandidate {
    /// Lexicographically smaller text
    pub pattern_a: String,
    pub pattern_b: String,
    pub distance: usize,
    /// Which of the two would survive a merge right now
    pub survivor: String,
    pub combined_count: u64,
}

/// Unordered pair to merge; the survivor is decided when applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergePair {
    pub pattern_a: String,
    pub pattern_b: String,
}

impl MergePair {
    pub fn new(a: impl Into<String>, b: impl Into<String>) -> Self {
        Self {
            pattern_a: a.into(),
            pattern_b: b.into(),
        }
    }
}

impl From<&MergeCandidate> for MergePair {
    fn from(candidate: &MergeCandidate) -> Self {
        MergePair::new(candidate.pattern_a.clone(), candidate.pattern_b.clone())
    }
}

impl From<MergeCandidate> for MergePair {
    fn from(candidate: MergeCandidate) -> Self {
        MergePair::new(candidate.pattern_a, candidate.pattern_b)
    }
}

/// One applied merge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeOutcome {
    pub kept: String,
    pub absorbed: String,
    /// Survivor's count after the merge
    pub count: u64,
}

/// A pair that was not merged, and why
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedMerge {
    pub pattern_a: String,
    pub pattern_b: String,
    pub reason: String,
}

/// Result of `apply_merges`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReport {
    pub merged: Vec<MergeOutcome>,
    pub skipped: Vec<SkippedMerge>,
    /// Copy of the store taken before anything changed
    pub backup: Option<PathBuf>,
    pub patterns_remaining: usize,
}

/// Survivor rule: higher count wins, ties go to the smaller text
pub fn survivor<'a>(a: &'a Pattern, b: &'a Pattern) -> (&'a Pattern, &'a Pattern) {
    match a.count.cmp(&b.count) {
        Ordering::Greater => (a, b),
        Ordering::Less => (b, a),
        Ordering::Equal if a.text <= b.text => (a, b),
        Ordering::Equal => (b, a),
    }
}

/// Pairs within `max_distance` among patterns with `count >= min_count`,
/// largest combined count first
pub fn find_candidates(doc: &StoreDocument, max_distance: usize, min_count: u64) -> Vec<MergeCandidate> {
    let tree: BkTree = doc
        .patterns
        .values()
        .filter(|p| p.count >= min_count)
        .map(|p| p.text.as_str())
        .collect();

    let mut candidates: Vec<MergeCandidate> = tree
        .pairs_within(max_distance)
        .into_iter()
        .filter_map(|(a, b, distance)| {
            let pa = doc.patterns.get(a)?;
            let pb = doc.patterns.get(b)?;
            let (keep, _) = survivor(pa, pb);
            Some(MergeCandidate {
                pattern_a: a.to_string(),
                pattern_b: b.to_string(),
                distance,
                survivor: keep.text.clone(),
                combined_count: pa.count + pb.count,
            })
        })
        .collect();

    candidates.sort_by(|x, y| {
        y.combined_count
            .cmp(&x.combined_count)
            .then_with(|| x.distance.cmp(&y.distance))
            .then_with(|| x.pattern_a.cmp(&y.pattern_a))
            .then_with(|| x.pattern_b.cmp(&y.pattern_b))
    });
    candidates
}

/// Apply pairs in order. Pairs naming a pattern that no longer exists
/// (including one absorbed earlier in the same call) are skipped, which
/// makes replaying a merge a no-op. So are pairs further apart than
/// `max_distance` edits.
pub fn apply_pairs(
    doc: &mut StoreDocument,
    pairs: &[MergePair],
    max_distance: usize,
    max_contexts: usize,
) -> MergeReport {
    let mut report = MergeReport::default();

    for pair in pairs {
        let skip = |reason: &str| SkippedMerge {
            pattern_a: pair.pattern_a.clone(),
            pattern_b: pair.pattern_b.clone(),
            reason: reason.to_string(),
        };

        if pair.pattern_a == pair.pattern_b {
            report.skipped.push(skip("identical patterns"));
            continue;
        }
        if levenshtein_within(&pair.pattern_a, &pair.pattern_b, max_distance).is_none() {
            debug!(
                pattern_a = %pair.pattern_a,
                pattern_b = %pair.pattern_b,
                max_distance,
                "Merge skipped, pair too far apart"
            );
            report.skipped.push(skip("distance exceeds threshold"));
            continue;
        }

        let (keep, absorb) = match (doc.patterns.get(&pair.pattern_a), doc.patterns.get(&pair.pattern_b)) {
            (Some(a), Some(b)) => {
                let (k, l) = survivor(a, b);
                (k.text.clone(), l.text.clone())
            }
            (None, _) => {
                debug!(pattern = %pair.pattern_a, "Merge skipped, pattern absent");
                report.skipped.push(skip(&format!("pattern '{}' not found", pair.pattern_a)));
                continue;
            }
            (_, None) => {
                debug!(pattern = %pair.pattern_b, "Merge skipped, pattern absent");
                report.skipped.push(skip(&format!("pattern '{}' not found", pair.pattern_b)));
                continue;
            }
        };

        if let Some(count) = merge_into(doc, &keep, &absorb, max_contexts) {
            debug!(kept = %keep, absorbed = %absorb, count, "Merged patterns");
            report.merged.push(MergeOutcome {
                kept: keep,
                absorbed: absorb,
                count,
            });
        }
    }

    report.patterns_remaining = doc.patterns.len();
    report
}

/// Fold `absorb` into `keep`, re-keying its edges and batch terms.
///
/// Returns the survivor's new count, or `None` if either is missing.
pub fn merge_into(doc: &mut StoreDocument, keep: &str, absorb: &str, max_contexts: usize) -> Option<u64> {
    if keep == absorb || !doc.patterns.contains_key(keep) {
        return None;
    }
    let loser = doc.patterns.remove(absorb)?;
    let winner = doc.patterns.get_mut(keep)?;

    winner.count += loser.count;
    winner.sessions.extend(loser.sessions.iter().cloned());
    for context in &loser.contexts {
        if !winner.contexts.contains(context) {
            winner.contexts.push(context.clone());
        }
    }
    winner.contexts.truncate(max_contexts);
    winner.last_seen = winner.last_seen.max(loser.last_seen);

    for text in std::iter::once(&loser.text).chain(loser.merged_from.iter()) {
        if text != &winner.text && !winner.merged_from.contains(text) {
            winner.merged_from.push(text.clone());
        }
    }

    winner.bayesian_state = winner.bayesian_state.merged(&loser.bayesian_state);
    if winner.sm2_state.is_none() {
        winner.sm2_state = loser.sm2_state.clone();
    }
    if loser.promoted && !winner.promoted {
        winner.promoted = true;
        winner.promotion = loser.promotion.clone();
    }
    let count = winner.count;

    rekey_edges(doc, keep, absorb);

    for batch in doc.batches.values_mut() {
        if let Some(n) = batch.terms.remove(absorb) {
            *batch.terms.entry(keep.to_string()).or_insert(0) += n;
        }
    }

    doc.promotion_candidates.retain(|t| t != absorb);
    Some(count)
}

/// Move every edge of `absorb` onto `keep`, summing duplicates and
/// dropping the edge between the two
fn rekey_edges(doc: &mut StoreDocument, keep: &str, absorb: &str) {
    let touching: Vec<EdgeKey> = doc
        .cooccurrences
        .keys()
        .filter(|k| k.contains(absorb))
        .cloned()
        .collect();

    for key in touching {
        let Some(count) = doc.cooccurrences.remove(&key) else {
            continue;
        };
        let Some(partner) = key.partner(absorb) else {
            continue;
        };
        if let Some(new_key) = EdgeKey::new(keep, partner) {
            *doc.cooccurrences.entry(new_key).or_insert(0) += count;
        }
    }
}
