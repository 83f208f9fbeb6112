//! Promotion of strong patterns into reusable artifacts

use std::cmp::Ordering;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::PromotionConfig;
use crate::error::{MotifError, Result};
use crate::storage::StoreDocument;
use crate::types::{ArtifactKind, Pattern, Promotion};

/// Context words that suggest an action-oriented (agent) artifact
const AGENT_KEYWORDS: &[&str] = &[
    "analyze", "generate", "validate", "check", "review", "test", "build", "deploy", "run",
    "execute", "create", "update", "delete", "fix",
];

/// Contexts sampled for a suggested description
const DESCRIPTION_CONTEXTS: usize = 3;
const DESCRIPTION_CHARS: usize = 100;

static TIMESTAMP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[\d{2}:\d{2}\]\s*").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[_\s]+").unwrap());
static NON_SLUG: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\p{L}\p{N}-]").unwrap());
static HYPHEN_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"-+").unwrap());

/// Whether a pattern passes the promotion filter
pub fn is_eligible(pattern: &Pattern, config: &PromotionConfig) -> bool {
    !pattern.promoted
        && pattern.scores.composite > config.threshold
        && pattern.count >= config.min_count
        && pattern.bayesian_state.mean() >= config.min_confidence
}

/// Eligible patterns, highest composite first, capped at `max_candidates`
pub fn select_candidates<'a, I>(patterns: I, config: &PromotionConfig) -> Vec<&'a Pattern>
where
    I: IntoIterator<Item = &'a Pattern>,
{
    let mut candidates: Vec<&Pattern> = patterns
        .into_iter()
        .filter(|p| is_eligible(p, config))
        .collect();

    candidates.sort_by(|a, b| {
        b.scores
            .composite
            .partial_cmp(&a.scores.composite)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.text.cmp(&b.text))
    });
    candidates.truncate(config.max_candidates);
    candidates
}

/// Flag a pattern as promoted.
///
/// Returns `false` when it was already promoted; the first record is kept.
pub fn mark_promoted(
    doc: &mut StoreDocument,
    text: &str,
    kind: ArtifactKind,
    artifact_ref: &str,
    today: NaiveDate,
) -> Result<bool> {
    let pattern = doc
        .patterns
        .get_mut(text)
        .ok_or_else(|| MotifError::NotFound(text.to_string()))?;

    if pattern.promoted {
        return Ok(false);
    }

    pattern.promoted = true;
    pattern.scores.composite = 0.0;
    pattern.promotion = Some(Promotion {
        kind,
        artifact_ref: artifact_ref.to_string(),
        promoted_at: today,
    });
    doc.promotion_candidates.retain(|t| t != text);
    Ok(true)
}

/// Draft metadata for turning a candidate into an artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionSuggestion {
    pub pattern: String,
    pub kind: ArtifactKind,
    pub suggested_name: String,
    pub suggested_description: String,
    pub count: u64,
    pub composite: f64,
}

pub fn suggest(pattern: &Pattern) -> PromotionSuggestion {
    PromotionSuggestion {
        pattern: pattern.text.clone(),
        kind: suggest_kind(&pattern.contexts),
        suggested_name: to_kebab_case(&pattern.text),
        suggested_description: describe(&pattern.contexts),
        count: pattern.count,
        composite: pattern.scores.composite,
    }
}

/// Agent if any context mentions an action keyword, skill otherwise
pub fn suggest_kind(contexts: &[String]) -> ArtifactKind {
    let joined = contexts.join(" ").to_lowercase();
    if AGENT_KEYWORDS.iter().any(|k| joined.contains(k)) {
        ArtifactKind::Agent
    } else {
        ArtifactKind::Skill
    }
}

fn describe(contexts: &[String]) -> String {
    let cleaned: Vec<String> = contexts
        .iter()
        .take(DESCRIPTION_CONTEXTS)
        .map(|c| {
            let c = TIMESTAMP.replace_all(c, "");
            WHITESPACE.replace_all(&c, " ").trim().to_string()
        })
        .filter(|c| !c.is_empty())
        .collect();
    cleaned.join(" ").chars().take(DESCRIPTION_CHARS).collect()
}

pub fn to_kebab_case(text: &str) -> String {
    let lower = text.to_lowercase();
    let hyphenated = SEPARATORS.replace_all(&lower, "-");
    let slug = NON_SLUG.replace_all(&hyphenated, "");
    let collapsed = HYPHEN_RUNS.replace_all(&slug, "-");
    collapsed.trim_matches('-').to_string()
}
