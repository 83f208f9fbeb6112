//! Pattern engine: the public operations over one store
//!
//! Each write is a single load → mutate → atomic save. Operations that
//! depend on "today" have an `_on` / `_as_of` variant taking the date.

use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::confidence::{thompson_select, ConfidenceSummary, Outcome, ThompsonDraw};
use crate::config::EngineConfig;
use crate::error::{MotifError, Result};
use crate::promotion::{self, PromotionSuggestion};
use crate::review::{self, Quality, ReviewSummary, Sm2Result, Sm2State};
use crate::scoring::{self, ScoreReport};
use crate::similarity::{self, MergeCandidate, MergePair, MergeReport};
use crate::storage::{Store, StoreDocument};
use crate::tokenize::tokenize_batch;
use crate::tracker::{self, BatchObservation, BatchSummary};
use crate::types::{ArtifactKind, Pattern};

/// Counts describing a store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub patterns: usize,
    pub batches: usize,
    pub edges: usize,
    pub total_tokens: u64,
    pub promoted: usize,
    pub stopwords: usize,
    pub review_tracked: usize,
    pub promotion_candidates: usize,
}

/// Engine over one store file
pub struct PatternEngine {
    store: Store,
    config: EngineConfig,
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn require<'a>(doc: &'a StoreDocument, text: &str) -> Result<&'a Pattern> {
    doc.patterns
        .get(text)
        .ok_or_else(|| MotifError::NotFound(text.to_string()))
}

fn require_mut<'a>(doc: &'a mut StoreDocument, text: &str) -> Result<&'a mut Pattern> {
    doc.patterns
        .get_mut(text)
        .ok_or_else(|| MotifError::NotFound(text.to_string()))
}

impl PatternEngine {
    /// Open the store at `path` with a validated configuration
    pub fn open(path: impl Into<PathBuf>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let store = Store::open(path)?;
        debug!(path = %store.path().display(), "Pattern engine opened");
        Ok(Self { store, config })
    }

    /// Open with default configuration
    pub fn open_default(path: impl Into<PathBuf>) -> Result<Self> {
        Self::open(path, EngineConfig::default())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store_path(&self) -> &Path {
        self.store.path()
    }

    // =========================================================================
    // Ingest and scoring
    // =========================================================================

    /// Record a batch dated by its id (`YYYY-MM-DD`), or today if the id is
    /// not a date
    pub fn ingest(&self, batch_id: &str, text: &str) -> Result<BatchSummary> {
        let date = NaiveDate::parse_from_str(batch_id.trim(), "%Y-%m-%d").unwrap_or_else(|_| today());
        self.ingest_on(batch_id, date, text)
    }

    /// Record a batch with an explicit date
    #[instrument(skip(self, text), fields(bytes = text.len()))]
    pub fn ingest_on(&self, batch_id: &str, date: NaiveDate, text: &str) -> Result<BatchSummary> {
        if batch_id.trim().is_empty() {
            return Err(MotifError::InvalidInput("batch id is empty".to_string()));
        }
        if text.contains('\0') {
            return Err(MotifError::InvalidInput(format!(
                "batch '{}' contains NUL characters",
                batch_id
            )));
        }

        let tokenized = tokenize_batch(text, self.config.store.context_chars);
        let summary = self.store.with_transaction(|doc| {
            Ok(tracker::record_batch(
                doc,
                BatchObservation {
                    batch_id,
                    date,
                    tokens: &tokenized.tokens,
                    contexts: &tokenized.contexts,
                },
                &self.config.store,
            ))
        })?;

        info!(
            batch_id,
            tokens = summary.tokens,
            new_patterns = summary.new_patterns,
            "Batch ingested"
        );
        Ok(summary)
    }

    /// Recompute every score as of today
    pub fn recompute_scores(&self) -> Result<ScoreReport> {
        self.recompute_scores_as_of(today())
    }

    #[instrument(skip(self))]
    pub fn recompute_scores_as_of(&self, as_of: NaiveDate) -> Result<ScoreReport> {
        let report = self
            .store
            .with_transaction(|doc| Ok(self.rescore(doc, as_of)))?;
        info!(
            patterns = report.patterns_scored,
            batches = report.total_batches,
            "Scores recomputed"
        );
        Ok(report)
    }

    /// Recompute scores and refresh the cached candidate list
    fn rescore(&self, doc: &mut StoreDocument, as_of: NaiveDate) -> ScoreReport {
        let report = scoring::recompute_all(doc, &self.config, as_of);
        doc.promotion_candidates = promotion::select_candidates(doc.patterns.values(), &self.config.promotion)
            .into_iter()
            .map(|p| p.text.clone())
            .collect();
        report
    }

    // =========================================================================
    // Similarity and merge
    // =========================================================================

    /// Pairs within `threshold` edits among patterns with enough count
    pub fn find_merge_candidates(&self, threshold: usize) -> Result<Vec<MergeCandidate>> {
        let doc = self.store.load()?;
        Ok(similarity::find_candidates(
            &doc,
            threshold,
            self.config.similarity.min_count,
        ))
    }

    /// Merge pairs within the configured edit distance, backing up the
    /// store first if anything will change
    pub fn apply_merges(&self, pairs: &[MergePair]) -> Result<MergeReport> {
        self.apply_merges_as_of(pairs, today())
    }

    #[instrument(skip(self, pairs), fields(pairs = pairs.len()))]
    pub fn apply_merges_as_of(&self, pairs: &[MergePair], as_of: NaiveDate) -> Result<MergeReport> {
        let mut doc = self.store.load()?;
        let mut report = similarity::apply_pairs(
            &mut doc,
            pairs,
            self.config.similarity.max_distance,
            self.config.store.max_contexts,
        );

        for skipped in &report.skipped {
            warn!(
                pattern_a = %skipped.pattern_a,
                pattern_b = %skipped.pattern_b,
                reason = %skipped.reason,
                "Merge pair skipped"
            );
        }

        if report.merged.is_empty() {
            return Ok(report);
        }

        report.backup = self.store.backup(self.config.store.backup_keep)?;
        self.rescore(&mut doc, as_of);
        self.store.save(&mut doc)?;

        info!(
            merged = report.merged.len(),
            skipped = report.skipped.len(),
            remaining = report.patterns_remaining,
            "Merges applied"
        );
        Ok(report)
    }

    // =========================================================================
    // Spaced repetition
    // =========================================================================

    /// Apply an SM-2 rating dated today
    pub fn record_review(&self, text: &str, quality: i64) -> Result<Sm2Result> {
        self.record_review_on(text, quality, today())
    }

    #[instrument(skip(self))]
    pub fn record_review_on(&self, text: &str, quality: i64, today: NaiveDate) -> Result<Sm2Result> {
        let quality = Quality::try_from(quality)?;
        let initial_easiness = self.config.review.initial_easiness;

        let result = self.store.with_transaction(|doc| {
            let pattern = require_mut(doc, text)?;
            let state = pattern
                .sm2_state
                .get_or_insert_with(|| Sm2State::initial(initial_easiness, today));
            state.apply(quality, today);
            Ok(Sm2Result::new(text, quality, state))
        })?;

        info!(
            pattern = text,
            interval = result.interval_days,
            next = %result.next_review_date,
            "Review recorded"
        );
        Ok(result)
    }

    /// Patterns due on or before `as_of`, most overdue first
    pub fn due_reviews(&self, as_of: NaiveDate) -> Result<Vec<Pattern>> {
        let doc = self.store.load()?;
        Ok(review::due_patterns(doc.patterns.values(), as_of)
            .into_iter()
            .cloned()
            .collect())
    }

    pub fn review_summary(&self, as_of: NaiveDate) -> Result<ReviewSummary> {
        let doc = self.store.load()?;
        Ok(review::summarize(
            doc.patterns.values(),
            as_of,
            self.config.review.due_soon_days,
        ))
    }

    // =========================================================================
    // Promotion
    // =========================================================================

    /// Current candidates, computed from stored scores; writes nothing
    pub fn promotion_candidates(&self) -> Result<Vec<Pattern>> {
        let doc = self.store.load()?;
        Ok(promotion::select_candidates(doc.patterns.values(), &self.config.promotion)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Candidates with a suggested artifact kind, name and description
    pub fn promotion_suggestions(&self) -> Result<Vec<PromotionSuggestion>> {
        let doc = self.store.load()?;
        Ok(promotion::select_candidates(doc.patterns.values(), &self.config.promotion)
            .into_iter()
            .map(promotion::suggest)
            .collect())
    }

    /// Mark a pattern promoted into a `skill` or `agent` artifact.
    ///
    /// Returns false if it was already promoted.
    pub fn mark_promoted(&self, text: &str, kind: &str, artifact_ref: &str) -> Result<bool> {
        self.mark_promoted_on(text, kind, artifact_ref, today())
    }

    #[instrument(skip(self))]
    pub fn mark_promoted_on(
        &self,
        text: &str,
        kind: &str,
        artifact_ref: &str,
        today: NaiveDate,
    ) -> Result<bool> {
        let kind: ArtifactKind = kind.parse().map_err(MotifError::InvalidInput)?;

        let changed = self
            .store
            .with_transaction(|doc| promotion::mark_promoted(doc, text, kind, artifact_ref, today))?;

        if changed {
            info!(pattern = text, %kind, artifact_ref, "Pattern promoted");
        } else {
            debug!(pattern = text, "Pattern already promoted");
        }
        Ok(changed)
    }

    // =========================================================================
    // Confidence
    // =========================================================================

    /// Fold one success/failure observation into the pattern's posterior
    #[instrument(skip(self))]
    pub fn record_feedback(&self, text: &str, outcome: Outcome) -> Result<ConfidenceSummary> {
        let summary = self.store.with_transaction(|doc| {
            let pattern = require_mut(doc, text)?;
            pattern.bayesian_state.observe(outcome);
            Ok(pattern.bayesian_state.summarize(text))
        })?;

        info!(pattern = text, ?outcome, mean = summary.mean, "Feedback recorded");
        Ok(summary)
    }

    pub fn confidence(&self, text: &str) -> Result<ConfidenceSummary> {
        let doc = self.store.load()?;
        Ok(require(&doc, text)?.bayesian_state.summarize(text))
    }

    /// Thompson-sampled ranking of unpromoted patterns
    pub fn thompson_select(&self, limit: usize) -> Result<Vec<ThompsonDraw>> {
        self.thompson_select_with_rng(limit, &mut rand::thread_rng())
    }

    pub fn thompson_select_with_rng<R: Rng + ?Sized>(&self, limit: usize, rng: &mut R) -> Result<Vec<ThompsonDraw>> {
        let doc = self.store.load()?;
        Ok(thompson_select(doc.patterns.values(), limit, rng))
    }

    // =========================================================================
    // Inspection and maintenance
    // =========================================================================

    pub fn get_pattern(&self, text: &str) -> Result<Pattern> {
        let doc = self.store.load()?;
        require(&doc, text).cloned()
    }

    /// Classify a pattern as a stopword (or clear the flag)
    #[instrument(skip(self))]
    pub fn set_stopword(&self, text: &str, flag: bool) -> Result<()> {
        self.store.with_transaction(|doc| {
            require_mut(doc, text)?.is_stopword = flag;
            Ok(())
        })?;
        info!(pattern = text, flag, "Stopword flag set");
        Ok(())
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let doc = self.store.load()?;
        let patterns = doc.patterns.values();
        Ok(StoreStats {
            patterns: doc.patterns.len(),
            batches: doc.batches.len(),
            edges: doc.cooccurrences.len(),
            total_tokens: doc.total_tokens(),
            promoted: patterns.clone().filter(|p| p.promoted).count(),
            stopwords: patterns.clone().filter(|p| p.is_stopword).count(),
            review_tracked: patterns.filter(|p| p.sm2_state.is_some()).count(),
            promotion_candidates: promotion::select_candidates(doc.patterns.values(), &self.config.promotion)
                .len(),
        })
    }

    /// Replace the store with an empty one after backing it up. The only
    /// recovery path from a corrupt store.
    #[instrument(skip(self))]
    pub fn reset(&self) -> Result<Option<PathBuf>> {
        let backup = self.store.reset(self.config.store.backup_keep)?;
        info!(backup = ?backup, "Store reset");
        Ok(backup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, d).unwrap()
    }

    fn engine(dir: &TempDir) -> PatternEngine {
        PatternEngine::open_default(dir.path().join("patterns.json")).unwrap()
    }

    #[test]
    fn test_open_rejects_bad_config() {
        let dir = TempDir::new().unwrap();
        let mut config = EngineConfig::default();
        config.scoring.weight_bm25 = 0.9;
        let result = PatternEngine::open(dir.path().join("p.json"), config);
        assert!(matches!(result, Err(MotifError::Config(_))));
    }

    #[test]
    fn test_ingest_dates_batch_from_id() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        engine.ingest("2026-01-03", "deploy staging").unwrap();
        assert_eq!(engine.get_pattern("deploy").unwrap().last_seen, day(3));
    }

    #[test]
    fn test_ingest_rejects_malformed_input() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        assert!(matches!(
            engine.ingest_on("  ", day(1), "deploy"),
            Err(MotifError::InvalidInput(_))
        ));
        assert!(matches!(
            engine.ingest_on("b1", day(1), "dep\0loy"),
            Err(MotifError::InvalidInput(_))
        ));
        assert_eq!(engine.stats().unwrap().batches, 0);
    }

    #[test]
    fn test_review_validation_happens_before_lookup() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        engine.ingest_on("b1", day(1), "deploy").unwrap();

        assert!(matches!(
            engine.record_review_on("deploy", 7, day(1)),
            Err(MotifError::InvalidInput(_))
        ));
        assert!(engine.get_pattern("deploy").unwrap().sm2_state.is_none());
        assert!(matches!(
            engine.record_review_on("ghost", 4, day(1)),
            Err(MotifError::NotFound(_))
        ));
    }

    #[test]
    fn test_unknown_artifact_kind() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        engine.ingest_on("b1", day(1), "deploy").unwrap();
        assert!(matches!(
            engine.mark_promoted("deploy", "plugin", "x"),
            Err(MotifError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_feedback_and_confidence() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        engine.ingest_on("b1", day(1), "deploy").unwrap();

        engine.record_feedback("deploy", Outcome::Success).unwrap();
        let summary = engine.record_feedback("deploy", Outcome::Success).unwrap();
        assert_eq!(summary.alpha, 3.0);
        assert_eq!(engine.confidence("deploy").unwrap(), summary);
        assert!(matches!(
            engine.record_feedback("ghost", Outcome::Failure),
            Err(MotifError::NotFound(_))
        ));
    }

    #[test]
    fn test_stats() {
        let dir = TempDir::new().unwrap();
        let engine = engine(&dir);
        engine.ingest_on("b1", day(1), "deploy staging").unwrap();
        engine.set_stopword("staging", true).unwrap();
        engine.record_review_on("deploy", 5, day(1)).unwrap();

        let stats = engine.stats().unwrap();
        assert_eq!(stats.patterns, 2);
        assert_eq!(stats.batches, 1);
        assert_eq!(stats.edges, 1);
        assert_eq!(stats.total_tokens, 2);
        assert_eq!(stats.stopwords, 1);
        assert_eq!(stats.review_tracked, 1);
    }
}
