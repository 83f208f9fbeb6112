//! Property-based tests for motif
//!
//! These tests verify invariants that must hold for all inputs:
//! - The tokenizer never panics and only emits normalized tokens
//! - Levenshtein distance is a metric and the BK-tree agrees with brute force
//! - Scheduling and confidence stay inside their bounds
//! - Recomputed scores stay in [0, 1]
//!
//! Run with: cargo test --test property_tests

use proptest::prelude::*;

// ============================================================================
// TOKENIZER TESTS
// ============================================================================

mod tokenizer_tests {
    use super::*;
    use motif::tokenize::{tokenize, tokenize_batch, MIN_WORD_CHARS};

    proptest! {
        /// Invariant: tokenize never panics on any string input
        #[test]
        fn never_panics(s in ".*") {
            let _ = tokenize(&s);
        }

        /// Invariant: every token is lower-cased and at least three chars long
        #[test]
        fn tokens_are_normalized(s in "\\PC{0,200}") {
            for token in tokenize(&s) {
                prop_assert!(token.chars().count() >= MIN_WORD_CHARS, "short token {:?}", token);
                prop_assert_eq!(token.to_lowercase(), token.clone());
            }
        }

        /// Invariant: line-wise tokenization sees the same tokens as whole-text tokenization
        #[test]
        fn batch_matches_plain(s in "[a-zA-Z ]{0,40}(\n[a-zA-Z ]{0,40}){0,5}") {
            let batch = tokenize_batch(&s, 80);
            prop_assert_eq!(&batch.tokens, &tokenize(&s));
            for token in &batch.tokens {
                prop_assert!(batch.contexts.contains_key(token));
            }
        }
    }
}

// ============================================================================
// SIMILARITY TESTS
// ============================================================================

mod similarity_tests {
    use super::*;
    use motif::similarity::{levenshtein, levenshtein_within, BkTree};

    proptest! {
        /// Invariant: d(a, a) = 0 and d(a, b) = 0 only when a = b
        #[test]
        fn identity(a in "[a-e]{0,12}", b in "[a-e]{0,12}") {
            prop_assert_eq!(levenshtein(&a, &a), 0);
            prop_assert_eq!(levenshtein(&a, &b) == 0, a == b);
        }

        /// Invariant: d(a, b) = d(b, a)
        #[test]
        fn symmetry(a in "\\PC{0,16}", b in "\\PC{0,16}") {
            prop_assert_eq!(levenshtein(&a, &b), levenshtein(&b, &a));
        }

        /// Invariant: d(a, c) <= d(a, b) + d(b, c)
        #[test]
        fn triangle_inequality(a in "[a-d]{0,10}", b in "[a-d]{0,10}", c in "[a-d]{0,10}") {
            prop_assert!(levenshtein(&a, &c) <= levenshtein(&a, &b) + levenshtein(&b, &c));
        }

        /// Invariant: the bounded variant agrees with the full distance
        #[test]
        fn bounded_agrees(a in "[a-d]{0,10}", b in "[a-d]{0,10}", max in 0usize..6) {
            let full = levenshtein(&a, &b);
            let bounded = levenshtein_within(&a, &b, max);
            if full <= max {
                prop_assert_eq!(bounded, Some(full));
            } else {
                prop_assert_eq!(bounded, None);
            }
        }

        /// Invariant: BK-tree search returns exactly what a linear scan finds
        #[test]
        fn bktree_matches_brute_force(
            words in prop::collection::btree_set("[a-d]{1,7}", 0..40),
            query in "[a-d]{1,7}",
            max in 0usize..4,
        ) {
            let tree: BkTree = words.iter().map(String::as_str).collect();
            prop_assert_eq!(tree.len(), words.len());

            let mut expected: Vec<(&str, usize)> = words
                .iter()
                .map(|w| (w.as_str(), levenshtein(&query, w)))
                .filter(|(_, d)| *d <= max)
                .collect();
            expected.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));

            prop_assert_eq!(tree.search(&query, max), expected);
        }
    }
}

// ============================================================================
// REVIEW SCHEDULING TESTS
// ============================================================================

mod review_tests {
    use super::*;
    use chrono::NaiveDate;
    use motif::review::{Quality, Sm2State, MAX_INTERVAL_DAYS};

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()
    }

    proptest! {
        /// Invariant: EF never drops below 1.3 and the interval is at least one day
        #[test]
        fn state_stays_bounded(ef in 1.3f64..3.5, ratings in prop::collection::vec(0i64..=5, 1..30)) {
            let mut state = Sm2State::initial(ef, start());
            let mut today = start();
            for q in ratings {
                state.apply(Quality::try_from(q).unwrap(), today);
                prop_assert!(state.easiness_factor >= 1.3);
                prop_assert!(state.interval_days >= 1);
                prop_assert!(state.next_review_date > today);
                today = state.next_review_date;
            }
        }

        /// Invariant: an unbroken run of perfect reviews never overflows the calendar
        #[test]
        fn perfect_streak_stays_schedulable(ef in 1.3f64..3.5, reviews in 1usize..60) {
            let mut state = Sm2State::initial(ef, start());
            for _ in 0..reviews {
                state.apply(Quality::try_from(5).unwrap(), start());
                prop_assert!(state.interval_days <= MAX_INTERVAL_DAYS);
                prop_assert!(state.next_review_date > start());
            }
        }

        /// Invariant: good ratings from a fresh state never shorten the interval
        #[test]
        fn good_ratings_never_shrink(ratings in prop::collection::vec(4i64..=5, 1..15)) {
            let mut state = Sm2State::initial(2.5, start());
            let mut last = 0;
            for q in ratings {
                state.apply(Quality::try_from(q).unwrap(), start());
                prop_assert!(state.interval_days >= last);
                last = state.interval_days;
            }
        }

        /// Invariant: ratings outside 0..=5 are rejected
        #[test]
        fn out_of_range_rejected(q in prop_oneof![i64::MIN..0, 6i64..i64::MAX]) {
            prop_assert!(Quality::try_from(q).is_err());
        }
    }
}

// ============================================================================
// CONFIDENCE TESTS
// ============================================================================

mod confidence_tests {
    use super::*;
    use motif::confidence::{BayesianState, Outcome};

    proptest! {
        /// Invariant: each success strictly raises the posterior mean
        #[test]
        fn success_raises_mean(failures in 0u32..50, successes in 1u32..50) {
            let mut state = BayesianState::default();
            for _ in 0..failures {
                state.observe(Outcome::Failure);
            }
            let mut last = state.mean();
            for _ in 0..successes {
                state.observe(Outcome::Success);
                prop_assert!(state.mean() > last);
                last = state.mean();
            }
        }

        /// Invariant: each failure strictly lowers the posterior mean
        #[test]
        fn failure_lowers_mean(successes in 0u32..50, failures in 1u32..50) {
            let mut state = BayesianState::default();
            for _ in 0..successes {
                state.observe(Outcome::Success);
            }
            let mut last = state.mean();
            for _ in 0..failures {
                state.observe(Outcome::Failure);
                prop_assert!(state.mean() < last);
                last = state.mean();
            }
        }

        /// Invariant: enough failures drive the mean toward 0
        #[test]
        fn failures_converge_to_zero(successes in 0u32..20) {
            let mut state = BayesianState::default();
            for _ in 0..successes {
                state.observe(Outcome::Success);
            }
            // (1 + s) / (2 + s + f) < 0.1 once f > 9s + 8
            for _ in 0..(9 * successes + 9) {
                state.observe(Outcome::Failure);
            }
            prop_assert!(state.mean() < 0.1, "mean {}", state.mean());
        }

        /// Invariant: the credible interval brackets the mean inside [0, 1]
        #[test]
        fn interval_brackets_mean(alpha in 1.0f64..200.0, beta in 1.0f64..200.0) {
            let state = BayesianState { alpha, beta };
            let (low, high) = state.credible_interval(0.95);
            prop_assert!(0.0 <= low && low <= high && high <= 1.0);
            prop_assert!(low <= state.mean() + 1e-9 && state.mean() <= high + 1e-9);
        }
    }
}

// ============================================================================
// SCORING TESTS
// ============================================================================

mod scoring_tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use motif::scoring::recompute_all;
    use motif::tokenize::tokenize_batch;
    use motif::tracker::{record_batch, BatchObservation};
    use motif::{EngineConfig, StoreDocument};

    const VOCABULARY: &[&str] = &[
        "deploy", "staging", "rollback", "hotfix", "review", "notes", "release", "cache",
    ];

    fn batch_text() -> impl Strategy<Value = String> {
        prop::collection::vec(prop::sample::select(VOCABULARY), 1..12).prop_map(|w| w.join(" "))
    }

    proptest! {
        /// Invariant: every recomputed score is finite and inside its bounds
        #[test]
        fn scores_in_bounds(
            batches in prop::collection::vec(batch_text(), 1..8),
            days_later in 0i64..400,
        ) {
            let config = EngineConfig::default();
            let mut doc = StoreDocument::new();
            let first = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();

            for (i, text) in batches.iter().enumerate() {
                let tokenized = tokenize_batch(text, 80);
                let batch_id = format!("b{}", i);
                record_batch(
                    &mut doc,
                    BatchObservation {
                        batch_id: &batch_id,
                        date: first + Duration::days(i as i64),
                        tokens: &tokenized.tokens,
                        contexts: &tokenized.contexts,
                    },
                    &config.store,
                );
            }

            let as_of = first + Duration::days(days_later);
            let report = recompute_all(&mut doc, &config, as_of);
            prop_assert_eq!(report.patterns_scored, doc.patterns.len());

            for pattern in doc.patterns.values() {
                let s = &pattern.scores;
                prop_assert!((0.0..=1.0).contains(&s.composite), "{}: {:?}", pattern.text, s);
                prop_assert!((0.0..=1.0).contains(&s.shannon_entropy), "{}: {:?}", pattern.text, s);
                prop_assert!(s.ebbinghaus_retention > 0.0 && s.ebbinghaus_retention <= 1.0);
                prop_assert!(s.bm25.is_finite() && s.pmi.is_finite());
            }
        }
    }
}
