//! SM-2 spaced-repetition scheduling
//!
//! State lives in `{easiness_factor, interval_days, repetitions}`; a
//! quality rating `q` in 0..=5 drives each transition:
//!
//! - `EF' = max(1.3, EF + (0.1 - (5-q) * (0.08 + (5-q) * 0.02)))`
//! - `q < 3` resets repetitions to 0 and the interval to 1 day
//! - otherwise the interval goes 1, 6, then `round(previous * EF')`,
//!   capped at [`MAX_INTERVAL_DAYS`]

use std::cmp::Ordering;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::config::MIN_EASINESS_FACTOR;
use crate::error::{MotifError, Result};
use crate::types::Pattern;

/// Ratings below this count as a failed recall
pub const PASSING_QUALITY: u8 = 3;

/// Longest interval between reviews (about a century)
pub const MAX_INTERVAL_DAYS: u32 = 36_500;

/// A validated SM-2 quality rating
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Quality(u8);

impl Quality {
    pub const MAX: u8 = 5;

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn is_pass(self) -> bool {
        self.0 >= PASSING_QUALITY
    }
}

impl TryFrom<i64> for Quality {
    type Error = MotifError;

    fn try_from(q: i64) -> Result<Self> {
        if (0..=Quality::MAX as i64).contains(&q) {
            Ok(Quality(q as u8))
        } else {
            Err(MotifError::InvalidInput(format!(
                "quality must be within 0..=5, got {}",
                q
            )))
        }
    }
}

/// Per-pattern SM-2 state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sm2State {
    pub easiness_factor: f64,
    pub interval_days: u32,
    pub repetitions: u32,
    pub last_review_date: Option<NaiveDate>,
    pub next_review_date: NaiveDate,
}

impl Sm2State {
    /// Fresh state for a pattern entering review, due immediately
    pub fn initial(easiness_factor: f64, today: NaiveDate) -> Self {
        Self {
            easiness_factor: easiness_factor.max(MIN_EASINESS_FACTOR),
            interval_days: 1,
            repetitions: 0,
            last_review_date: None,
            next_review_date: today,
        }
    }

    /// Apply one review
    pub fn apply(&mut self, quality: Quality, today: NaiveDate) {
        let miss = f64::from(Quality::MAX - quality.value());
        let ef = self.easiness_factor + (0.1 - miss * (0.08 + miss * 0.02));
        self.easiness_factor = ef.max(MIN_EASINESS_FACTOR);

        if quality.is_pass() {
            self.repetitions += 1;
            self.interval_days = match self.repetitions {
                1 => 1,
                2 => 6,
                _ => (f64::from(self.interval_days) * self.easiness_factor)
                    .round()
                    .clamp(1.0, f64::from(MAX_INTERVAL_DAYS)) as u32,
            };
        } else {
            self.repetitions = 0;
            self.interval_days = 1;
        }

        self.last_review_date = Some(today);
        self.next_review_date = today
            .checked_add_signed(Duration::days(i64::from(self.interval_days)))
            .unwrap_or(NaiveDate::MAX);
    }

    /// Days past the due date (negative when not yet due)
    pub fn days_overdue(&self, as_of: NaiveDate) -> i64 {
        (as_of - self.next_review_date).num_days()
    }

    pub fn is_due(&self, as_of: NaiveDate) -> bool {
        self.next_review_date <= as_of
    }
}

/// Result of recording one review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sm2Result {
    pub text: String,
    pub quality: u8,
    pub easiness_factor: f64,
    pub interval_days: u32,
    pub repetitions: u32,
    pub next_review_date: NaiveDate,
}

impl Sm2Result {
    pub fn new(text: &str, quality: Quality, state: &Sm2State) -> Self {
        Self {
            text: text.to_string(),
            quality: quality.value(),
            easiness_factor: state.easiness_factor,
            interval_days: state.interval_days,
            repetitions: state.repetitions,
            next_review_date: state.next_review_date,
        }
    }
}

/// Review load at a point in time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewSummary {
    pub as_of: Option<NaiveDate>,
    /// Patterns with SM-2 state
    pub tracked: usize,
    /// Due strictly before `as_of`
    pub overdue: usize,
    pub due_today: usize,
    /// Due after today but within the horizon
    pub due_soon: usize,
}

/// Patterns due on or before `as_of`, most overdue first, then by composite
pub fn due_patterns<'a, I>(patterns: I, as_of: NaiveDate) -> Vec<&'a Pattern>
where
    I: IntoIterator<Item = &'a Pattern>,
{
    let mut due: Vec<(&Pattern, i64)> = patterns
        .into_iter()
        .filter_map(|p| {
            p.sm2_state
                .as_ref()
                .filter(|s| s.is_due(as_of))
                .map(|s| (p, s.days_overdue(as_of)))
        })
        .collect();

    due.sort_by(|(pa, da), (pb, db)| {
        db.cmp(da)
            .then_with(|| {
                pb.scores
                    .composite
                    .partial_cmp(&pa.scores.composite)
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| pa.text.cmp(&pb.text))
    });

    due.into_iter().map(|(p, _)| p).collect()
}

/// Bucket tracked patterns by due date
pub fn summarize<'a, I>(patterns: I, as_of: NaiveDate, due_soon_days: i64) -> ReviewSummary
where
    I: IntoIterator<Item = &'a Pattern>,
{
    let mut summary = ReviewSummary {
        as_of: Some(as_of),
        ..Default::default()
    };

    for state in patterns.into_iter().filter_map(|p| p.sm2_state.as_ref()) {
        summary.tracked += 1;
        let overdue = state.days_overdue(as_of);
        if overdue > 0 {
            summary.overdue += 1;
        } else if overdue == 0 {
            summary.due_today += 1;
        } else if -overdue <= due_soon_days {
            summary.due_soon += 1;
        }
    }

    summary
}
