//! Ebbinghaus forgetting curve
//!
//! `R = exp(-days / s)` with memory strength `s = base + growth * count`.

use chrono::NaiveDate;

use crate::config::RetentionConfig;
use crate::types::round_score;

/// Smallest persisted retention, so rounding never yields 0
pub const MIN_RETENTION: f64 = 1e-6;

pub fn memory_strength(count: u64, config: &RetentionConfig) -> f64 {
    config.base_strength + config.growth_factor * count as f64
}

/// Whole days since `last_seen`; future dates count as 0
pub fn days_since(last_seen: NaiveDate, as_of: NaiveDate) -> i64 {
    (as_of - last_seen).num_days().max(0)
}

/// Retention in (0, 1], rounded to the persisted precision
pub fn retention(count: u64, last_seen: NaiveDate, as_of: NaiveDate, config: &RetentionConfig) -> f64 {
    let strength = memory_strength(count, config);
    let days = days_since(last_seen, as_of) as f64;
    let r = (-days / strength).exp();
    round_score(r).clamp(MIN_RETENTION, 1.0)
}
