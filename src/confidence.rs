//! Bayesian confidence in a pattern's usefulness
//!
//! Each pattern carries a Beta(alpha, beta) posterior, starting from the
//! uniform prior Beta(1, 1). Feedback moves it one step at a time:
//! success adds 1 to alpha, failure adds 1 to beta.

use std::cmp::Ordering;

use rand::distributions::Distribution;
use rand::Rng;
use serde::{Deserialize, Serialize};
use statrs::distribution::{Beta, ContinuousCDF};

use crate::types::{round_score, Pattern};

/// Level used for reported credible intervals
pub const DEFAULT_CREDIBLE_LEVEL: f64 = 0.95;

/// Outcome of using a pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failure,
}

impl std::str::FromStr for Outcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "success" | "hit" | "useful" => Ok(Outcome::Success),
            "failure" | "miss" | "useless" => Ok(Outcome::Failure),
            _ => Err(format!("Unknown outcome: {}", s)),
        }
    }
}

/// Beta posterior parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BayesianState {
    pub alpha: f64,
    pub beta: f64,
}

impl Default for BayesianState {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            beta: 1.0,
        }
    }
}

impl BayesianState {
    pub fn observe(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Success => self.alpha += 1.0,
            Outcome::Failure => self.beta += 1.0,
        }
    }

    /// Combine two posteriors, counting the shared Beta(1, 1) prior once
    pub fn merged(&self, other: &BayesianState) -> BayesianState {
        BayesianState {
            alpha: (self.alpha + other.alpha - 1.0).max(1.0),
            beta: (self.beta + other.beta - 1.0).max(1.0),
        }
    }

    /// Number of feedback events folded into the posterior
    pub fn observations(&self) -> u64 {
        (self.alpha + self.beta - 2.0).max(0.0).round() as u64
    }

    pub fn mean(&self) -> f64 {
        self.alpha / (self.alpha + self.beta)
    }

    pub fn variance(&self) -> f64 {
        let sum = self.alpha + self.beta;
        (self.alpha * self.beta) / (sum * sum * (sum + 1.0))
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Equal-tailed credible interval holding `level` of the posterior mass
    pub fn credible_interval(&self, level: f64) -> (f64, f64) {
        let tail = (1.0 - level.clamp(0.0, 1.0)) / 2.0;

        match Beta::new(self.alpha, self.beta) {
            Ok(dist) => {
                let low = dist.inverse_cdf(tail);
                let high = dist.inverse_cdf(1.0 - tail);
                let low = if low.is_finite() { low.clamp(0.0, 1.0) } else { 0.0 };
                let high = if high.is_finite() { high.clamp(0.0, 1.0) } else { 1.0 };
                (low, high)
            }
            Err(_) => (0.0, 1.0),
        }
    }

    /// Draw one sample from the posterior (falls back to the mean if the
    /// parameters are unusable)
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match Beta::new(self.alpha, self.beta) {
            Ok(dist) => dist.sample(rng),
            Err(_) => self.mean(),
        }
    }

    pub fn summarize(&self, text: &str) -> ConfidenceSummary {
        let (interval_low, interval_high) = self.credible_interval(DEFAULT_CREDIBLE_LEVEL);
        ConfidenceSummary {
            text: text.to_string(),
            alpha: self.alpha,
            beta: self.beta,
            mean: round_score(self.mean()),
            variance: round_score(self.variance()),
            interval_low: round_score(interval_low),
            interval_high: round_score(interval_high),
            observations: self.observations(),
        }
    }
}

/// Reported confidence of one pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceSummary {
    pub text: String,
    pub alpha: f64,
    pub beta: f64,
    pub mean: f64,
    pub variance: f64,
    /// Lower bound of the 95% credible interval
    pub interval_low: f64,
    /// Upper bound of the 95% credible interval
    pub interval_high: f64,
    pub observations: u64,
}

/// One Thompson-sampling draw
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThompsonDraw {
    pub text: String,
    pub sample: f64,
    pub mean: f64,
}

/// Rank unpromoted patterns by one posterior draw each, keeping the top `k`.
///
/// Patterns with little feedback have wide posteriors and so still get
/// picked now and then, which is the point of sampling over ranking by mean.
pub fn thompson_select<'a, I, R>(patterns: I, k: usize, rng: &mut R) -> Vec<ThompsonDraw>
where
    I: IntoIterator<Item = &'a Pattern>,
    R: Rng + ?Sized,
{
    let mut draws: Vec<ThompsonDraw> = patterns
        .into_iter()
        .filter(|p| !p.promoted)
        .map(|p| ThompsonDraw {
            text: p.text.clone(),
            sample: p.bayesian_state.sample(rng),
            mean: round_score(p.bayesian_state.mean()),
        })
        .collect();

    draws.sort_by(|a, b| {
        b.sample
            .partial_cmp(&a.sample)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.text.cmp(&b.text))
    });
    draws.truncate(k);
    draws
}
