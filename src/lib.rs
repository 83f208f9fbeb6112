//! Motif - Pattern Memory Engine
//!
//! Learns recurring terms from batches of free-text notes, scores them
//! (BM25, PMI, Ebbinghaus retention, Shannon entropy), schedules them for
//! spaced-repetition review, merges near-duplicates and surfaces the
//! strongest ones as promotion candidates.

pub mod config;
pub mod confidence;
pub mod engine;
pub mod error;
pub mod promotion;
pub mod review;
pub mod scoring;
pub mod similarity;
pub mod storage;
pub mod tokenize;
pub mod tracker;
pub mod types;

pub use confidence::{BayesianState, ConfidenceSummary, Outcome, ThompsonDraw};
pub use config::EngineConfig;
pub use engine::{PatternEngine, StoreStats};
pub use error::{MotifError, Result};
pub use review::{ReviewSummary, Sm2Result, Sm2State};
pub use similarity::{MergeCandidate, MergePair, MergeReport};
pub use storage::{Store, StoreDocument};
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
