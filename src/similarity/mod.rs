//! Similarity and merge engine
//!
//! Implements:
//! - Levenshtein distance (two-row DP)
//! - BK-tree candidate pruning
//! - Survivor selection and statistics merging

mod bktree;
mod levenshtein;
mod merge;

pub use bktree::*;
pub use levenshtein::*;
pub use merge::*;
