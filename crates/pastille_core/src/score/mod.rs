//! Score computation over rubric trees and annotation stores.
//!
//! # Responsibility
//! - Derive exercise and document scores (`aggregator`).
//! - Build the printable recap with a scaled grade (`recap`).
//!
//! # Invariants
//! - Scores are recomputed from the store on demand; nothing is cached.

pub mod aggregator;
pub mod recap;

pub use aggregator::{format_points, round2, ScoreAggregator, ScoreLine};
pub use recap::{Recap, RecapRow};
