//! Scoring: period classification, compliance/trend and weighted rollups
//!
//! Everything here is pure; persistence is the caller's job.

pub mod aggregator;
pub mod classifier;
pub mod compliance;

pub use aggregator::{band_score, weighted_score, RollupStatus, ScoredMember};
pub use classifier::classify;
pub use compliance::{compliance_percent, trend, variation_percent, Trend};
