//! Business services over the persistence boundary

pub mod dashboard;
pub mod evaluation;

pub use dashboard::{GroupBy, OverdueEntry, RollupEntry};
pub use evaluation::{Evaluator, ValueCorrection};
