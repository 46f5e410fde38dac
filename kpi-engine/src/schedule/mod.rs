//! Due-date projection, the due sweep and its timer

pub mod due;
pub mod sweep;
pub mod timer;

pub use due::{days_late, Cadence, DueState};
pub use sweep::{Scheduler, SweepFailure, SweepReport};
pub use timer::{next_run_after, spawn_sweep_loop};
