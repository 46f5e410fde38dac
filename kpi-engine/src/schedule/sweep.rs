//! Due sweep across all active tenants

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use kpi_common::db::{ExecutionTrigger, Indicator};
use kpi_common::{Error, ErrorKind, Result};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::due::{Cadence, DueState};
use crate::db::{groups, indicators, values};
use crate::services::Evaluator;

/// One indicator that could not be evaluated
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepFailure {
    pub indicator_id: Uuid,
    pub error_kind: ErrorKind,
    pub message: String,
}

/// Outcome of one sweep
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub executed: Vec<Uuid>,
    pub failed: Vec<SweepFailure>,
}

impl SweepReport {
    fn fail(&mut self, indicator_id: Uuid, error: &Error) {
        self.failed.push(SweepFailure {
            indicator_id,
            error_kind: error.kind(),
            message: error.to_string(),
        });
    }
}

/// Runs due sweeps; at most one at a time
pub struct Scheduler {
    evaluator: Evaluator,
    workers: usize,
    running: AtomicBool,
}

/// Clears the in-progress flag when the sweep ends, however it ends
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Scheduler {
    pub fn new(evaluator: Evaluator, workers: usize) -> Self {
        Self {
            evaluator,
            workers: workers.max(1),
            running: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Evaluate every due indicator of every active tenant, sampled at `as_of`
    ///
    /// A failing indicator is recorded and skipped. Fails with
    /// `SweepInProgress` if another sweep has not finished.
    pub async fn run_due_sweep(&self, as_of: DateTime<Utc>) -> Result<SweepReport> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::SweepInProgress);
        }
        let _guard = RunningGuard(&self.running);

        info!(as_of = %as_of, workers = self.workers, "Due sweep started");

        let mut report = SweepReport::default();
        let tenants = groups::list_active_tenants(self.evaluator.db()).await?;

        for tenant in tenants {
            if let Err(e) = self.sweep_tenant(tenant.id, as_of, &mut report).await {
                error!(tenant = %tenant.code, error = %e, "Tenant sweep aborted");
            }
        }

        info!(
            executed = report.executed.len(),
            failed = report.failed.len(),
            "Due sweep finished"
        );
        Ok(report)
    }

    async fn sweep_tenant(&self, tenant_id: Uuid, as_of: DateTime<Utc>, report: &mut SweepReport) -> Result<()> {
        let pool = self.evaluator.db();
        let indicators = indicators::list_active_indicators(pool, tenant_id).await?;
        let last_ends = values::latest_period_ends(pool, tenant_id).await?;

        let mut due: Vec<Indicator> = Vec::new();
        for indicator in indicators {
            match due_state(&indicator, last_ends.get(&indicator.id).copied(), as_of) {
                Ok(Some(state)) if state.is_due() => due.push(indicator),
                Ok(_) => {}
                Err(e) => {
                    warn!(indicator = %indicator.code, error = %e, "Indicator cannot be scheduled");
                    self.evaluator
                        .log_failure(tenant_id, indicator.id, ExecutionTrigger::Scheduled, &e)
                        .await;
                    report.fail(indicator.id, &e);
                }
            }
        }

        let outcomes: Vec<(Uuid, Result<_>)> = stream::iter(due)
            .map(|indicator| async move {
                let outcome = self
                    .evaluator
                    .evaluate_at(tenant_id, indicator.id, as_of, ExecutionTrigger::Scheduled)
                    .await;
                (indicator.id, outcome)
            })
            .buffer_unordered(self.workers)
            .collect()
            .await;

        for (indicator_id, outcome) in outcomes {
            match outcome {
                Ok(_) => report.executed.push(indicator_id),
                Err(e) => report.fail(indicator_id, &e),
            }
        }
        Ok(())
    }
}

/// `Ok(None)` for indicators exempt from scheduling
fn due_state(
    indicator: &Indicator,
    last_end: Option<DateTime<Utc>>,
    as_of: DateTime<Utc>,
) -> Result<Option<DueState>> {
    match Cadence::for_indicator(indicator)? {
        Some(cadence) => DueState::evaluate(last_end, cadence, as_of).map(Some),
        None => Ok(None),
    }
}
