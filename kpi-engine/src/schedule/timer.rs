//! Daily wall-clock trigger for the due sweep

use chrono::{DateTime, Duration, NaiveTime, Utc};
use kpi_common::time::now;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::sweep::Scheduler;

/// First instant strictly after `now` at `hour_utc:00:00` UTC
pub fn next_run_after(now: DateTime<Utc>, hour_utc: u32) -> DateTime<Utc> {
    let time = NaiveTime::from_hms_opt(hour_utc, 0, 0).unwrap_or(NaiveTime::MIN);
    let today = now.date_naive().and_time(time).and_utc();
    if today > now {
        today
    } else {
        today + Duration::days(1)
    }
}

/// Run the sweep once a day until `shutdown` is cancelled
///
/// Cancellation stops the loop between sweeps; a running sweep is not interrupted.
pub fn spawn_sweep_loop(scheduler: Arc<Scheduler>, hour_utc: u32, shutdown: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let current = now();
            let next = next_run_after(current, hour_utc);
            let wait = (next - current).to_std().unwrap_or_default();
            info!(next_run = %next, "Next due sweep scheduled");

            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Sweep loop stopped");
                    break;
                }
                _ = tokio::time::sleep(wait) => {}
            }

            match scheduler.run_due_sweep(now()).await {
                Ok(report) => info!(
                    executed = report.executed.len(),
                    failed = report.failed.len(),
                    "Scheduled sweep complete"
                ),
                Err(e) => error!(error = %e, "Scheduled sweep failed"),
            }
        }
    })
}
