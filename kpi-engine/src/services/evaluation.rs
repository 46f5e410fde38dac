//! Classifier write path
//!
//! Automated runs resolve a value from the indicator's sources; manual
//! entries arrive with an explicit period. Both are classified against the
//! indicator's direction and persisted through the atomic insert in
//! `db::values`, so a status is never stored without its value or the reverse.

use chrono::{DateTime, Utc};
use kpi_common::db::{ExecutionLog, ExecutionTrigger, HealthStatus, IndicatorValue};
use kpi_common::time::now;
use kpi_common::{Error, Result};
use serde::{Deserialize, Deserializer};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::db::{execution_log, indicators, sources, values, values::NewValue};
use crate::scoring::classify;
use crate::sources::{resolve_value, SourceFetcher};

/// Partial correction of a recorded period; absent fields keep their value
///
/// `target` distinguishes an absent field (`None`) from an explicit
/// `null` (`Some(None)`), which clears the target.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueCorrection {
    pub value: Option<f64>,
    #[serde(default, deserialize_with = "present")]
    pub target: Option<Option<f64>>,
    pub period_start: Option<DateTime<Utc>>,
    pub period_end: Option<DateTime<Utc>>,
}

fn present<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl ValueCorrection {
    fn apply(&self, existing: &IndicatorValue) -> NewValue {
        NewValue {
            value: self.value.unwrap_or(existing.value),
            target: self.target.unwrap_or(existing.target),
            period_start: self.period_start.unwrap_or(existing.period_start),
            period_end: self.period_end.unwrap_or(existing.period_end),
        }
    }
}

/// Evaluates indicators and records their periods
#[derive(Clone)]
pub struct Evaluator {
    db: SqlitePool,
    fetcher: Arc<dyn SourceFetcher>,
}

impl Evaluator {
    pub fn new(db: SqlitePool, fetcher: Arc<dyn SourceFetcher>) -> Self {
        Self { db, fetcher }
    }

    pub fn db(&self) -> &SqlitePool {
        &self.db
    }

    /// Manual or API-triggered single-indicator execution, sampled now
    pub async fn evaluate_and_record(&self, tenant_id: Uuid, indicator_id: Uuid) -> Result<IndicatorValue> {
        self.evaluate_at(tenant_id, indicator_id, now(), ExecutionTrigger::Manual)
            .await
    }

    /// Resolve, classify and record an instantaneous sample at `at`
    ///
    /// Every attempt on an existing indicator leaves an ExecutionLog row.
    /// Failures are logged as CRITICAL with the error text and returned.
    pub async fn evaluate_at(
        &self,
        tenant_id: Uuid,
        indicator_id: Uuid,
        at: DateTime<Utc>,
        trigger: ExecutionTrigger,
    ) -> Result<IndicatorValue> {
        match self.resolve_and_insert(tenant_id, indicator_id, at, trigger).await {
            Ok(record) => {
                info!(
                    tenant_id = %tenant_id,
                    indicator_id = %indicator_id,
                    value = record.value,
                    status = %record.status,
                    trigger = %trigger,
                    "Indicator evaluated"
                );
                Ok(record)
            }
            Err(e @ Error::NotFound(_)) => Err(e),
            Err(e) => {
                if e.is_resolution_failure() {
                    warn!(
                        tenant_id = %tenant_id,
                        indicator_id = %indicator_id,
                        trigger = %trigger,
                        error = %e,
                        "Source resolution failed"
                    );
                } else {
                    error!(
                        tenant_id = %tenant_id,
                        indicator_id = %indicator_id,
                        trigger = %trigger,
                        error = %e,
                        "Indicator evaluation failed"
                    );
                }
                self.log_failure(tenant_id, indicator_id, trigger, &e).await;
                Err(e)
            }
        }
    }

    async fn resolve_and_insert(
        &self,
        tenant_id: Uuid,
        indicator_id: Uuid,
        at: DateTime<Utc>,
        trigger: ExecutionTrigger,
    ) -> Result<IndicatorValue> {
        let indicator = indicators::get_indicator(&self.db, tenant_id, indicator_id).await?;
        let links = sources::list_indicator_sources(&self.db, tenant_id, indicator_id).await?;

        let value = resolve_value(&links, self.fetcher.as_ref()).await?;

        // Automated samples are untargeted
        let status = classify(value, None, indicator.evaluation_direction);
        debug!(indicator = %indicator.code, value, %status, "Classified sample");

        values::insert_value(
            &self.db,
            tenant_id,
            indicator_id,
            &NewValue::sampled_at(value, None, at),
            status,
            Some(trigger),
        )
        .await
    }

    /// Append a CRITICAL ExecutionLog row for a failed attempt
    pub(crate) async fn log_failure(
        &self,
        tenant_id: Uuid,
        indicator_id: Uuid,
        trigger: ExecutionTrigger,
        error: &Error,
    ) {
        let log = ExecutionLog {
            id: Uuid::new_v4(),
            tenant_id,
            indicator_id,
            trigger,
            status: HealthStatus::Critical,
            indicator_value_id: None,
            message: Some(error.to_string()),
            executed_at: now(),
        };
        if let Err(log_err) = execution_log::append(&self.db, &log).await {
            warn!(indicator_id = %indicator_id, error = %log_err, "Failed to write execution log");
        }
    }

    /// Manually record an explicit period
    pub async fn record_value(&self, tenant_id: Uuid, indicator_id: Uuid, new: &NewValue) -> Result<IndicatorValue> {
        new.validate()?;
        let indicator = indicators::get_indicator(&self.db, tenant_id, indicator_id).await?;
        let status = classify(new.value, new.target, indicator.evaluation_direction);

        let record = values::insert_value(&self.db, tenant_id, indicator_id, new, status, None).await?;
        info!(
            tenant_id = %tenant_id,
            indicator = %indicator.code,
            value_id = %record.id,
            status = %status,
            "Value recorded"
        );
        Ok(record)
    }

    /// Correct a recorded period and re-classify it
    pub async fn update_value(
        &self,
        tenant_id: Uuid,
        value_id: Uuid,
        correction: &ValueCorrection,
    ) -> Result<IndicatorValue> {
        let existing = values::get_value(&self.db, tenant_id, value_id).await?;
        let indicator = indicators::get_indicator(&self.db, tenant_id, existing.indicator_id).await?;

        let corrected = correction.apply(&existing);
        let status = classify(corrected.value, corrected.target, indicator.evaluation_direction);

        let record = values::update_value(&self.db, tenant_id, &existing, &corrected, status).await?;
        info!(tenant_id = %tenant_id, value_id = %value_id, status = %status, "Value corrected");
        Ok(record)
    }

    pub async fn delete_value(&self, tenant_id: Uuid, value_id: Uuid) -> Result<()> {
        values::delete_value(&self.db, tenant_id, value_id).await?;
        info!(tenant_id = %tenant_id, value_id = %value_id, "Value deleted");
        Ok(())
    }

    /// All periods of an indicator, oldest first
    pub async fn history(&self, tenant_id: Uuid, indicator_id: Uuid) -> Result<Vec<IndicatorValue>> {
        indicators::get_indicator(&self.db, tenant_id, indicator_id).await?;
        values::list_history(&self.db, tenant_id, indicator_id).await
    }
}
