//! IndicatorValue persistence
//!
//! Writers go through a transaction whose first statement updates the
//! owning indicator row. That write takes SQLite's write lock before the
//! overlap query runs, so check-then-insert is serialized against every
//! other writer (manual entry racing the sweep included).

use chrono::{DateTime, Utc};
use kpi_common::db::{ExecutionLog, ExecutionTrigger, HealthStatus, IndicatorValue};
use kpi_common::time::{from_db, is_storable, now, to_db, to_db_precision};
use kpi_common::{Error, Result};
use serde::Deserialize;
use sqlx::{sqlite::SqliteRow, Row, Sqlite, SqlitePool, Transaction};
use std::collections::HashMap;
use uuid::Uuid;

use super::{execution_log, parse_uuid};

const VALUE_COLUMNS: &str =
    "id, tenant_id, indicator_id, value, target, period_start, period_end, status, created_at";

/// A measurement period to be recorded
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewValue {
    pub value: f64,
    #[serde(default)]
    pub target: Option<f64>,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
}

impl NewValue {
    /// Instantaneous sample (`period_start == period_end == at`)
    pub fn sampled_at(value: f64, target: Option<f64>, at: DateTime<Utc>) -> Self {
        Self {
            value,
            target,
            period_start: at,
            period_end: at,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !is_storable(&self.period_start) || !is_storable(&self.period_end) {
            return Err(Error::InvalidInput("period years must be between 0000 and 9999".to_string()));
        }
        if self.period_start > self.period_end {
            return Err(Error::InvalidInput("periodStart must be before periodEnd".to_string()));
        }
        if !self.value.is_finite() || self.target.is_some_and(|t| !t.is_finite()) {
            return Err(Error::InvalidInput("value and target must be finite numbers".to_string()));
        }
        Ok(())
    }

    /// Validated copy with period bounds at storage precision
    fn normalized(&self) -> Result<Self> {
        self.validate()?;
        Ok(Self {
            period_start: to_db_precision(self.period_start),
            period_end: to_db_precision(self.period_end),
            ..self.clone()
        })
    }
}

/// Classify-and-insert a new period atomically
///
/// When `trigger` is set, the successful ExecutionLog row is written in the
/// same transaction.
pub async fn insert_value(
    pool: &SqlitePool,
    tenant_id: Uuid,
    indicator_id: Uuid,
    new: &NewValue,
    status: HealthStatus,
    trigger: Option<ExecutionTrigger>,
) -> Result<IndicatorValue> {
    let new = &new.normalized()?;

    let created_at = to_db_precision(now());
    let record = IndicatorValue {
        id: Uuid::new_v4(),
        tenant_id,
        indicator_id,
        value: new.value,
        target: new.target,
        period_start: new.period_start,
        period_end: new.period_end,
        status,
        created_at,
    };

    let mut tx = pool.begin().await?;

    lock_indicator(&mut tx, tenant_id, indicator_id).await?;
    ensure_no_overlap(&mut tx, indicator_id, new, None).await?;

    sqlx::query(
        r#"
        INSERT INTO indicator_values (
            id, tenant_id, indicator_id, value, target, period_start, period_end, status, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(record.id.to_string())
    .bind(tenant_id.to_string())
    .bind(indicator_id.to_string())
    .bind(record.value)
    .bind(record.target)
    .bind(to_db(&record.period_start))
    .bind(to_db(&record.period_end))
    .bind(record.status.as_str())
    .bind(to_db(&created_at))
    .execute(&mut *tx)
    .await?;

    if let Some(trigger) = trigger {
        let log = ExecutionLog {
            id: Uuid::new_v4(),
            tenant_id,
            indicator_id,
            trigger,
            status,
            indicator_value_id: Some(record.id),
            message: None,
            executed_at: created_at,
        };
        execution_log::append(&mut *tx, &log).await?;
    }

    tx.commit().await?;

    Ok(record)
}

/// Replace the fields of an existing period (explicit correction)
pub async fn update_value(
    pool: &SqlitePool,
    tenant_id: Uuid,
    existing: &IndicatorValue,
    corrected: &NewValue,
    status: HealthStatus,
) -> Result<IndicatorValue> {
    let corrected = &corrected.normalized()?;

    let mut tx = pool.begin().await?;

    lock_indicator(&mut tx, tenant_id, existing.indicator_id).await?;
    ensure_no_overlap(&mut tx, existing.indicator_id, corrected, Some(existing.id)).await?;

    let result = sqlx::query(
        r#"
        UPDATE indicator_values
        SET value = ?, target = ?, period_start = ?, period_end = ?, status = ?
        WHERE id = ? AND tenant_id = ?
        "#,
    )
    .bind(corrected.value)
    .bind(corrected.target)
    .bind(to_db(&corrected.period_start))
    .bind(to_db(&corrected.period_end))
    .bind(status.as_str())
    .bind(existing.id.to_string())
    .bind(tenant_id.to_string())
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("IndicatorValue {} not found", existing.id)));
    }

    tx.commit().await?;

    Ok(IndicatorValue {
        value: corrected.value,
        target: corrected.target,
        period_start: corrected.period_start,
        period_end: corrected.period_end,
        status,
        ..existing.clone()
    })
}

pub async fn delete_value(pool: &SqlitePool, tenant_id: Uuid, value_id: Uuid) -> Result<()> {
    let result = sqlx::query("DELETE FROM indicator_values WHERE id = ? AND tenant_id = ?")
        .bind(value_id.to_string())
        .bind(tenant_id.to_string())
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("IndicatorValue {} not found", value_id)));
    }
    Ok(())
}

pub async fn get_value(pool: &SqlitePool, tenant_id: Uuid, value_id: Uuid) -> Result<IndicatorValue> {
    let sql = format!("SELECT {} FROM indicator_values WHERE id = ? AND tenant_id = ?", VALUE_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(value_id.to_string())
        .bind(tenant_id.to_string())
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => value_from_row(&row),
        None => Err(Error::NotFound(format!("IndicatorValue {} not found", value_id))),
    }
}

/// All periods of an indicator ordered by `period_start` ascending
pub async fn list_history(pool: &SqlitePool, tenant_id: Uuid, indicator_id: Uuid) -> Result<Vec<IndicatorValue>> {
    let sql = format!(
        "SELECT {} FROM indicator_values WHERE indicator_id = ? AND tenant_id = ? \
         ORDER BY period_start ASC, created_at ASC",
        VALUE_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(indicator_id.to_string())
        .bind(tenant_id.to_string())
        .fetch_all(pool)
        .await?;

    rows.iter().map(value_from_row).collect()
}

/// Most recent period of an indicator by `period_end`
pub async fn latest_value(
    pool: &SqlitePool,
    tenant_id: Uuid,
    indicator_id: Uuid,
) -> Result<Option<IndicatorValue>> {
    let sql = format!(
        "SELECT {} FROM indicator_values WHERE indicator_id = ? AND tenant_id = ? \
         ORDER BY period_end DESC, created_at DESC LIMIT 1",
        VALUE_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(indicator_id.to_string())
        .bind(tenant_id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(value_from_row).transpose()
}

/// Every period of a tenant grouped by indicator, newest `period_end` first
pub async fn list_tenant_values_desc(
    pool: &SqlitePool,
    tenant_id: Uuid,
) -> Result<HashMap<Uuid, Vec<IndicatorValue>>> {
    let sql = format!(
        "SELECT {} FROM indicator_values WHERE tenant_id = ? \
         ORDER BY indicator_id, period_end DESC, created_at DESC",
        VALUE_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(tenant_id.to_string())
        .fetch_all(pool)
        .await?;

    let mut grouped: HashMap<Uuid, Vec<IndicatorValue>> = HashMap::new();
    for row in &rows {
        let value = value_from_row(row)?;
        grouped.entry(value.indicator_id).or_default().push(value);
    }
    Ok(grouped)
}

/// Latest `period_end` per indicator of a tenant
pub async fn latest_period_ends(
    pool: &SqlitePool,
    tenant_id: Uuid,
) -> Result<HashMap<Uuid, DateTime<Utc>>> {
    let rows = sqlx::query(
        "SELECT indicator_id, MAX(period_end) AS last_end FROM indicator_values \
         WHERE tenant_id = ? GROUP BY indicator_id",
    )
    .bind(tenant_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let indicator_id = parse_uuid(&row.get::<String, _>("indicator_id"))?;
            let last_end = from_db(&row.get::<String, _>("last_end"))?;
            Ok((indicator_id, last_end))
        })
        .collect()
}

/// Write-lock the indicator row; fails if it is absent, deleted or foreign
async fn lock_indicator(tx: &mut Transaction<'_, Sqlite>, tenant_id: Uuid, indicator_id: Uuid) -> Result<()> {
    let result = sqlx::query(
        "UPDATE indicators SET last_recorded_at = ? WHERE id = ? AND tenant_id = ? AND deleted_at IS NULL",
    )
    .bind(to_db(&now()))
    .bind(indicator_id.to_string())
    .bind(tenant_id.to_string())
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Indicator {} not found", indicator_id)));
    }
    Ok(())
}

async fn ensure_no_overlap(
    tx: &mut Transaction<'_, Sqlite>,
    indicator_id: Uuid,
    new: &NewValue,
    exclude: Option<Uuid>,
) -> Result<()> {
    let overlapping: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM indicator_values
        WHERE indicator_id = ?
          AND period_start <= ?
          AND period_end >= ?
          AND (? IS NULL OR id <> ?)
        "#,
    )
    .bind(indicator_id.to_string())
    .bind(to_db(&new.period_end))
    .bind(to_db(&new.period_start))
    .bind(exclude.map(|id| id.to_string()))
    .bind(exclude.map(|id| id.to_string()))
    .fetch_one(&mut **tx)
    .await?;

    if overlapping > 0 {
        return Err(Error::OverlapViolation {
            period_start: new.period_start,
            period_end: new.period_end,
        });
    }
    Ok(())
}

fn value_from_row(row: &SqliteRow) -> Result<IndicatorValue> {
    let status: String = row.get("status");
    Ok(IndicatorValue {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        tenant_id: parse_uuid(&row.get::<String, _>("tenant_id"))?,
        indicator_id: parse_uuid(&row.get::<String, _>("indicator_id"))?,
        value: row.get("value"),
        target: row.get("target"),
        period_start: from_db(&row.get::<String, _>("period_start"))?,
        period_end: from_db(&row.get::<String, _>("period_end"))?,
        status: status.parse()?,
        created_at: from_db(&row.get::<String, _>("created_at"))?,
    })
}
