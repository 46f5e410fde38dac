//! Indicator persistence

use kpi_common::db::{EvaluationDirection, Indicator, IndicatorUnit};
use kpi_common::time::{from_db_opt, now, to_db};
use kpi_common::{Error, Result};
use serde::Deserialize;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

use super::parse_uuid;

const INDICATOR_COLUMNS: &str = "id, tenant_id, process_id, indicator_type_id, code, name, description, \
     unit, decimals, weight, evaluation_direction, frequency_days, frequency_months, active, deleted_at";

/// Indicator creation payload
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewIndicator {
    pub process_id: Uuid,
    pub indicator_type_id: Uuid,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub unit: IndicatorUnit,
    #[serde(default)]
    pub decimals: u32,
    #[serde(default)]
    pub weight: Option<f64>,
    pub evaluation_direction: EvaluationDirection,
    #[serde(default)]
    pub frequency_days: Option<u32>,
    #[serde(default)]
    pub frequency_months: Option<u32>,
    #[serde(default)]
    pub objective_ids: Vec<Uuid>,
}

/// Insert an indicator and its objective links in one transaction
///
/// Rejects configuring both `frequency_days` and `frequency_months`, and
/// weights that are negative or not finite.
pub async fn insert_indicator(pool: &SqlitePool, tenant_id: Uuid, new: &NewIndicator) -> Result<Indicator> {
    if new.frequency_days.is_some() && new.frequency_months.is_some() {
        return Err(Error::Config(format!(
            "Indicator {} sets both frequencyDays and frequencyMonths",
            new.code
        )));
    }
    if matches!(new.frequency_days, Some(0)) || matches!(new.frequency_months, Some(0)) {
        return Err(Error::InvalidInput("Frequency must be at least 1".to_string()));
    }
    if new.weight.is_some_and(|w| !w.is_finite() || w < 0.0) {
        return Err(Error::InvalidInput(format!(
            "Indicator {} weight must be a non-negative number",
            new.code
        )));
    }

    let indicator = Indicator {
        id: Uuid::new_v4(),
        tenant_id,
        process_id: new.process_id,
        indicator_type_id: new.indicator_type_id,
        code: new.code.clone(),
        name: new.name.clone(),
        description: new.description.clone(),
        unit: new.unit,
        decimals: new.decimals,
        weight: new.weight,
        evaluation_direction: new.evaluation_direction,
        frequency_days: new.frequency_days,
        frequency_months: new.frequency_months,
        active: true,
        deleted_at: None,
    };

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO indicators (
            id, tenant_id, process_id, indicator_type_id, code, name, description,
            unit, decimals, weight, evaluation_direction, frequency_days, frequency_months,
            active, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?)
        "#,
    )
    .bind(indicator.id.to_string())
    .bind(tenant_id.to_string())
    .bind(indicator.process_id.to_string())
    .bind(indicator.indicator_type_id.to_string())
    .bind(&indicator.code)
    .bind(&indicator.name)
    .bind(&indicator.description)
    .bind(indicator.unit.as_str())
    .bind(indicator.decimals as i64)
    .bind(indicator.weight)
    .bind(indicator.evaluation_direction.as_str())
    .bind(indicator.frequency_days.map(i64::from))
    .bind(indicator.frequency_months.map(i64::from))
    .bind(to_db(&now()))
    .execute(&mut *tx)
    .await?;

    for objective_id in &new.objective_ids {
        sqlx::query("INSERT INTO indicator_objectives (id, indicator_id, objective_id) VALUES (?, ?, ?)")
            .bind(Uuid::new_v4().to_string())
            .bind(indicator.id.to_string())
            .bind(objective_id.to_string())
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    tracing::debug!(tenant_id = %tenant_id, code = %indicator.code, "Indicator created");
    Ok(indicator)
}

/// Load a non-deleted indicator of a tenant
pub async fn get_indicator(pool: &SqlitePool, tenant_id: Uuid, indicator_id: Uuid) -> Result<Indicator> {
    let sql = format!(
        "SELECT {} FROM indicators WHERE id = ? AND tenant_id = ? AND deleted_at IS NULL",
        INDICATOR_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(indicator_id.to_string())
        .bind(tenant_id.to_string())
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => indicator_from_row(&row),
        None => Err(Error::NotFound(format!("Indicator {} not found", indicator_id))),
    }
}

/// Active, non-deleted indicators of a tenant ordered by code
pub async fn list_active_indicators(pool: &SqlitePool, tenant_id: Uuid) -> Result<Vec<Indicator>> {
    let sql = format!(
        "SELECT {} FROM indicators \
         WHERE tenant_id = ? AND active = 1 AND deleted_at IS NULL ORDER BY code",
        INDICATOR_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(tenant_id.to_string())
        .fetch_all(pool)
        .await?;

    rows.iter().map(indicator_from_row).collect()
}

pub async fn set_indicator_active(
    pool: &SqlitePool,
    tenant_id: Uuid,
    indicator_id: Uuid,
    active: bool,
) -> Result<()> {
    let result = sqlx::query(
        "UPDATE indicators SET active = ? WHERE id = ? AND tenant_id = ? AND deleted_at IS NULL",
    )
    .bind(active)
    .bind(indicator_id.to_string())
    .bind(tenant_id.to_string())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Indicator {} not found", indicator_id)));
    }
    Ok(())
}

/// Mark an indicator deleted; its history is kept
pub async fn soft_delete_indicator(pool: &SqlitePool, tenant_id: Uuid, indicator_id: Uuid) -> Result<()> {
    let result = sqlx::query(
        "UPDATE indicators SET deleted_at = ? WHERE id = ? AND tenant_id = ? AND deleted_at IS NULL",
    )
    .bind(to_db(&now()))
    .bind(indicator_id.to_string())
    .bind(tenant_id.to_string())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Indicator {} not found", indicator_id)));
    }
    Ok(())
}

fn indicator_from_row(row: &SqliteRow) -> Result<Indicator> {
    let unit: String = row.get("unit");
    let direction: String = row.get("evaluation_direction");
    let frequency_days: Option<i64> = row.get("frequency_days");
    let frequency_months: Option<i64> = row.get("frequency_months");

    Ok(Indicator {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        tenant_id: parse_uuid(&row.get::<String, _>("tenant_id"))?,
        process_id: parse_uuid(&row.get::<String, _>("process_id"))?,
        indicator_type_id: parse_uuid(&row.get::<String, _>("indicator_type_id"))?,
        code: row.get("code"),
        name: row.get("name"),
        description: row.get("description"),
        unit: unit.parse()?,
        decimals: row.get::<i64, _>("decimals") as u32,
        weight: row.get("weight"),
        evaluation_direction: direction.parse()?,
        frequency_days: frequency_days.map(|d| d as u32),
        frequency_months: frequency_months.map(|m| m as u32),
        active: row.get("active"),
        deleted_at: from_db_opt(row.get("deleted_at"))?,
    })
}
