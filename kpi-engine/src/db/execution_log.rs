//! Append-only execution audit log

use kpi_common::db::{ExecutionLog, HealthStatus};
use kpi_common::time::{from_db, to_db};
use kpi_common::Result;
use serde::Serialize;
use sqlx::{Row, Sqlite, SqlitePool};
use uuid::Uuid;

use super::{parse_uuid, parse_uuid_opt};

/// Per-tenant execution counts by outcome
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStats {
    pub total_executions: i64,
    pub ok_executions: i64,
    pub warning_executions: i64,
    pub critical_executions: i64,
}

/// Append one log row through any executor (pool or open transaction)
pub async fn append<'e, E>(executor: E, log: &ExecutionLog) -> Result<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO execution_logs (
            id, tenant_id, indicator_id, trigger_kind, status, indicator_value_id, message, executed_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(log.id.to_string())
    .bind(log.tenant_id.to_string())
    .bind(log.indicator_id.to_string())
    .bind(log.trigger.as_str())
    .bind(log.status.as_str())
    .bind(log.indicator_value_id.map(|id| id.to_string()))
    .bind(&log.message)
    .bind(to_db(&log.executed_at))
    .execute(executor)
    .await?;

    Ok(())
}

pub async fn stats(pool: &SqlitePool, tenant_id: Uuid) -> Result<ExecutionStats> {
    let rows = sqlx::query(
        "SELECT status, COUNT(*) AS n FROM execution_logs WHERE tenant_id = ? GROUP BY status",
    )
    .bind(tenant_id.to_string())
    .fetch_all(pool)
    .await?;

    let mut stats = ExecutionStats::default();
    for row in &rows {
        let status: String = row.get("status");
        let n: i64 = row.get("n");
        stats.total_executions += n;
        match status.parse::<HealthStatus>()? {
            HealthStatus::Ok => stats.ok_executions += n,
            HealthStatus::Warning => stats.warning_executions += n,
            HealthStatus::Critical => stats.critical_executions += n,
        }
    }
    Ok(stats)
}

/// Log rows of one indicator, newest first
pub async fn list_for_indicator(
    pool: &SqlitePool,
    tenant_id: Uuid,
    indicator_id: Uuid,
) -> Result<Vec<ExecutionLog>> {
    let rows = sqlx::query(
        r#"
        SELECT id, tenant_id, indicator_id, trigger_kind, status, indicator_value_id, message, executed_at
        FROM execution_logs
        WHERE tenant_id = ? AND indicator_id = ?
        ORDER BY executed_at DESC
        "#,
    )
    .bind(tenant_id.to_string())
    .bind(indicator_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let trigger: String = row.get("trigger_kind");
            let status: String = row.get("status");
            Ok(ExecutionLog {
                id: parse_uuid(&row.get::<String, _>("id"))?,
                tenant_id: parse_uuid(&row.get::<String, _>("tenant_id"))?,
                indicator_id: parse_uuid(&row.get::<String, _>("indicator_id"))?,
                trigger: trigger.parse()?,
                status: status.parse()?,
                indicator_value_id: parse_uuid_opt(row.get("indicator_value_id"))?,
                message: row.get("message"),
                executed_at: from_db(&row.get::<String, _>("executed_at"))?,
            })
        })
        .collect()
}
