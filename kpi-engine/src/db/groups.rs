//! Tenants, processes, objectives and indicator types
//!
//! Pure grouping entities; the engine only creates them for seeding and
//! reads them for rollups.

use kpi_common::db::{IndicatorType, Objective, Process, Tenant};
use kpi_common::time::{now, to_db};
use kpi_common::{Error, Result};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

use super::parse_uuid;

pub async fn insert_tenant(pool: &SqlitePool, code: &str, name: &str) -> Result<Tenant> {
    let tenant = Tenant {
        id: Uuid::new_v4(),
        code: code.to_string(),
        name: name.to_string(),
        active: true,
    };

    sqlx::query("INSERT INTO tenants (id, code, name, active, created_at) VALUES (?, ?, ?, 1, ?)")
        .bind(tenant.id.to_string())
        .bind(&tenant.code)
        .bind(&tenant.name)
        .bind(to_db(&now()))
        .execute(pool)
        .await?;

    Ok(tenant)
}

pub async fn set_tenant_active(pool: &SqlitePool, tenant_id: Uuid, active: bool) -> Result<()> {
    sqlx::query("UPDATE tenants SET active = ? WHERE id = ?")
        .bind(active)
        .bind(tenant_id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn get_tenant(pool: &SqlitePool, tenant_id: Uuid) -> Result<Tenant> {
    let row = sqlx::query("SELECT id, code, name, active FROM tenants WHERE id = ?")
        .bind(tenant_id.to_string())
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => tenant_from_row(&row),
        None => Err(Error::NotFound(format!("Tenant {} not found", tenant_id))),
    }
}

pub async fn list_active_tenants(pool: &SqlitePool) -> Result<Vec<Tenant>> {
    let rows = sqlx::query("SELECT id, code, name, active FROM tenants WHERE active = 1 ORDER BY code")
        .fetch_all(pool)
        .await?;

    rows.iter().map(tenant_from_row).collect()
}

fn tenant_from_row(row: &SqliteRow) -> Result<Tenant> {
    Ok(Tenant {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        code: row.get("code"),
        name: row.get("name"),
        active: row.get("active"),
    })
}

pub async fn insert_process(pool: &SqlitePool, tenant_id: Uuid, code: &str, name: &str) -> Result<Process> {
    let process = Process {
        id: Uuid::new_v4(),
        tenant_id,
        code: code.to_string(),
        name: name.to_string(),
        active: true,
    };

    sqlx::query(
        "INSERT INTO processes (id, tenant_id, code, name, active, created_at) VALUES (?, ?, ?, ?, 1, ?)",
    )
    .bind(process.id.to_string())
    .bind(tenant_id.to_string())
    .bind(&process.code)
    .bind(&process.name)
    .bind(to_db(&now()))
    .execute(pool)
    .await?;

    Ok(process)
}

pub async fn list_active_processes(pool: &SqlitePool, tenant_id: Uuid) -> Result<Vec<Process>> {
    let rows = sqlx::query(
        "SELECT id, tenant_id, code, name, active FROM processes \
         WHERE tenant_id = ? AND active = 1 ORDER BY name",
    )
    .bind(tenant_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(process_from_row).collect()
}

/// All processes of a tenant regardless of state, for labeling
pub async fn list_processes(pool: &SqlitePool, tenant_id: Uuid) -> Result<Vec<Process>> {
    let rows = sqlx::query(
        "SELECT id, tenant_id, code, name, active FROM processes WHERE tenant_id = ? ORDER BY name",
    )
    .bind(tenant_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(process_from_row).collect()
}

fn process_from_row(row: &SqliteRow) -> Result<Process> {
    Ok(Process {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        tenant_id: parse_uuid(&row.get::<String, _>("tenant_id"))?,
        code: row.get("code"),
        name: row.get("name"),
        active: row.get("active"),
    })
}

pub async fn insert_objective(pool: &SqlitePool, tenant_id: Uuid, code: &str, name: &str) -> Result<Objective> {
    let objective = Objective {
        id: Uuid::new_v4(),
        tenant_id,
        code: code.to_string(),
        name: name.to_string(),
        active: true,
    };

    sqlx::query(
        "INSERT INTO objectives (id, tenant_id, code, name, active, created_at) VALUES (?, ?, ?, ?, 1, ?)",
    )
    .bind(objective.id.to_string())
    .bind(tenant_id.to_string())
    .bind(&objective.code)
    .bind(&objective.name)
    .bind(to_db(&now()))
    .execute(pool)
    .await?;

    Ok(objective)
}

pub async fn list_active_objectives(pool: &SqlitePool, tenant_id: Uuid) -> Result<Vec<Objective>> {
    let rows = sqlx::query(
        "SELECT id, tenant_id, code, name, active FROM objectives \
         WHERE tenant_id = ? AND active = 1 ORDER BY name",
    )
    .bind(tenant_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(Objective {
                id: parse_uuid(&row.get::<String, _>("id"))?,
                tenant_id: parse_uuid(&row.get::<String, _>("tenant_id"))?,
                code: row.get("code"),
                name: row.get("name"),
                active: row.get("active"),
            })
        })
        .collect()
}

/// Indicator ↔ objective links of a tenant as `(indicator_id, objective)` pairs
pub async fn list_objective_links(pool: &SqlitePool, tenant_id: Uuid) -> Result<Vec<(Uuid, Objective)>> {
    let rows = sqlx::query(
        r#"
        SELECT io.indicator_id, o.id, o.tenant_id, o.code, o.name, o.active
        FROM indicator_objectives io
        JOIN objectives o ON o.id = io.objective_id
        WHERE o.tenant_id = ?
        ORDER BY o.name
        "#,
    )
    .bind(tenant_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let indicator_id = parse_uuid(&row.get::<String, _>("indicator_id"))?;
            let objective = Objective {
                id: parse_uuid(&row.get::<String, _>("id"))?,
                tenant_id: parse_uuid(&row.get::<String, _>("tenant_id"))?,
                code: row.get("code"),
                name: row.get("name"),
                active: row.get("active"),
            };
            Ok((indicator_id, objective))
        })
        .collect()
}

pub async fn insert_indicator_type(
    pool: &SqlitePool,
    tenant_id: Uuid,
    code: &str,
    name: &str,
) -> Result<IndicatorType> {
    let indicator_type = IndicatorType {
        id: Uuid::new_v4(),
        tenant_id,
        code: code.to_string(),
        name: name.to_string(),
    };

    sqlx::query("INSERT INTO indicator_types (id, tenant_id, code, name, created_at) VALUES (?, ?, ?, ?, ?)")
        .bind(indicator_type.id.to_string())
        .bind(tenant_id.to_string())
        .bind(&indicator_type.code)
        .bind(&indicator_type.name)
        .bind(to_db(&now()))
        .execute(pool)
        .await?;

    Ok(indicator_type)
}
