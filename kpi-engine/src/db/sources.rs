//! Source and source-attachment persistence

use kpi_common::db::{HttpMethod, IndicatorSource, Source, SourceRole};
use kpi_common::time::{now, to_db};
use kpi_common::{Error, Result};
use serde::Deserialize;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::parse_uuid;

/// Timeout applied when a source does not configure one
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Source creation payload
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSource {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub endpoint: String,
    pub method: HttpMethod,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub query_params: BTreeMap<String, String>,
    #[serde(default)]
    pub body_template: Option<serde_json::Value>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub active: Option<bool>,
}

pub async fn insert_source(pool: &SqlitePool, tenant_id: Uuid, new: &NewSource) -> Result<Source> {
    if new.timeout_ms == Some(0) {
        return Err(Error::InvalidInput("Source timeout must be positive".to_string()));
    }

    let source = Source {
        id: Uuid::new_v4(),
        tenant_id,
        name: new.name.clone(),
        description: new.description.clone(),
        endpoint: new.endpoint.clone(),
        method: new.method,
        headers: new.headers.clone(),
        query_params: new.query_params.clone(),
        body_template: new.body_template.clone(),
        timeout_ms: new.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS),
        active: new.active.unwrap_or(true),
    };

    let headers = to_json(&source.headers)?;
    let query_params = to_json(&source.query_params)?;
    let body_template = source.body_template.as_ref().map(to_json).transpose()?;

    sqlx::query(
        r#"
        INSERT INTO sources (
            id, tenant_id, name, description, endpoint, method, headers,
            query_params, body_template, timeout_ms, active, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(source.id.to_string())
    .bind(tenant_id.to_string())
    .bind(&source.name)
    .bind(&source.description)
    .bind(&source.endpoint)
    .bind(source.method.as_str())
    .bind(headers)
    .bind(query_params)
    .bind(body_template)
    .bind(source.timeout_ms as i64)
    .bind(source.active)
    .bind(to_db(&now()))
    .execute(pool)
    .await?;

    Ok(source)
}

/// Attach a source to an indicator with a role
///
/// Both must belong to the tenant. Role consistency is checked at resolution
/// time, so incomplete configurations can be built up step by step.
pub async fn attach_source(
    pool: &SqlitePool,
    tenant_id: Uuid,
    indicator_id: Uuid,
    source_id: Uuid,
    role: SourceRole,
) -> Result<Uuid> {
    let owned: i64 = sqlx::query_scalar(
        r#"
        SELECT
            (SELECT COUNT(*) FROM indicators WHERE id = ? AND tenant_id = ? AND deleted_at IS NULL)
          + (SELECT COUNT(*) FROM sources WHERE id = ? AND tenant_id = ?)
        "#,
    )
    .bind(indicator_id.to_string())
    .bind(tenant_id.to_string())
    .bind(source_id.to_string())
    .bind(tenant_id.to_string())
    .fetch_one(pool)
    .await?;

    if owned != 2 {
        return Err(Error::NotFound(format!(
            "Indicator {} or source {} not found",
            indicator_id, source_id
        )));
    }

    let link_id = Uuid::new_v4();
    sqlx::query("INSERT INTO indicator_sources (id, indicator_id, source_id, role) VALUES (?, ?, ?, ?)")
        .bind(link_id.to_string())
        .bind(indicator_id.to_string())
        .bind(source_id.to_string())
        .bind(role.as_str())
        .execute(pool)
        .await?;

    Ok(link_id)
}

/// Sources attached to an indicator, with their roles
pub async fn list_indicator_sources(
    pool: &SqlitePool,
    tenant_id: Uuid,
    indicator_id: Uuid,
) -> Result<Vec<IndicatorSource>> {
    let rows = sqlx::query(
        r#"
        SELECT l.id AS link_id, l.indicator_id, l.role,
               s.id, s.tenant_id, s.name, s.description, s.endpoint, s.method,
               s.headers, s.query_params, s.body_template, s.timeout_ms, s.active
        FROM indicator_sources l
        JOIN sources s ON s.id = l.source_id
        WHERE l.indicator_id = ? AND s.tenant_id = ?
        ORDER BY l.role, s.name
        "#,
    )
    .bind(indicator_id.to_string())
    .bind(tenant_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let role: String = row.get("role");
            Ok(IndicatorSource {
                id: parse_uuid(&row.get::<String, _>("link_id"))?,
                indicator_id: parse_uuid(&row.get::<String, _>("indicator_id"))?,
                role: role.parse()?,
                source: source_from_row(row)?,
            })
        })
        .collect()
}

fn source_from_row(row: &SqliteRow) -> Result<Source> {
    let method: String = row.get("method");
    let headers: String = row.get("headers");
    let query_params: String = row.get("query_params");
    let body_template: Option<String> = row.get("body_template");

    Ok(Source {
        id: parse_uuid(&row.get::<String, _>("id"))?,
        tenant_id: parse_uuid(&row.get::<String, _>("tenant_id"))?,
        name: row.get("name"),
        description: row.get("description"),
        endpoint: row.get("endpoint"),
        method: method.parse()?,
        headers: from_json(&headers)?,
        query_params: from_json(&query_params)?,
        body_template: body_template.as_deref().map(from_json).transpose()?,
        timeout_ms: row.get::<i64, _>("timeout_ms") as u64,
        active: row.get("active"),
    })
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| Error::Internal(format!("Failed to serialize: {}", e)))
}

fn from_json<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T> {
    serde_json::from_str(raw).map_err(|e| Error::Internal(format!("Failed to deserialize: {}", e)))
}
