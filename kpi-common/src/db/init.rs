//! Database initialization
//!
//! Opens (or creates) the SQLite database and creates the schema.
//! Every statement is idempotent, so this is safe on every startup.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        // Per-connection pragmas
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
                sqlx::query("PRAGMA busy_timeout = 5000").execute(&mut *conn).await?;
                Ok(())
            })
        })
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL lets dashboard readers proceed while the sweep writes
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables and indexes
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_tenants_table(pool).await?;
    create_processes_table(pool).await?;
    create_objectives_table(pool).await?;
    create_indicator_types_table(pool).await?;
    create_indicators_table(pool).await?;
    create_indicator_objectives_table(pool).await?;
    create_sources_table(pool).await?;
    create_indicator_sources_table(pool).await?;
    create_indicator_values_table(pool).await?;
    create_execution_logs_table(pool).await?;

    info!("Database schema ready");
    Ok(())
}

async fn create_tenants_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tenants (
            id TEXT PRIMARY KEY,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_processes_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS processes (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL REFERENCES tenants(id),
            code TEXT NOT NULL,
            name TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            UNIQUE (tenant_id, code)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_objectives_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS objectives (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL REFERENCES tenants(id),
            code TEXT NOT NULL,
            name TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            UNIQUE (tenant_id, code)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_indicator_types_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS indicator_types (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL REFERENCES tenants(id),
            code TEXT NOT NULL,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE (tenant_id, code)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_indicators_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS indicators (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL REFERENCES tenants(id),
            process_id TEXT NOT NULL REFERENCES processes(id),
            indicator_type_id TEXT NOT NULL REFERENCES indicator_types(id),
            code TEXT NOT NULL,
            name TEXT NOT NULL,
            description TEXT,
            unit TEXT NOT NULL CHECK (unit IN ('NUMBER', 'PERCENT')),
            decimals INTEGER NOT NULL DEFAULT 0 CHECK (decimals >= 0),
            weight REAL CHECK (weight IS NULL OR weight >= 0),
            evaluation_direction TEXT NOT NULL
                CHECK (evaluation_direction IN ('HIGHER_IS_BETTER', 'LOWER_IS_BETTER')),
            frequency_days INTEGER CHECK (frequency_days IS NULL OR frequency_days >= 1),
            frequency_months INTEGER CHECK (frequency_months IS NULL OR frequency_months >= 1),
            active INTEGER NOT NULL DEFAULT 1,
            deleted_at TEXT,
            last_recorded_at TEXT,
            created_at TEXT NOT NULL,
            UNIQUE (tenant_id, code)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_indicators_process ON indicators(process_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_indicator_objectives_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS indicator_objectives (
            id TEXT PRIMARY KEY,
            indicator_id TEXT NOT NULL REFERENCES indicators(id) ON DELETE CASCADE,
            objective_id TEXT NOT NULL REFERENCES objectives(id) ON DELETE CASCADE,
            UNIQUE (indicator_id, objective_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_sources_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sources (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL REFERENCES tenants(id),
            name TEXT NOT NULL,
            description TEXT,
            endpoint TEXT NOT NULL,
            method TEXT NOT NULL CHECK (method IN ('GET', 'POST', 'PUT', 'PATCH', 'DELETE')),
            headers TEXT NOT NULL DEFAULT '{}',
            query_params TEXT NOT NULL DEFAULT '{}',
            body_template TEXT,
            timeout_ms INTEGER NOT NULL DEFAULT 5000 CHECK (timeout_ms >= 1),
            active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_indicator_sources_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS indicator_sources (
            id TEXT PRIMARY KEY,
            indicator_id TEXT NOT NULL REFERENCES indicators(id) ON DELETE CASCADE,
            source_id TEXT NOT NULL REFERENCES sources(id) ON DELETE CASCADE,
            role TEXT NOT NULL CHECK (role IN ('DATA', 'NUMERATOR', 'DENOMINATOR')),
            UNIQUE (indicator_id, source_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_indicator_values_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS indicator_values (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL REFERENCES tenants(id),
            indicator_id TEXT NOT NULL REFERENCES indicators(id) ON DELETE CASCADE,
            value REAL NOT NULL,
            target REAL,
            period_start TEXT NOT NULL,
            period_end TEXT NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('OK', 'WARNING', 'CRITICAL')),
            created_at TEXT NOT NULL,
            CHECK (period_start <= period_end)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_indicator_values_period \
         ON indicator_values(indicator_id, period_end)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_execution_logs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS execution_logs (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL REFERENCES tenants(id),
            indicator_id TEXT NOT NULL,
            trigger_kind TEXT NOT NULL CHECK (trigger_kind IN ('MANUAL', 'SCHEDULED')),
            status TEXT NOT NULL CHECK (status IN ('OK', 'WARNING', 'CRITICAL')),
            indicator_value_id TEXT,
            message TEXT,
            executed_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_execution_logs_tenant \
         ON execution_logs(tenant_id, status)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
