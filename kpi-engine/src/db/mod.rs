//! Persistence boundary
//!
//! Free functions over `SqlitePool`. Every query is scoped by tenant.

pub mod execution_log;
pub mod groups;
pub mod indicators;
pub mod sources;
pub mod values;

use kpi_common::{Error, Result};
use uuid::Uuid;

pub use kpi_common::db::init_database;

/// Parse a TEXT id column
pub(crate) fn parse_uuid(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| Error::Internal(format!("Failed to parse id {:?}: {}", raw, e)))
}

/// Parse an optional TEXT id column
pub(crate) fn parse_uuid_opt(raw: Option<String>) -> Result<Option<Uuid>> {
    raw.as_deref().map(parse_uuid).transpose()
}
