//! Indicator execution and due sweep endpoints

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Utc};
use kpi_common::db::IndicatorValue;
use kpi_common::time::now;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::schedule::SweepReport;
use crate::{ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct AsOfQuery {
    /// RFC 3339 instant; defaults to now
    pub as_of: Option<DateTime<Utc>>,
}

impl AsOfQuery {
    pub fn instant(&self) -> DateTime<Utc> {
        self.as_of.unwrap_or_else(now)
    }
}

/// POST /api/tenants/:tenant_id/indicators/:indicator_id/run
pub async fn run_indicator(
    State(state): State<AppState>,
    Path((tenant_id, indicator_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<IndicatorValue>> {
    let value = state.evaluator.evaluate_and_record(tenant_id, indicator_id).await?;
    Ok(Json(value))
}

/// POST /api/sweep?as_of=
///
/// Responds 409 while another sweep is running.
pub async fn run_sweep(
    State(state): State<AppState>,
    query: Result<Query<AsOfQuery>, QueryRejection>,
) -> ApiResult<Json<SweepReport>> {
    let Query(query) = query?;
    let as_of = query.instant();
    info!(as_of = %as_of, "Due sweep requested via API");

    let report = state.scheduler.run_due_sweep(as_of).await?;
    Ok(Json(report))
}

pub fn execution_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/tenants/:tenant_id/indicators/:indicator_id/run",
            post(run_indicator),
        )
        .route("/api/sweep", post(run_sweep))
}
