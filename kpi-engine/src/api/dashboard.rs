//! Dashboard read endpoints

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use super::execution::AsOfQuery;
use crate::services::dashboard::{self, ExecutionStats, ExecutiveDashboard, GroupBy, OverdueEntry, RollupEntry, Summary};
use crate::{ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct RollupQuery {
    #[serde(default = "default_group_by")]
    pub group_by: GroupBy,
}

fn default_group_by() -> GroupBy {
    GroupBy::Tenant
}

/// GET /api/tenants/:tenant_id/dashboard/summary
pub async fn get_summary(State(state): State<AppState>, Path(tenant_id): Path<Uuid>) -> ApiResult<Json<Summary>> {
    Ok(Json(dashboard::summary(&state.db, tenant_id).await?))
}

/// GET /api/tenants/:tenant_id/dashboard/executive
pub async fn get_executive(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> ApiResult<Json<ExecutiveDashboard>> {
    Ok(Json(dashboard::executive(&state.db, tenant_id).await?))
}

/// GET /api/tenants/:tenant_id/dashboard/rollup?group_by=process|objective|tenant
pub async fn get_rollup(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
    query: Result<Query<RollupQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<RollupEntry>>> {
    let Query(query) = query?;
    Ok(Json(dashboard::compute_rollup(&state.db, tenant_id, query.group_by).await?))
}

/// GET /api/tenants/:tenant_id/dashboard/overdue?as_of=
pub async fn get_overdue(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
    query: Result<Query<AsOfQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<OverdueEntry>>> {
    let Query(query) = query?;
    Ok(Json(dashboard::overdue(&state.db, tenant_id, query.instant()).await?))
}

/// GET /api/tenants/:tenant_id/dashboard/executions
pub async fn get_execution_stats(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> ApiResult<Json<ExecutionStats>> {
    Ok(Json(dashboard::execution_stats(&state.db, tenant_id).await?))
}

pub fn dashboard_routes() -> Router<AppState> {
    Router::new()
        .route("/api/tenants/:tenant_id/dashboard/summary", get(get_summary))
        .route("/api/tenants/:tenant_id/dashboard/executive", get(get_executive))
        .route("/api/tenants/:tenant_id/dashboard/rollup", get(get_rollup))
        .route("/api/tenants/:tenant_id/dashboard/overdue", get(get_overdue))
        .route("/api/tenants/:tenant_id/dashboard/executions", get(get_execution_stats))
}
