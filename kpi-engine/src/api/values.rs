//! Manual value entry, correction and history

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use kpi_common::db::IndicatorValue;
use uuid::Uuid;

use crate::db::values::NewValue;
use crate::services::ValueCorrection;
use crate::{ApiResult, AppState};

/// GET /api/tenants/:tenant_id/indicators/:indicator_id/values
pub async fn list_values(
    State(state): State<AppState>,
    Path((tenant_id, indicator_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<Vec<IndicatorValue>>> {
    Ok(Json(state.evaluator.history(tenant_id, indicator_id).await?))
}

/// POST /api/tenants/:tenant_id/indicators/:indicator_id/values
///
/// 409 when the period overlaps an existing one.
pub async fn record_value(
    State(state): State<AppState>,
    Path((tenant_id, indicator_id)): Path<(Uuid, Uuid)>,
    payload: Result<Json<NewValue>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<IndicatorValue>)> {
    let Json(new) = payload?;
    let record = state.evaluator.record_value(tenant_id, indicator_id, &new).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// PUT /api/tenants/:tenant_id/values/:value_id
pub async fn update_value(
    State(state): State<AppState>,
    Path((tenant_id, value_id)): Path<(Uuid, Uuid)>,
    payload: Result<Json<ValueCorrection>, JsonRejection>,
) -> ApiResult<Json<IndicatorValue>> {
    let Json(correction) = payload?;
    Ok(Json(state.evaluator.update_value(tenant_id, value_id, &correction).await?))
}

/// DELETE /api/tenants/:tenant_id/values/:value_id
pub async fn delete_value(
    State(state): State<AppState>,
    Path((tenant_id, value_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    state.evaluator.delete_value(tenant_id, value_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn value_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/tenants/:tenant_id/indicators/:indicator_id/values",
            get(list_values).post(record_value),
        )
        .route(
            "/api/tenants/:tenant_id/values/:value_id",
            put(update_value).delete(delete_value),
        )
}
