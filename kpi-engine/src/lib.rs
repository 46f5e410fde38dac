//! kpi-engine library interface
//!
//! KPI evaluation and scoring: classification, compliance and trend,
//! weighted rollups, due-date scheduling and source resolution, plus the
//! HTTP surface that exposes them.

pub mod api;
pub mod db;
pub mod error;
pub mod schedule;
pub mod scoring;
pub mod services;
pub mod sources;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::schedule::Scheduler;
use crate::services::Evaluator;
use crate::sources::SourceFetcher;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub evaluator: Evaluator,
    pub scheduler: Arc<Scheduler>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool, fetcher: Arc<dyn SourceFetcher>, workers: usize) -> Self {
        let evaluator = Evaluator::new(db.clone(), fetcher);
        let scheduler = Arc::new(Scheduler::new(evaluator.clone(), workers));
        Self {
            db,
            evaluator,
            scheduler,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::execution_routes())
        .merge(api::value_routes())
        .merge(api::dashboard_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
