//! Test Helper Utilities
//!
//! Temporary database, seeding shortcuts and a scripted source fetcher
//! shared by the kpi-engine integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use kpi_common::db::{
    EvaluationDirection, HttpMethod, Indicator, IndicatorUnit, Process, Source, SourceRole, Tenant,
};
use kpi_common::{Error, Result};
use kpi_engine::db::indicators::{insert_indicator, NewIndicator};
use kpi_engine::db::sources::{attach_source, insert_source, NewSource};
use kpi_engine::db::{groups, init_database};
use kpi_engine::services::Evaluator;
use kpi_engine::sources::SourceFetcher;
use sqlx::SqlitePool;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;

/// Midnight UTC of a calendar day
pub fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

/// One tenant with a process and an indicator type, on a temporary database
///
/// `_dir` must be kept alive for the duration of the test.
pub struct TestEnv {
    pub _dir: TempDir,
    pub pool: SqlitePool,
    pub tenant: Tenant,
    pub process: Process,
    pub indicator_type_id: Uuid,
}

pub async fn setup() -> TestEnv {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("kpi.db")).await.unwrap();

    let tenant = groups::insert_tenant(&pool, "ACME", "Acme Corp").await.unwrap();
    let process = groups::insert_process(&pool, tenant.id, "OPS", "Operations").await.unwrap();
    let indicator_type = groups::insert_indicator_type(&pool, tenant.id, "EFF", "Efficiency")
        .await
        .unwrap();

    TestEnv {
        _dir: dir,
        pool,
        tenant,
        process,
        indicator_type_id: indicator_type.id,
    }
}

impl TestEnv {
    pub fn new_indicator(&self, code: &str) -> NewIndicator {
        NewIndicator {
            process_id: self.process.id,
            indicator_type_id: self.indicator_type_id,
            code: code.to_string(),
            name: format!("Indicator {}", code),
            description: None,
            unit: IndicatorUnit::Number,
            decimals: 2,
            weight: None,
            evaluation_direction: EvaluationDirection::HigherIsBetter,
            frequency_days: None,
            frequency_months: None,
            objective_ids: Vec::new(),
        }
    }

    pub async fn add_indicator(&self, new: NewIndicator) -> Indicator {
        insert_indicator(&self.pool, self.tenant.id, &new).await.unwrap()
    }

    /// Weekly, higher-is-better indicator
    pub async fn weekly_indicator(&self, code: &str) -> Indicator {
        self.add_indicator(NewIndicator {
            frequency_days: Some(7),
            ..self.new_indicator(code)
        })
        .await
    }

    pub async fn add_source(&self, indicator_id: Uuid, endpoint: &str, role: SourceRole) -> Source {
        let source = insert_source(
            &self.pool,
            self.tenant.id,
            &NewSource {
                name: endpoint.to_string(),
                description: None,
                endpoint: endpoint.to_string(),
                method: HttpMethod::Get,
                headers: BTreeMap::new(),
                query_params: BTreeMap::new(),
                body_template: None,
                timeout_ms: None,
                active: None,
            },
        )
        .await
        .unwrap();
        attach_source(&self.pool, self.tenant.id, indicator_id, source.id, role)
            .await
            .unwrap();
        source
    }

    pub fn evaluator(&self, fetcher: Arc<StubFetcher>) -> Evaluator {
        Evaluator::new(self.pool.clone(), fetcher)
    }

    pub async fn count_values(&self, indicator_id: Uuid) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM indicator_values WHERE indicator_id = ?")
            .bind(indicator_id.to_string())
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }
}

#[derive(Clone)]
enum Reply {
    Body(String),
    Down,
}

/// Source fetcher answering from a table keyed by endpoint
///
/// Unknown endpoints fail with a transport error.
#[derive(Default)]
pub struct StubFetcher {
    replies: Mutex<HashMap<String, Reply>>,
    delay: Option<Duration>,
    calls: Mutex<usize>,
}

impl StubFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every call sleeps `delay` before answering
    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::default()
        })
    }

    pub fn respond(&self, endpoint: &str, body: &str) {
        self.replies
            .lock()
            .unwrap()
            .insert(endpoint.to_string(), Reply::Body(body.to_string()));
    }

    pub fn take_down(&self, endpoint: &str) {
        self.replies.lock().unwrap().insert(endpoint.to_string(), Reply::Down);
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl SourceFetcher for StubFetcher {
    async fn fetch(&self, source: &Source) -> Result<String> {
        *self.calls.lock().unwrap() += 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let reply = self.replies.lock().unwrap().get(&source.endpoint).cloned();
        match reply {
            Some(Reply::Body(body)) => Ok(body),
            Some(Reply::Down) | None => Err(Error::Transport {
                source_id: source.id.to_string(),
                message: "connection refused".to_string(),
            }),
        }
    }
}
