//! HTTP API integration tests

mod helpers;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use helpers::{setup, StubFetcher, TestEnv};
use kpi_common::db::SourceRole;
use kpi_engine::{build_router, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt;

fn app(env: &TestEnv, fetcher: Arc<StubFetcher>) -> Router {
    build_router(AppState::new(env.pool.clone(), fetcher, 2))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn test_health_endpoint() {
    let env = setup().await;
    let app = app(&env, StubFetcher::new());

    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "kpi-engine");
    assert_eq!(body["sweep_running"], false);
}

#[tokio::test]
async fn test_record_overlap_returns_conflict() {
    let env = setup().await;
    let indicator = env.weekly_indicator("OTD").await;
    let app = app(&env, StubFetcher::new());
    let uri = format!("/api/tenants/{}/indicators/{}/values", env.tenant.id, indicator.id);

    let (status, created) = send(
        &app,
        "POST",
        &uri,
        Some(json!({
            "value": 92.0,
            "target": 100.0,
            "periodStart": "2026-01-01T00:00:00Z",
            "periodEnd": "2026-01-07T00:00:00Z"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["status"], "WARNING");

    let (status, body) = send(
        &app,
        "POST",
        &uri,
        Some(json!({
            "value": 1.0,
            "periodStart": "2026-01-05T00:00:00Z",
            "periodEnd": "2026-01-10T00:00:00Z"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "OVERLAP_VIOLATION");

    let (status, history) = send(&app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_update_and_delete_value() {
    let env = setup().await;
    let indicator = env.weekly_indicator("OTD").await;
    let app = app(&env, StubFetcher::new());
    let uri = format!("/api/tenants/{}/indicators/{}/values", env.tenant.id, indicator.id);

    let (_, created) = send(
        &app,
        "POST",
        &uri,
        Some(json!({
            "value": 50.0,
            "target": 100.0,
            "periodStart": "2026-01-01T00:00:00Z",
            "periodEnd": "2026-01-07T00:00:00Z"
        })),
    )
    .await;
    let value_uri = format!(
        "/api/tenants/{}/values/{}",
        env.tenant.id,
        created["id"].as_str().unwrap()
    );

    let (status, updated) = send(&app, "PUT", &value_uri, Some(json!({ "value": 120.0 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "OK");
    assert_eq!(updated["periodEnd"], created["periodEnd"]);

    // Absent target keeps it, explicit null clears it
    let (_, updated) = send(&app, "PUT", &value_uri, Some(json!({ "value": 10.0 }))).await;
    assert_eq!(updated["target"], 100.0);
    assert_eq!(updated["status"], "CRITICAL");

    let (status, cleared) = send(&app, "PUT", &value_uri, Some(json!({ "target": null }))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(cleared["target"].is_null());
    assert_eq!(cleared["value"], 10.0);
    assert_eq!(cleared["status"], "OK");

    let (status, _) = send(&app, "DELETE", &value_uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&app, "DELETE", &value_uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let env = setup().await;
    let indicator = env.weekly_indicator("OTD").await;
    let app = app(&env, StubFetcher::new());
    let uri = format!("/api/tenants/{}/indicators/{}/values", env.tenant.id, indicator.id);

    let (status, body) = send(&app, "POST", &uri, Some(json!({ "value": "high" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_run_indicator_maps_resolution_errors() {
    let env = setup().await;
    let indicator = env.weekly_indicator("FILL").await;
    env.add_source(indicator.id, "http://erp/n", SourceRole::Numerator).await;
    env.add_source(indicator.id, "http://erp/d", SourceRole::Denominator).await;

    let fetcher = StubFetcher::new();
    fetcher.respond("http://erp/n", "10");
    fetcher.respond("http://erp/d", "0");
    let app = app(&env, fetcher.clone());
    let uri = format!("/api/tenants/{}/indicators/{}/run", env.tenant.id, indicator.id);

    let (status, body) = send(&app, "POST", &uri, None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "DIVISION_BY_ZERO");

    fetcher.respond("http://erp/d", "20");
    let (status, body) = send(&app, "POST", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["value"], 0.5);
}

#[tokio::test]
async fn test_run_unconfigured_indicator_is_unprocessable() {
    let env = setup().await;
    let indicator = env.weekly_indicator("NOSRC").await;
    let app = app(&env, StubFetcher::new());
    let uri = format!("/api/tenants/{}/indicators/{}/run", env.tenant.id, indicator.id);

    let (status, body) = send(&app, "POST", &uri, None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "CONFIGURATION_ERROR");
}

#[tokio::test]
async fn test_sweep_and_dashboard_endpoints() {
    let env = setup().await;
    let indicator = env.weekly_indicator("OTD").await;
    env.add_source(indicator.id, "http://erp/otd", SourceRole::Data).await;
    let fetcher = StubFetcher::new();
    fetcher.respond("http://erp/otd", "80");
    let app = app(&env, fetcher);

    let (status, report) = send(&app, "POST", "/api/sweep?as_of=2026-01-01T00:00:00Z", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["executed"][0], indicator.id.to_string());
    assert_eq!(report["failed"], json!([]));

    let base = format!("/api/tenants/{}/dashboard", env.tenant.id);

    let (status, overdue) = send(&app, "GET", &format!("{}/overdue?as_of=2026-01-09T00:00:00Z", base), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(overdue[0]["daysLate"], 1);
    assert_eq!(overdue[0]["expectedNext"], "2026-01-08T00:00:00Z");

    // Untargeted sample: no compliance, so the score is null rather than 0
    let (status, rollup) = send(&app, "GET", &format!("{}/rollup?group_by=process", base), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(rollup[0]["score"].is_null());
    assert_eq!(rollup[0]["status"], "NO_DATA");

    let (status, _) = send(&app, "GET", &format!("{}/rollup?group_by=region", base), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, summary) = send(&app, "GET", &format!("{}/summary", base), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["totalIndicators"], 1);
    assert_eq!(summary["ok"], 1);

    let (status, stats) = send(&app, "GET", &format!("{}/executions", base), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["totalExecutions"], 1);
    assert_eq!(stats["okExecutions"], 1);

    let (status, exec) = send(&app, "GET", &format!("{}/executive", base), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(exec["indicators"][0]["code"], "OTD");
    assert_eq!(exec["indicators"][0]["trend"], "STABLE");
}

#[tokio::test]
async fn test_unknown_tenant_rollup_not_found() {
    let env = setup().await;
    let app = app(&env, StubFetcher::new());
    let uri = format!("/api/tenants/{}/dashboard/rollup?group_by=tenant", uuid::Uuid::new_v4());

    let (status, _) = send(&app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
