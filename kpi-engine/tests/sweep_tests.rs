//! Due sweep: selection of due indicators, failure isolation and the
//! non-overlap guard.

mod helpers;

use helpers::{at, setup, StubFetcher};
use kpi_common::db::{ExecutionTrigger, HealthStatus, SourceRole};
use kpi_common::{Error, ErrorKind};
use kpi_engine::db::values::NewValue;
use kpi_engine::db::{execution_log, groups, indicators};
use kpi_engine::schedule::Scheduler;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_sweep_evaluates_only_due_indicators() {
    let env = setup().await;
    let fetcher = StubFetcher::new();
    let evaluator = env.evaluator(fetcher.clone());

    let due = env.weekly_indicator("DUE").await;
    let fresh = env.weekly_indicator("FRESH").await;
    let never = env.weekly_indicator("NEVER").await;
    let manual_only = env.add_indicator(env.new_indicator("MANUAL")).await;

    for (indicator, endpoint) in [
        (&due, "http://src/due"),
        (&fresh, "http://src/fresh"),
        (&never, "http://src/never"),
        (&manual_only, "http://src/manual"),
    ] {
        env.add_source(indicator.id, endpoint, SourceRole::Data).await;
        fetcher.respond(endpoint, "42");
    }

    let week = |start: u32, end: u32| NewValue {
        value: 1.0,
        target: None,
        period_start: at(2026, 1, start),
        period_end: at(2026, 1, end),
    };
    // expected next 2026-01-08, sweep on 01-09
    evaluator.record_value(env.tenant.id, due.id, &week(1, 1)).await.unwrap();
    // expected next 2026-01-14
    evaluator.record_value(env.tenant.id, fresh.id, &week(1, 7)).await.unwrap();

    let scheduler = Scheduler::new(evaluator, 4);
    let report = scheduler.run_due_sweep(at(2026, 1, 9)).await.unwrap();

    let mut executed = report.executed.clone();
    executed.sort();
    let mut expected = vec![due.id, never.id];
    expected.sort();
    assert_eq!(executed, expected);
    assert!(report.failed.is_empty());

    assert_eq!(env.count_values(fresh.id).await, 1);
    assert_eq!(env.count_values(manual_only.id).await, 0);

    let logs = execution_log::list_for_indicator(&env.pool, env.tenant.id, due.id).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].trigger, ExecutionTrigger::Scheduled);
}

#[tokio::test]
async fn test_failure_does_not_abort_sweep() {
    let env = setup().await;
    let fetcher = StubFetcher::new();

    let broken = env.weekly_indicator("BROKEN").await;
    let bad_body = env.weekly_indicator("GARBAGE").await;
    let unconfigured = env.weekly_indicator("NOSRC").await;
    let healthy = env.weekly_indicator("HEALTHY").await;

    env.add_source(broken.id, "http://src/down", SourceRole::Data).await;
    fetcher.take_down("http://src/down");
    env.add_source(bad_body.id, "http://src/garbage", SourceRole::Data).await;
    fetcher.respond("http://src/garbage", "{\"value\": 3}");
    env.add_source(healthy.id, "http://src/ok", SourceRole::Data).await;
    fetcher.respond("http://src/ok", "7");

    let scheduler = Scheduler::new(env.evaluator(fetcher), 2);
    let report = scheduler.run_due_sweep(at(2026, 1, 9)).await.unwrap();

    assert_eq!(report.executed, vec![healthy.id]);

    let kind_of = |id| {
        report
            .failed
            .iter()
            .find(|f| f.indicator_id == id)
            .map(|f| f.error_kind)
    };
    assert_eq!(kind_of(broken.id), Some(ErrorKind::TransportError));
    assert_eq!(kind_of(bad_body.id), Some(ErrorKind::InvalidSourceResponse));
    assert_eq!(kind_of(unconfigured.id), Some(ErrorKind::ConfigurationError));

    let logs = execution_log::list_for_indicator(&env.pool, env.tenant.id, broken.id).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, HealthStatus::Critical);
    assert_eq!(env.count_values(broken.id).await, 0);
}

#[tokio::test]
async fn test_sweep_skips_inactive_tenants_and_indicators() {
    let env = setup().await;
    let fetcher = StubFetcher::new();

    let paused = env.weekly_indicator("PAUSED").await;
    env.add_source(paused.id, "http://src/paused", SourceRole::Data).await;
    fetcher.respond("http://src/paused", "1");
    indicators::set_indicator_active(&env.pool, env.tenant.id, paused.id, false).await.unwrap();

    let deleted = env.weekly_indicator("GONE").await;
    env.add_source(deleted.id, "http://src/gone", SourceRole::Data).await;
    fetcher.respond("http://src/gone", "1");
    indicators::soft_delete_indicator(&env.pool, env.tenant.id, deleted.id).await.unwrap();

    let scheduler = Scheduler::new(env.evaluator(fetcher.clone()), 1);
    let report = scheduler.run_due_sweep(at(2026, 1, 9)).await.unwrap();
    assert!(report.executed.is_empty());

    let live = env.weekly_indicator("LIVE").await;
    env.add_source(live.id, "http://src/live", SourceRole::Data).await;
    fetcher.respond("http://src/live", "1");
    groups::set_tenant_active(&env.pool, env.tenant.id, false).await.unwrap();

    let report = scheduler.run_due_sweep(at(2026, 1, 9)).await.unwrap();
    assert!(report.executed.is_empty());
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn test_second_sweep_rejected_while_running() {
    let env = setup().await;
    let fetcher = StubFetcher::slow(Duration::from_millis(300));

    let indicator = env.weekly_indicator("SLOW").await;
    env.add_source(indicator.id, "http://src/slow", SourceRole::Data).await;
    fetcher.respond("http://src/slow", "5");

    let scheduler = Arc::new(Scheduler::new(env.evaluator(fetcher), 1));

    let first = {
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move { scheduler.run_due_sweep(at(2026, 1, 9)).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(scheduler.is_running());
    let err = scheduler.run_due_sweep(at(2026, 1, 9)).await.unwrap_err();
    assert!(matches!(err, Error::SweepInProgress));

    let report = first.await.unwrap().unwrap();
    assert_eq!(report.executed, vec![indicator.id]);
    assert!(!scheduler.is_running());

    // Guard released: the next sweep runs and finds nothing due
    let report = scheduler.run_due_sweep(at(2026, 1, 10)).await.unwrap();
    assert!(report.executed.is_empty());
}

#[tokio::test]
async fn test_sweep_sample_uses_as_of_instant() {
    let env = setup().await;
    let fetcher = StubFetcher::new();
    let indicator = env.weekly_indicator("OTD").await;
    env.add_source(indicator.id, "http://src/otd", SourceRole::Data).await;
    fetcher.respond("http://src/otd", "12.5");

    let scheduler = Scheduler::new(env.evaluator(fetcher), 1);
    scheduler.run_due_sweep(at(2026, 2, 1)).await.unwrap();

    let latest = kpi_engine::db::values::latest_value(&env.pool, env.tenant.id, indicator.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.period_start, at(2026, 2, 1));
    assert_eq!(latest.period_end, at(2026, 2, 1));
    assert_eq!(latest.value, 12.5);
}
