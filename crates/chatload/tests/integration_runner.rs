//! Integration tests for the virtual-user scheduler and run aggregation

use std::sync::Arc;
use std::time::Duration;

use chatload::config::{RunConfig, ScenarioConfig, ThresholdConfig};
use chatload::labels;
use chatload::testing::ScriptedApi;
use chatload::{IterationOutcome, LoadTestRunner, RunGate, VirtualUserScenario};
use tokio::time::Instant;

fn completing_api() -> Arc<ScriptedApi> {
    Arc::new(
        ScriptedApi::new()
            .submit_fallback(202, r#"{"id":"j1","status_url":"status/j1"}"#)
            .status_fallback(
                200,
                r#"{"chat_id":"c1","result":{"status":"COMPLETE","rag_response":{"answer":"hello world"}}}"#,
            ),
    )
}

#[tokio::test(start_paused = true)]
async fn test_iteration_cap_per_user() {
    let api = completing_api();
    let scenario = VirtualUserScenario::new(api.clone(), &ScenarioConfig::default());
    let runner = LoadTestRunner::new(4, Duration::from_secs(1), scenario);

    let metrics = runner
        .run(Arc::new(RunGate::new(None, Some(3))))
        .await
        .unwrap();

    assert_eq!(metrics.iterations(), 12);
    assert_eq!(metrics.outcome_count(IterationOutcome::Completed), 12);
    assert_eq!(api.submit_calls(), 12);
    assert_eq!(api.status_calls().len(), 12);
    assert_eq!(metrics.check(labels::HAS_ANSWER_TEXT).passes, 12);
    assert_eq!(metrics.check(labels::HAS_ANSWER_TEXT).fails, 0);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_stops_new_iterations_only() {
    let api = completing_api();
    let scenario = VirtualUserScenario::new(api.clone(), &ScenarioConfig::default());
    let runner = LoadTestRunner::new(2, Duration::from_secs(1), scenario);
    let run = RunConfig {
        vus: 2,
        duration_secs: 5,
        iterations: None,
    };

    let start = Instant::now();
    let metrics = runner
        .run(Arc::new(RunGate::from_config(&run, start)))
        .await
        .unwrap();

    // Each iteration takes 2s polling + 1s pause: starts at 0s and 3s, the second
    // finishes past the 5s deadline.
    assert_eq!(metrics.iterations(), 4);
    assert!(start.elapsed() >= Duration::from_secs(6));

    let summary = metrics.summary();
    assert_eq!(summary.vus, 2);
    assert_eq!(summary.check_pass_rate, 1.0);
    assert_eq!(summary.http_requests, 8);
    assert!(summary.check_thresholds(&ThresholdConfig {
        min_check_pass_rate: Some(0.99),
        max_status_p99_ms: None,
    })
    .passes);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_users_skip_pause() {
    let api = Arc::new(ScriptedApi::new().submit_fallback(429, ""));
    let scenario = VirtualUserScenario::new(api.clone(), &ScenarioConfig::default());
    let runner = LoadTestRunner::new(1, Duration::from_secs(1), scenario);

    let start = Instant::now();
    let metrics = runner
        .run(Arc::new(RunGate::new(None, Some(5))))
        .await
        .unwrap();

    assert_eq!(metrics.iterations(), 5);
    assert_eq!(metrics.outcome_count(IterationOutcome::SubmitRateLimited), 5);
    assert_eq!(metrics.check(labels::RATE_LIMIT_HIT).passes, 5);
    assert!(api.status_calls().is_empty());
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_mixed_outcomes_are_aggregated() {
    let api = Arc::new(
        ScriptedApi::new()
            .submit(500, "")
            .submit(202, r#"{"id":"j2","status_url":"status/j2"}"#)
            .submit_error("connection refused")
            .status(200, r#"{"result":{"status":"Error"},"error":{"code":503}}"#),
    );
    let scenario = VirtualUserScenario::new(api.clone(), &ScenarioConfig::default());
    let runner = LoadTestRunner::new(1, Duration::from_millis(10), scenario);

    let metrics = runner
        .run(Arc::new(RunGate::new(None, Some(3))))
        .await
        .unwrap();

    assert_eq!(metrics.outcome_count(IterationOutcome::SubmitUnexpected), 1);
    assert_eq!(metrics.outcome_count(IterationOutcome::Errored), 1);
    assert_eq!(metrics.outcome_count(IterationOutcome::SubmitFailed), 1);

    let summary = metrics.summary();
    assert_eq!(summary.transport_errors, 1);
    assert_eq!(summary.http_statuses.get("500"), Some(&1));
    assert_eq!(summary.http_statuses.get("202"), Some(&1));
    assert_eq!(summary.http_statuses.get("200"), Some(&1));
}
