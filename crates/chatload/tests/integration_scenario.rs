//! Integration tests for the virtual-user workflow
//!
//! These tests drive complete iterations against a scripted transport and check the
//! recorded checks, the number of requests issued and the terminal outcome.

use std::sync::Arc;
use std::time::Duration;

use chatload::config::ScenarioConfig;
use chatload::labels;
use chatload::testing::ScriptedApi;
use chatload::{CheckLog, Endpoint, IterationOutcome, PollSettings, VirtualUserScenario};
use tokio::time::Instant;

fn scenario(api: &Arc<ScriptedApi>) -> VirtualUserScenario {
    VirtualUserScenario::new(api.clone(), &ScenarioConfig::default())
}

mod reference_scenarios {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_accepted_then_running_then_complete() {
        let api = Arc::new(
            ScriptedApi::new()
                .submit(202, r#"{"id":"j1","status_url":"/status/j1"}"#)
                .status(200, r#"{"result":{"status":"RUNNING"}}"#)
                .status(
                    200,
                    r#"{"chat_id":"c1","result":{"status":"COMPLETE","rag_response":{"answer":"hello world"}}}"#,
                ),
        );

        let report = scenario(&api).run_iteration(0, 0).await;

        assert_eq!(report.outcome, IterationOutcome::Completed);
        assert_eq!(
            report.log.labels(),
            vec![
                labels::JOB_ACCEPTED,
                labels::HAS_JOB_ID,
                labels::HAS_STATUS_URL,
                labels::STATUS_FETCH_200,
                labels::STATUS_BODY_PARSED,
                labels::STATUS_FETCH_200,
                labels::STATUS_BODY_PARSED,
                labels::HAS_CHAT_ID,
                labels::HAS_ANSWER_TEXT,
            ]
        );
        assert!(report.log.all_passed());
        assert_eq!(api.status_calls().len(), 2);
        assert!(api.status_calls().iter().all(|url| url == "/status/j1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_submission_rate_limited() {
        let api = Arc::new(ScriptedApi::new().submit(429, r#"{"error":"slow down"}"#));

        let report = scenario(&api).run_iteration(0, 0).await;

        assert_eq!(report.outcome, IterationOutcome::SubmitRateLimited);
        assert_eq!(report.log.labels(), vec![labels::RATE_LIMIT_HIT]);
        assert!(report.log.all_passed());
        assert!(api.status_calls().is_empty());
        assert_eq!(report.log.requests_to(Endpoint::Status), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ten_queued_polls_exhaust_budget() {
        let api = Arc::new(
            ScriptedApi::new()
                .submit(202, r#"{"id":"j1","status_url":"status/j1"}"#)
                .status_repeated(200, r#"{"result":{"status":"QUEUED"}}"#, 10)
                .status_fallback(200, r#"{"chat_id":"c1","result":{"status":"COMPLETE"}}"#),
        );

        let report = scenario(&api).run_iteration(0, 0).await;

        assert_eq!(report.outcome, IterationOutcome::Exhausted);
        assert_eq!(api.status_calls().len(), 10);
        assert_eq!(report.log.results(labels::STATUS_FETCH_200), vec![true; 10]);
        assert!(report.log.results(labels::HAS_CHAT_ID).is_empty());
        assert!(report.log.results(labels::HAS_ANSWER_TEXT).is_empty());
        assert!(report.log.results(labels::HAS_ERROR).is_empty());
    }
}

mod polling_edges {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_poll_rate_limit_ends_iteration() {
        let api = Arc::new(
            ScriptedApi::new()
                .submit(202, r#"{"id":"j1","status_url":"status/j1"}"#)
                .status(200, r#"{"result":{"status":"QUEUED"}}"#)
                .status(429, "")
                .status_fallback(200, r#"{"result":{"status":"QUEUED"}}"#),
        );

        let report = scenario(&api).run_iteration(0, 0).await;

        assert_eq!(report.outcome, IterationOutcome::PollRateLimited);
        assert_eq!(api.status_calls().len(), 2);
        assert_eq!(report.log.results(labels::STATUS_RATE_LIMIT), vec![true]);
        assert_eq!(report.log.results(labels::STATUS_FETCH_200), vec![true]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_job_error_ends_iteration() {
        let api = Arc::new(
            ScriptedApi::new()
                .submit(202, r#"{"id":"j1","status_url":"status/j1"}"#)
                .status(
                    200,
                    r#"{"id":"j1","chat_id":"c1","result":{"status":"Error"},"error":{"code":500,"message":"rag failed","can_retry":false}}"#,
                )
                .status_fallback(200, r#"{"result":{"status":"QUEUED"}}"#),
        );

        let report = scenario(&api).run_iteration(0, 0).await;

        assert_eq!(report.outcome, IterationOutcome::Errored);
        assert_eq!(api.status_calls().len(), 1);
        assert!(report.log.results(labels::HAS_ERROR).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_bodies_do_not_abort() {
        let api = Arc::new(
            ScriptedApi::new()
                .submit(202, r#"{"id":"j1","status_url":"status/j1"}"#)
                .status(500, "")
                .status(200, "{truncated")
                .status_error("connection reset")
                .status(200, r#"{"chat_id":"c1","result":{"status":"COMPLETE","rag_response":{"answer":"late"}}}"#),
        );

        let report = scenario(&api).run_iteration(0, 0).await;

        assert_eq!(report.outcome, IterationOutcome::Completed);
        assert_eq!(api.status_calls().len(), 4);
        assert_eq!(
            report.log.results(labels::STATUS_FETCH_200),
            vec![false, true, false, true]
        );
        assert_eq!(report.log.results(labels::STATUS_BODY_PARSED), vec![false, false, true]);
        assert_eq!(report.log.results(labels::HAS_ANSWER_TEXT), vec![true]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_complete_with_unexpected_field_types() {
        let api = Arc::new(
            ScriptedApi::new()
                .submit(202, r#"{"id":"j1","status_url":"status/j1"}"#)
                .status(
                    200,
                    r#"{"id":7,"chat_id":"c1","result":{"status":"COMPLETE","rag_response":{"answer":"hi","sources":[{"doc":"a"}]}}}"#,
                )
                .status_fallback(200, r#"{"result":{"status":"QUEUED"}}"#),
        );

        let report = scenario(&api).run_iteration(0, 0).await;

        assert_eq!(report.outcome, IterationOutcome::Completed);
        assert_eq!(api.status_calls().len(), 1);
        assert!(report.log.all_passed());
        assert_eq!(report.log.results(labels::HAS_ANSWER_TEXT), vec![true]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_complete_without_fields() {
        let api = Arc::new(
            ScriptedApi::new()
                .submit(202, r#"{"id":"j1","status_url":"status/j1"}"#)
                .status(200, r#"{"result":{"status":"COMPLETE"}}"#),
        );

        let report = scenario(&api).run_iteration(0, 0).await;

        assert_eq!(report.outcome, IterationOutcome::Completed);
        assert_eq!(report.log.results(labels::HAS_CHAT_ID), vec![false]);
        assert_eq!(report.log.results(labels::HAS_ANSWER_TEXT), vec![false]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_interval_is_fixed() {
        let api = Arc::new(
            ScriptedApi::new()
                .submit(202, r#"{"id":"j1","status_url":"status/j1"}"#)
                .status_repeated(200, r#"{"result":{"status":"RUNNING"}}"#, 4),
        );
        let scenario = scenario(&api).with_poll_settings(PollSettings {
            interval: Duration::from_millis(500),
            max_attempts: 4,
        });

        let started = Instant::now();
        let report = scenario.run_iteration(0, 0).await;

        assert_eq!(report.outcome, IterationOutcome::Exhausted);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(2_000));
        assert!(elapsed < Duration::from_millis(2_100));
    }
}

mod submission_edges {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_unexpected_status_skips_polling() {
        let api = Arc::new(ScriptedApi::new().submit(500, "internal error"));

        let report = scenario(&api).run_iteration(0, 0).await;

        assert_eq!(report.outcome, IterationOutcome::SubmitUnexpected);
        assert!(report.log.checks.is_empty());
        assert!(api.status_calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_accepted_without_status_url_skips_polling() {
        let api = Arc::new(ScriptedApi::new().submit(202, r#"{"id":"j1"}"#));

        let report = scenario(&api).run_iteration(0, 0).await;

        assert_eq!(report.outcome, IterationOutcome::SubmitIncomplete);
        assert_eq!(report.log.results(labels::HAS_STATUS_URL), vec![false]);
        assert!(api.status_calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_numeric_job_id_still_polls() {
        let api = Arc::new(
            ScriptedApi::new()
                .submit(202, r#"{"id":123,"status_url":"status/123"}"#)
                .status(200, r#"{"chat_id":"c1","result":{"status":"COMPLETE","rag_response":{"answer":"ok"}}}"#),
        );

        let report = scenario(&api).run_iteration(0, 0).await;

        assert_eq!(report.outcome, IterationOutcome::Completed);
        assert_eq!(report.log.results(labels::HAS_JOB_ID), vec![true]);
        assert_eq!(report.log.results(labels::HAS_STATUS_URL), vec![true]);
        assert_eq!(api.status_calls(), vec!["status/123".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure() {
        let api = Arc::new(ScriptedApi::new().submit_error("connection refused"));

        let report = scenario(&api).run_iteration(0, 0).await;

        assert_eq!(report.outcome, IterationOutcome::SubmitFailed);
        assert!(report.log.checks.is_empty());
        assert_eq!(report.log.requests.len(), 1);
        assert_eq!(report.log.requests[0].status, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_carries_configured_message() {
        let api = Arc::new(ScriptedApi::new().submit(429, ""));
        let config = ScenarioConfig {
            message: "what is RAG?".to_string(),
            chat_id: "chat-7".to_string(),
            ..Default::default()
        };

        let mut log = CheckLog::default();
        VirtualUserScenario::new(api.clone(), &config)
            .execute(&mut log)
            .await;

        let submitted = api.submitted();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].message(), "what is RAG?");
        assert_eq!(submitted[0].chat_id(), "chat-7");
    }
}
