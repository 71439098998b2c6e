//! Bounded status polling for an accepted job
//!
//! ```text
//!             ┌──────────── QUEUED / RUNNING / other / bad body ─┐
//!             ▼                                                 │
//!  Accepted ─► POLLING ── sleep, GET status ────────────────────┤
//!                 │                                             │
//!                 ├─ 429 ─────────────► RATE_LIMITED            │
//!                 ├─ COMPLETE ────────► COMPLETE (validated)    │
//!                 ├─ error present ───► ERRORED                 │
//!                 └─ budget spent ────► EXHAUSTED ◄─────────────┘
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Instant};
use tracing::{debug, error, warn};

use crate::checks::{labels, CheckReporter, Endpoint, RequestSample};
use crate::client::JobApi;
use crate::config::ScenarioConfig;
use crate::model::{JobStatusBody, RawResponse, STATUS_OK, STATUS_TOO_MANY_REQUESTS};
use crate::submission::AcceptedJob;
use crate::validator;

/// Remaining poll attempts; never drops below zero
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    remaining: u32,
}

impl RetryBudget {
    pub fn new(attempts: u32) -> Self {
        Self {
            remaining: attempts,
        }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    pub fn consume(&mut self) {
        self.remaining = self.remaining.saturating_sub(1);
    }
}

/// Polling state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PollState {
    Polling,
    RateLimited,
    Complete,
    Errored,
    Exhausted,
}

impl PollState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Polling)
    }
}

/// Fixed-interval polling parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Sleep before every attempt
    pub interval: Duration,
    /// Initial retry budget
    pub max_attempts: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_attempts: 10,
        }
    }
}

impl From<&ScenarioConfig> for PollSettings {
    fn from(config: &ScenarioConfig) -> Self {
        Self {
            interval: config.poll_interval(),
            max_attempts: config.max_poll_attempts,
        }
    }
}

/// Terminal result of a polling loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOutcome {
    pub state: PollState,
    /// Status requests issued
    pub attempts: u32,
    /// Budget left when the loop ended
    pub remaining: u32,
    /// Error code of an ERRORED job
    pub error_code: Option<String>,
}

/// Polling state for one job of one iteration
pub struct PollingLoop<'a> {
    api: &'a dyn JobApi,
    job: &'a AcceptedJob,
    interval: Duration,
    budget: RetryBudget,
    state: PollState,
    attempts: u32,
    error_code: Option<String>,
}

impl<'a> PollingLoop<'a> {
    pub fn new(api: &'a dyn JobApi, job: &'a AcceptedJob, settings: PollSettings) -> Self {
        Self {
            api,
            job,
            interval: settings.interval,
            budget: RetryBudget::new(settings.max_attempts),
            state: PollState::Polling,
            attempts: 0,
            error_code: None,
        }
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    pub fn budget(&self) -> RetryBudget {
        self.budget
    }

    /// Poll until a terminal state is reached
    pub async fn run(mut self, reporter: &mut dyn CheckReporter) -> PollOutcome {
        while self.state == PollState::Polling {
            if self.budget.is_exhausted() {
                self.state = PollState::Exhausted;
                debug!(
                    "Job {} still pending after {} polls",
                    self.job.job_id, self.attempts
                );
                break;
            }

            sleep(self.interval).await;
            self.attempts += 1;

            let response = self.fetch(reporter).await;
            self.state = self.observe(response.as_ref(), reporter);
        }

        PollOutcome {
            state: self.state,
            attempts: self.attempts,
            remaining: self.budget.remaining(),
            error_code: self.error_code,
        }
    }

    async fn fetch(&self, reporter: &mut dyn CheckReporter) -> Option<RawResponse> {
        let started = Instant::now();
        let result = self.api.fetch_status(&self.job.status_url).await;
        let latency = started.elapsed();

        reporter.record_request(RequestSample {
            endpoint: Endpoint::Status,
            status: result.as_ref().ok().map(|raw| raw.status),
            latency,
        });

        match result {
            Ok(raw) => Some(raw),
            Err(e) => {
                warn!("Status poll for job {} failed: {}", self.job.job_id, e);
                None
            }
        }
    }

    /// Apply one poll response and return the next state
    pub fn observe(
        &mut self,
        response: Option<&RawResponse>,
        reporter: &mut dyn CheckReporter,
    ) -> PollState {
        if let Some(raw) = response {
            if raw.status == STATUS_TOO_MANY_REQUESTS {
                reporter.record_check(labels::STATUS_RATE_LIMIT, true);
                debug!("Status poll for job {} rate limited", self.job.job_id);
                return PollState::RateLimited;
            }
        }

        reporter.record_check(
            labels::STATUS_FETCH_200,
            response.is_some_and(|raw| raw.status == STATUS_OK),
        );

        let Some(raw) = response else {
            self.budget.consume();
            return PollState::Polling;
        };

        let body = match serde_json::from_str::<JobStatusBody>(&raw.body) {
            Ok(body) => body,
            Err(e) => {
                reporter.record_check(labels::STATUS_BODY_PARSED, false);
                warn!(
                    "Unreadable status body for job {} (HTTP {}): {}",
                    self.job.job_id, raw.status, e
                );
                self.budget.consume();
                return PollState::Polling;
            }
        };
        reporter.record_check(labels::STATUS_BODY_PARSED, true);

        if body.is_complete() {
            validator::validate(&self.job.job_id, &body, reporter);
            return PollState::Complete;
        }

        if let Some(job_error) = body.error() {
            self.budget.consume();
            let code = job_error.code_label();
            error!("Job {} failed with code: {}", self.job.job_id, code);
            self.error_code = Some(code);
            return PollState::Errored;
        }

        self.budget.consume();
        debug!(
            "Job {} is {} ({} polls left)",
            self.job.job_id,
            body.status().map_or("unknown", |s| s.as_str()),
            self.budget.remaining()
        );
        PollState::Polling
    }
}
