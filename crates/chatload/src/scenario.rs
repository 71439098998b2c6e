//! Per-virtual-user workflow: submit, poll until terminal, validate

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, info_span, warn, Instrument};

use crate::checks::{CheckLog, CheckReporter};
use crate::client::JobApi;
use crate::config::ScenarioConfig;
use crate::model::JobRequest;
use crate::polling::{PollSettings, PollState, PollingLoop};
use crate::submission::{self, Submission};

/// How one iteration ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IterationOutcome {
    /// Submission answered 429
    SubmitRateLimited,
    /// Submission answered something other than 202 or 429
    SubmitUnexpected,
    /// 202 without a job id or status URL
    SubmitIncomplete,
    /// Submission got no HTTP status
    SubmitFailed,
    /// A status poll answered 429
    PollRateLimited,
    /// Job reached COMPLETE and was validated
    Completed,
    /// Job reported an error
    Errored,
    /// Retry budget ran out while the job was still pending
    Exhausted,
}

impl IterationOutcome {
    pub const ALL: [IterationOutcome; 8] = [
        Self::SubmitRateLimited,
        Self::SubmitUnexpected,
        Self::SubmitIncomplete,
        Self::SubmitFailed,
        Self::PollRateLimited,
        Self::Completed,
        Self::Errored,
        Self::Exhausted,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SubmitRateLimited => "submit_rate_limited",
            Self::SubmitUnexpected => "submit_unexpected",
            Self::SubmitIncomplete => "submit_incomplete",
            Self::SubmitFailed => "submit_failed",
            Self::PollRateLimited => "poll_rate_limited",
            Self::Completed => "completed",
            Self::Errored => "errored",
            Self::Exhausted => "exhausted",
        }
    }

    /// Throttled iterations return immediately without the inter-iteration pause
    pub fn pauses_after(self) -> bool {
        !matches!(self, Self::SubmitRateLimited | Self::PollRateLimited)
    }

    fn from_poll_state(state: PollState) -> Self {
        match state {
            PollState::RateLimited => Self::PollRateLimited,
            PollState::Complete => Self::Completed,
            PollState::Errored => Self::Errored,
            // `PollingLoop::run` only returns terminal states
            PollState::Exhausted | PollState::Polling => Self::Exhausted,
        }
    }
}

/// Everything one iteration observed
#[derive(Debug, Clone)]
pub struct IterationReport {
    pub vu: usize,
    pub iteration: u64,
    pub outcome: IterationOutcome,
    pub log: CheckLog,
}

/// The scenario a virtual user runs each iteration
pub struct VirtualUserScenario {
    api: Arc<dyn JobApi>,
    request: JobRequest,
    poll: PollSettings,
}

impl VirtualUserScenario {
    pub fn new(api: Arc<dyn JobApi>, config: &ScenarioConfig) -> Self {
        Self {
            api,
            request: JobRequest::new(config.message.clone(), config.chat_id.clone()),
            poll: PollSettings::from(config),
        }
    }

    pub fn with_poll_settings(mut self, poll: PollSettings) -> Self {
        self.poll = poll;
        self
    }

    pub fn poll_settings(&self) -> PollSettings {
        self.poll
    }

    /// Run one iteration inside an `iteration` span and collect its report
    pub async fn run_iteration(&self, vu: usize, iteration: u64) -> IterationReport {
        let mut log = CheckLog::default();
        let outcome = self
            .execute(&mut log)
            .instrument(info_span!("iteration", vu, iteration))
            .await;

        IterationReport {
            vu,
            iteration,
            outcome,
            log,
        }
    }

    /// Run the workflow against any reporter
    pub async fn execute(&self, reporter: &mut dyn CheckReporter) -> IterationOutcome {
        let request = self.request.clone();

        let job = match submission::submit(self.api.as_ref(), &request, reporter).await {
            Submission::Accepted(job) => job,
            Submission::RateLimited => return IterationOutcome::SubmitRateLimited,
            Submission::Incomplete { .. } => return IterationOutcome::SubmitIncomplete,
            Submission::Unexpected { .. } => return IterationOutcome::SubmitUnexpected,
            Submission::Failed { .. } => return IterationOutcome::SubmitFailed,
        };

        info!("Job {} accepted, status url {}", job.job_id, job.status_url);

        let outcome = PollingLoop::new(self.api.as_ref(), &job, self.poll)
            .run(reporter)
            .await;

        if outcome.state == PollState::Exhausted {
            warn!(
                "Job {} not finished after {} polls",
                job.job_id, outcome.attempts
            );
        }

        IterationOutcome::from_poll_state(outcome.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throttled_outcomes_skip_pause() {
        assert!(!IterationOutcome::SubmitRateLimited.pauses_after());
        assert!(!IterationOutcome::PollRateLimited.pauses_after());
        assert!(IterationOutcome::Completed.pauses_after());
        assert!(IterationOutcome::SubmitUnexpected.pauses_after());
        assert!(IterationOutcome::Exhausted.pauses_after());
    }

    #[test]
    fn test_outcome_names_match_serde() {
        for outcome in IterationOutcome::ALL {
            let encoded = serde_json::to_string(&outcome).unwrap();
            assert_eq!(encoded, format!("\"{}\"", outcome.as_str()));
        }
    }
}
