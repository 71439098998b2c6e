//! Job submission and first-response classification

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::checks::{labels, CheckReporter, Endpoint, RequestSample};
use crate::client::JobApi;
use crate::model::{
    JobRequest, SubmissionResponse, STATUS_ACCEPTED, STATUS_TOO_MANY_REQUESTS,
};

/// Handles of an accepted job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedJob {
    pub job_id: String,
    pub status_url: String,
}

/// How the API answered a submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// 429, the API is shedding load
    RateLimited,
    /// 202 carrying both a job id and a status URL
    Accepted(AcceptedJob),
    /// 202 missing at least one handle; there is nothing to poll
    Incomplete {
        job_id: Option<String>,
        status_url: Option<String>,
    },
    /// Any other status
    Unexpected { status: u16 },
    /// No status at all
    Failed { reason: String },
}

/// Send the job and classify the answer
pub async fn submit(
    api: &dyn JobApi,
    request: &JobRequest,
    reporter: &mut dyn CheckReporter,
) -> Submission {
    let started = Instant::now();
    let result = api.submit(request).await;
    let latency = started.elapsed();

    match result {
        Ok(raw) => {
            reporter.record_request(RequestSample {
                endpoint: Endpoint::Submit,
                status: Some(raw.status),
                latency,
            });
            classify(&SubmissionResponse::from_raw(&raw), reporter)
        }
        Err(e) => {
            reporter.record_request(RequestSample {
                endpoint: Endpoint::Submit,
                status: None,
                latency,
            });
            warn!("Job submission failed: {}", e);
            Submission::Failed {
                reason: e.to_string(),
            }
        }
    }
}

/// Record submission checks and decide whether polling may start
pub fn classify(response: &SubmissionResponse, reporter: &mut dyn CheckReporter) -> Submission {
    match response.http_status {
        STATUS_TOO_MANY_REQUESTS => {
            reporter.record_check(labels::RATE_LIMIT_HIT, true);
            debug!("Submission rate limited");
            Submission::RateLimited
        }
        STATUS_ACCEPTED => {
            reporter.record_check(labels::JOB_ACCEPTED, true);
            reporter.record_check(labels::HAS_JOB_ID, response.job_id.is_some());
            reporter.record_check(labels::HAS_STATUS_URL, response.status_url.is_some());

            match (&response.job_id, &response.status_url) {
                (Some(job_id), Some(status_url)) => Submission::Accepted(AcceptedJob {
                    job_id: job_id.clone(),
                    status_url: status_url.clone(),
                }),
                (job_id, status_url) => {
                    warn!(
                        "Job accepted without handles (id: {:?}, status_url: {:?})",
                        job_id, status_url
                    );
                    Submission::Incomplete {
                        job_id: job_id.clone(),
                        status_url: status_url.clone(),
                    }
                }
            }
        }
        status => {
            warn!("Submission returned unexpected status {}", status);
            Submission::Unexpected { status }
        }
    }
}
