//! Named pass/fail observations
//!
//! A check never changes control flow; it only records what was observed. Labels are
//! fixed strings so pass rates aggregate across iterations and virtual users.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Check labels emitted by the scenario
pub mod labels {
    pub const RATE_LIMIT_HIT: &str = "rate limit hit";
    pub const JOB_ACCEPTED: &str = "job accepted";
    pub const HAS_JOB_ID: &str = "has job_id";
    pub const HAS_STATUS_URL: &str = "has status url";
    pub const STATUS_RATE_LIMIT: &str = "status - rate limit";
    pub const STATUS_FETCH_200: &str = "status fetch 200";
    pub const STATUS_BODY_PARSED: &str = "status body parsed";
    pub const HAS_CHAT_ID: &str = "has chat_id returned";
    pub const HAS_ANSWER_TEXT: &str = "has answer text";
    pub const HAS_ERROR: &str = "has error";
}

/// Which API route a request went to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    Submit,
    Status,
}

impl Endpoint {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Submit => "submit",
            Self::Status => "status",
        }
    }
}

/// One labeled observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Check {
    pub label: &'static str,
    pub passed: bool,
}

/// Timing of one HTTP exchange; `status` is `None` when the transport failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestSample {
    pub endpoint: Endpoint,
    pub status: Option<u16>,
    pub latency: Duration,
}

/// Sink for checks and request samples of a single iteration
pub trait CheckReporter: Send {
    /// Record a labeled observation
    fn record_check(&mut self, label: &'static str, passed: bool);

    /// Record request timing
    fn record_request(&mut self, _sample: RequestSample) {}

    /// Record and hand back the result
    fn check(&mut self, label: &'static str, passed: bool) -> bool {
        self.record_check(label, passed);
        passed
    }
}

/// In-order log of everything one iteration reported
#[derive(Debug, Clone, Default)]
pub struct CheckLog {
    pub checks: Vec<Check>,
    pub requests: Vec<RequestSample>,
}

impl CheckLog {
    /// Results recorded under `label`, in order
    pub fn results(&self, label: &str) -> Vec<bool> {
        self.checks
            .iter()
            .filter(|c| c.label == label)
            .map(|c| c.passed)
            .collect()
    }

    pub fn labels(&self) -> Vec<&'static str> {
        self.checks.iter().map(|c| c.label).collect()
    }

    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn requests_to(&self, endpoint: Endpoint) -> usize {
        self.requests.iter().filter(|r| r.endpoint == endpoint).count()
    }
}

impl CheckReporter for CheckLog {
    fn record_check(&mut self, label: &'static str, passed: bool) {
        self.checks.push(Check { label, passed });
    }

    fn record_request(&mut self, sample: RequestSample) {
        self.requests.push(sample);
    }
}
