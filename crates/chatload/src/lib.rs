//! # chatload
//!
//! Load and correctness harness for an asynchronous chat job API.
//!
//! Every virtual user repeatedly submits a chat job, polls its status URL on a fixed
//! interval with a bounded retry budget, and validates the finished payload. Observations
//! are recorded as named checks (k6 style) and aggregated into per-label pass rates,
//! outcome counts and latency histograms.
//!
//! ## Features
//!
//! - **Submission classification**: 429 throttling, 202 acceptance, everything else
//! - **Bounded polling**: fixed backoff, retry budget, terminal-state detection
//! - **Result validation**: guarded probing of optional payload fields
//! - **Concurrent virtual users**: one tokio task per user, no shared mutable state
//! - **Reporting**: console report, JSON summary, Prometheus text export, thresholds
//!
//! ## Usage
//!
//! ```bash
//! # 20 virtual users for 5 seconds against a local API
//! cargo run --package chatload -- --target http://localhost:3000 --vus 20 --duration 5
//!
//! # Print the effective configuration
//! cargo run --package chatload -- --config chatload.toml show-config
//! ```

pub mod checks;
pub mod client;
pub mod config;
pub mod error;
pub mod metrics;
pub mod model;
pub mod polling;
pub mod runner;
pub mod scenario;
pub mod submission;
#[doc(hidden)]
pub mod testing;
pub mod validator;

pub use checks::{labels, CheckLog, CheckReporter, Endpoint};
pub use client::{HttpJobApi, JobApi};
pub use config::HarnessConfig;
pub use error::{HarnessError, Result};
pub use metrics::{RunMetrics, RunSummary, ThresholdResult};
pub use model::{JobRequest, JobStatus, JobStatusBody, RawResponse};
pub use polling::{PollOutcome, PollSettings, PollState, PollingLoop, RetryBudget};
pub use runner::{IterationGate, LoadTestRunner, RunGate};
pub use scenario::{IterationOutcome, IterationReport, VirtualUserScenario};
pub use submission::{AcceptedJob, Submission};
