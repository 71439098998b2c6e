//! Run-level aggregation of iteration reports
//!
//! Owned by a single aggregator; virtual users hand their reports over a channel and
//! never touch these counters.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use hdrhistogram::Histogram;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use serde::{Deserialize, Serialize};

use crate::checks::{Endpoint, RequestSample};
use crate::config::ThresholdConfig;
use crate::error::{HarnessError, Result};
use crate::scenario::{IterationOutcome, IterationReport};

// ============================================================================
// METRICS
// ============================================================================

/// Pass/fail counts of one check label
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckTally {
    pub passes: u64,
    pub fails: u64,
}

impl CheckTally {
    pub fn total(&self) -> u64 {
        self.passes + self.fails
    }

    pub fn pass_rate(&self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            self.passes as f64 / self.total() as f64
        }
    }
}

/// Aggregated view of a run
pub struct RunMetrics {
    started_at: DateTime<Utc>,
    elapsed: Duration,
    vus: usize,
    iterations: u64,
    checks: BTreeMap<&'static str, CheckTally>,
    outcomes: BTreeMap<IterationOutcome, u64>,
    http_statuses: BTreeMap<u16, u64>,
    transport_errors: u64,
    submit_latency: Histogram<u64>,
    status_latency: Histogram<u64>,
    registry: Registry,
    checks_total: IntCounterVec,
    iterations_total: IntCounterVec,
    requests_total: IntCounterVec,
}

impl RunMetrics {
    pub fn new(vus: usize) -> Result<Self> {
        let registry = Registry::new();

        let checks_total = IntCounterVec::new(
            Opts::new("chatload_checks_total", "Checks recorded, by label and result"),
            &["check", "result"],
        )?;
        let iterations_total = IntCounterVec::new(
            Opts::new("chatload_iterations_total", "Iterations finished, by outcome"),
            &["outcome"],
        )?;
        let requests_total = IntCounterVec::new(
            Opts::new("chatload_http_requests_total", "HTTP requests, by endpoint and status"),
            &["endpoint", "status"],
        )?;

        registry.register(Box::new(checks_total.clone()))?;
        registry.register(Box::new(iterations_total.clone()))?;
        registry.register(Box::new(requests_total.clone()))?;

        Ok(Self {
            started_at: Utc::now(),
            elapsed: Duration::ZERO,
            vus,
            iterations: 0,
            checks: BTreeMap::new(),
            outcomes: BTreeMap::new(),
            http_statuses: BTreeMap::new(),
            transport_errors: 0,
            // 1µs to 60s
            submit_latency: Histogram::new_with_bounds(1, 60_000_000, 3)?,
            status_latency: Histogram::new_with_bounds(1, 60_000_000, 3)?,
            registry,
            checks_total,
            iterations_total,
            requests_total,
        })
    }

    /// Fold one iteration into the totals
    pub fn record_iteration(&mut self, report: &IterationReport) {
        self.iterations += 1;
        *self.outcomes.entry(report.outcome).or_insert(0) += 1;
        self.iterations_total
            .with_label_values(&[report.outcome.as_str()])
            .inc();

        for check in &report.log.checks {
            let tally = self.checks.entry(check.label).or_default();
            let result = if check.passed {
                tally.passes += 1;
                "pass"
            } else {
                tally.fails += 1;
                "fail"
            };
            self.checks_total
                .with_label_values(&[check.label, result])
                .inc();
        }

        for sample in &report.log.requests {
            self.record_request(sample);
        }
    }

    fn record_request(&mut self, sample: &RequestSample) {
        let latency_us = u64::try_from(sample.latency.as_micros()).unwrap_or(u64::MAX);
        match sample.endpoint {
            Endpoint::Submit => self.submit_latency.saturating_record(latency_us),
            Endpoint::Status => self.status_latency.saturating_record(latency_us),
        }

        let status = match sample.status {
            Some(status) => {
                *self.http_statuses.entry(status).or_insert(0) += 1;
                status.to_string()
            }
            None => {
                self.transport_errors += 1;
                "transport_error".to_string()
            }
        };
        self.requests_total
            .with_label_values(&[sample.endpoint.as_str(), status.as_str()])
            .inc();
    }

    /// Stamp the wall-clock length of the run
    pub fn finish(&mut self, elapsed: Duration) {
        self.elapsed = elapsed;
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    pub fn check(&self, label: &str) -> CheckTally {
        self.checks.get(label).copied().unwrap_or_default()
    }

    pub fn outcome_count(&self, outcome: IterationOutcome) -> u64 {
        self.outcomes.get(&outcome).copied().unwrap_or(0)
    }

    /// Prometheus text exposition of the run counters
    pub fn encode_prometheus(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| HarnessError::Metrics(e.to_string()))
    }

    /// Get summary statistics
    pub fn summary(&self) -> RunSummary {
        let duration_secs = self.elapsed.as_secs_f64();
        let (passes, fails) = self
            .checks
            .values()
            .fold((0, 0), |(p, f), t| (p + t.passes, f + t.fails));
        let total_checks = passes + fails;
        let http_requests = self.http_statuses.values().sum::<u64>() + self.transport_errors;

        RunSummary {
            started_at: self.started_at,
            duration_secs,
            vus: self.vus,
            iterations: self.iterations,
            iterations_per_sec: per_second(self.iterations, duration_secs),
            http_requests,
            requests_per_sec: per_second(http_requests, duration_secs),
            transport_errors: self.transport_errors,
            checks_passed: passes,
            checks_failed: fails,
            check_pass_rate: if total_checks == 0 {
                0.0
            } else {
                passes as f64 / total_checks as f64
            },
            checks: self
                .checks
                .iter()
                .map(|(label, tally)| CheckSummary {
                    label: label.to_string(),
                    passes: tally.passes,
                    fails: tally.fails,
                    pass_rate: tally.pass_rate(),
                })
                .collect(),
            outcomes: self
                .outcomes
                .iter()
                .map(|(outcome, count)| (outcome.as_str().to_string(), *count))
                .collect(),
            http_statuses: self
                .http_statuses
                .iter()
                .map(|(status, count)| (status.to_string(), *count))
                .collect(),
            submit_latency: LatencySummary::from_histogram(&self.submit_latency),
            status_latency: LatencySummary::from_histogram(&self.status_latency),
        }
    }
}

fn per_second(count: u64, duration_secs: f64) -> f64 {
    if duration_secs > 0.0 {
        count as f64 / duration_secs
    } else {
        0.0
    }
}

// ============================================================================
// SUMMARY
// ============================================================================

/// Latency distribution of one endpoint, in microseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencySummary {
    pub count: u64,
    pub p50_us: u64,
    pub p90_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
    pub mean_us: u64,
}

impl LatencySummary {
    fn from_histogram(hist: &Histogram<u64>) -> Self {
        if hist.is_empty() {
            return Self::default();
        }
        Self {
            count: hist.len(),
            p50_us: hist.value_at_quantile(0.50),
            p90_us: hist.value_at_quantile(0.90),
            p99_us: hist.value_at_quantile(0.99),
            max_us: hist.max(),
            mean_us: hist.mean() as u64,
        }
    }
}

/// Per-label check summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckSummary {
    pub label: String,
    pub passes: u64,
    pub fails: u64,
    pub pass_rate: f64,
}

/// Run summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub vus: usize,
    pub iterations: u64,
    pub iterations_per_sec: f64,
    pub http_requests: u64,
    pub requests_per_sec: f64,
    pub transport_errors: u64,
    pub checks_passed: u64,
    pub checks_failed: u64,
    pub check_pass_rate: f64,
    pub checks: Vec<CheckSummary>,
    pub outcomes: BTreeMap<String, u64>,
    pub http_statuses: BTreeMap<String, u64>,
    pub submit_latency: LatencySummary,
    pub status_latency: LatencySummary,
}

impl RunSummary {
    /// Print formatted report
    pub fn print_report(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                 CHAT JOB API LOAD TEST RESULTS               ║");
        println!("╠══════════════════════════════════════════════════════════════╣");
        println!(
            "║ Started:           {:>30}             ║",
            self.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        println!(
            "║ Duration:          {:>10.2} seconds                        ║",
            self.duration_secs
        );
        println!(
            "║ Virtual Users:     {:>10}                                 ║",
            self.vus
        );
        println!(
            "║ Iterations:        {:>10} ({:>8.2}/s)                     ║",
            self.iterations, self.iterations_per_sec
        );
        println!(
            "║ HTTP Requests:     {:>10} ({:>8.2}/s)                     ║",
            self.http_requests, self.requests_per_sec
        );
        println!(
            "║ Transport Errors:  {:>10}                                 ║",
            self.transport_errors
        );
        println!("╠══════════════════════════════════════════════════════════════╣");
        println!("║ CHECKS                                                       ║");
        for check in &self.checks {
            let mark = if check.fails == 0 { "✓" } else { "✗" };
            println!(
                "║ {} {:24} {:>6.2}%  ✓ {:>7}  ✗ {:>7}      ║",
                mark,
                check.label,
                check.pass_rate * 100.0,
                check.passes,
                check.fails
            );
        }
        println!(
            "║   overall                  {:>6.2}%  ✓ {:>7}  ✗ {:>7}      ║",
            self.check_pass_rate * 100.0,
            self.checks_passed,
            self.checks_failed
        );
        println!("╠══════════════════════════════════════════════════════════════╣");
        println!("║ OUTCOMES                                                     ║");
        for (outcome, count) in &self.outcomes {
            println!("║   {:20}: {:>10}                         ║", outcome, count);
        }
        println!("╠══════════════════════════════════════════════════════════════╣");
        println!("║ LATENCY (microseconds)       submit          status          ║");
        for (name, submit, status) in [
            ("p50", self.submit_latency.p50_us, self.status_latency.p50_us),
            ("p90", self.submit_latency.p90_us, self.status_latency.p90_us),
            ("p99", self.submit_latency.p99_us, self.status_latency.p99_us),
            ("max", self.submit_latency.max_us, self.status_latency.max_us),
            ("mean", self.submit_latency.mean_us, self.status_latency.mean_us),
        ] {
            println!(
                "║   {:5}            {:>12}    {:>12}              ║",
                name, submit, status
            );
        }

        if !self.http_statuses.is_empty() {
            println!("╠══════════════════════════════════════════════════════════════╣");
            println!("║ HTTP STATUSES                                                ║");
            for (status, count) in &self.http_statuses {
                println!("║   {:20}: {:>10}                         ║", status, count);
            }
        }

        println!("╚══════════════════════════════════════════════════════════════╝\n");
    }

    /// Evaluate configured thresholds; unset thresholds are skipped
    pub fn check_thresholds(&self, thresholds: &ThresholdConfig) -> ThresholdResult {
        let mut result = ThresholdResult {
            passes: true,
            checks: Vec::new(),
        };

        if let Some(min_rate) = thresholds.min_check_pass_rate {
            let passed = self.check_pass_rate >= min_rate;
            result.checks.push(ThresholdCheck {
                name: format!("Check pass rate >= {:.2}%", min_rate * 100.0),
                passed,
                actual: format!("{:.2}%", self.check_pass_rate * 100.0),
                expected: format!(">={:.2}%", min_rate * 100.0),
            });
            result.passes &= passed;
        }

        if let Some(max_ms) = thresholds.max_status_p99_ms {
            let max_us = max_ms.saturating_mul(1_000);
            let passed = self.status_latency.p99_us <= max_us;
            result.checks.push(ThresholdCheck {
                name: format!("Status poll p99 <= {}ms", max_ms),
                passed,
                actual: format!("{}µs", self.status_latency.p99_us),
                expected: format!("<={}µs", max_us),
            });
            result.passes &= passed;
        }

        result
    }
}

/// Threshold evaluation result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdResult {
    pub passes: bool,
    pub checks: Vec<ThresholdCheck>,
}

/// Individual threshold
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdCheck {
    pub name: String,
    pub passed: bool,
    pub actual: String,
    pub expected: String,
}

impl ThresholdResult {
    pub fn print_report(&self) {
        if self.checks.is_empty() {
            return;
        }

        println!("\n═══════════════════════════════════════════════════════════════");
        println!("                      THRESHOLD CHECK");
        println!("═══════════════════════════════════════════════════════════════");

        for check in &self.checks {
            let status = if check.passed { "✅ PASS" } else { "❌ FAIL" };
            println!("\n  {} - {}", check.name, status);
            println!("    Actual:   {}", check.actual);
            println!("    Expected: {}", check.expected);
        }

        println!("\n═══════════════════════════════════════════════════════════════");
        if self.passes {
            println!("  OVERALL: ✅ ALL THRESHOLDS PASS");
        } else {
            println!("  OVERALL: ❌ SOME THRESHOLDS FAILED");
        }
        println!("═══════════════════════════════════════════════════════════════\n");
    }
}
