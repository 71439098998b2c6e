//! Harness configuration
//!
//! Values are layered: built-in defaults, then an optional file, then `CHATLOAD_*`
//! environment variables (`CHATLOAD_RUN__VUS=50`), then CLI flags applied by the binary.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{HarnessError, Result};

/// Environment variable prefix
pub const ENV_PREFIX: &str = "CHATLOAD";

/// Complete harness configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// System under test
    pub target: TargetConfig,

    /// Per-iteration workflow parameters
    pub scenario: ScenarioConfig,

    /// Virtual-user scheduling
    pub run: RunConfig,

    /// Pass/fail thresholds evaluated after the run
    pub thresholds: ThresholdConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl HarnessConfig {
    /// Load defaults, then `path` (if given), then the environment.
    ///
    /// The result is not validated so that callers can apply overrides first.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Reject configurations that cannot drive a meaningful run
    pub fn validate(&self) -> Result<()> {
        let url = reqwest::Url::parse(&self.target.base_url).map_err(|e| {
            HarnessError::InvalidConfig(format!("base_url {:?}: {}", self.target.base_url, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(HarnessError::InvalidConfig(format!(
                "base_url must be http or https, got {}",
                url.scheme()
            )));
        }
        if self.run.vus == 0 {
            return Err(HarnessError::InvalidConfig("vus must be at least 1".into()));
        }
        if self.scenario.max_poll_attempts == 0 {
            return Err(HarnessError::InvalidConfig(
                "max_poll_attempts must be at least 1".into(),
            ));
        }
        if self.run.duration_secs == 0 && self.run.iterations.is_none() {
            return Err(HarnessError::InvalidConfig(
                "duration_secs must be at least 1 unless iterations is set".into(),
            ));
        }
        if let Some(rate) = self.thresholds.min_check_pass_rate {
            if !(0.0..=1.0).contains(&rate) {
                return Err(HarnessError::InvalidConfig(format!(
                    "min_check_pass_rate must be within 0.0..=1.0, got {}",
                    rate
                )));
            }
        }
        Ok(())
    }
}

// ============================================================================
// SECTIONS
// ============================================================================

/// Target API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Base URL of the job API
    pub base_url: String,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,

    /// Idle connections kept per host by the shared client
    pub max_idle_per_host: usize,

    /// Bearer token sent with every request
    pub auth_token: Option<String>,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            request_timeout_secs: 30,
            max_idle_per_host: 64,
            auth_token: None,
        }
    }
}

impl TargetConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Workflow parameters for one iteration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    /// Chat message submitted with every job
    pub message: String,

    /// Chat id; empty asks the API to open a new chat
    pub chat_id: String,

    /// Fixed sleep before every status poll, in milliseconds
    pub poll_interval_ms: u64,

    /// Retry budget for status polling
    pub max_poll_attempts: u32,

    /// Sleep between iterations of one virtual user, in milliseconds
    pub iteration_pause_ms: u64,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            message: "my k6 test".to_string(),
            chat_id: String::new(),
            poll_interval_ms: 2_000,
            max_poll_attempts: 10,
            iteration_pause_ms: 1_000,
        }
    }
}

impl ScenarioConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn iteration_pause(&self) -> Duration {
        Duration::from_millis(self.iteration_pause_ms)
    }
}

/// Scheduling parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Concurrent virtual users
    pub vus: usize,

    /// Window in which new iterations may start, in seconds
    pub duration_secs: u64,

    /// Optional cap on iterations per virtual user
    pub iterations: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            vus: 20,
            duration_secs: 5,
            iterations: None,
        }
    }
}

impl RunConfig {
    /// Run window; zero when only an iteration cap bounds the run
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }
}

/// Post-run thresholds; unset thresholds are not evaluated
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Minimum fraction of passing checks across all labels (0.0 - 1.0)
    pub min_check_pass_rate: Option<f64>,

    /// Maximum p99 latency of status polls, in milliseconds
    pub max_status_p99_ms: Option<u64>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
