//! Virtual-user scheduler
//!
//! One tokio task per virtual user. Each task asks its gate before starting an iteration;
//! an iteration already in flight always runs to its own terminal state.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::mpsc;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info};

use crate::config::{RunConfig, ScenarioConfig};
use crate::error::Result;
use crate::metrics::RunMetrics;
use crate::scenario::{IterationReport, VirtualUserScenario};

/// Decides whether a virtual user may start another iteration
pub trait IterationGate: Send + Sync {
    /// `completed` counts the calling user's finished iterations
    fn may_start(&self, completed: u64) -> bool;
}

/// Admits iterations until a deadline and, optionally, up to a per-user cap
#[derive(Debug, Clone, Copy)]
pub struct RunGate {
    deadline: Option<Instant>,
    max_iterations: Option<u64>,
}

impl RunGate {
    pub fn new(deadline: Option<Instant>, max_iterations: Option<u64>) -> Self {
        Self {
            deadline,
            max_iterations,
        }
    }

    /// A zero duration means no deadline; only the iteration cap applies
    pub fn from_config(config: &RunConfig, start: Instant) -> Self {
        let deadline = (config.duration() > Duration::ZERO).then(|| start + config.duration());
        Self::new(deadline, config.iterations)
    }
}

impl IterationGate for RunGate {
    fn may_start(&self, completed: u64) -> bool {
        let before_deadline = self.deadline.map_or(true, |d| Instant::now() < d);
        let under_cap = self.max_iterations.map_or(true, |max| completed < max);
        before_deadline && under_cap
    }
}

/// Main load test runner
pub struct LoadTestRunner {
    vus: usize,
    pause: Duration,
    scenario: Arc<VirtualUserScenario>,
}

impl LoadTestRunner {
    pub fn new(vus: usize, pause: Duration, scenario: VirtualUserScenario) -> Self {
        Self {
            vus,
            pause,
            scenario: Arc::new(scenario),
        }
    }

    pub fn from_config(
        run: &RunConfig,
        scenario_config: &ScenarioConfig,
        scenario: VirtualUserScenario,
    ) -> Self {
        Self::new(run.vus, scenario_config.iteration_pause(), scenario)
    }

    /// Run until every virtual user is refused by the gate
    pub async fn run(&self, gate: Arc<dyn IterationGate>) -> Result<RunMetrics> {
        let mut metrics = RunMetrics::new(self.vus)?;
        let start = Instant::now();
        info!("Starting {} virtual users", self.vus);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let handles: Vec<_> = (0..self.vus)
            .map(|vu| {
                tokio::spawn(virtual_user(
                    vu,
                    self.scenario.clone(),
                    gate.clone(),
                    self.pause,
                    tx.clone(),
                ))
            })
            .collect();
        drop(tx);

        while let Some(report) = rx.recv().await {
            metrics.record_iteration(&report);
        }

        for (vu, result) in join_all(handles).await.into_iter().enumerate() {
            if let Err(e) = result {
                error!("Virtual user {} aborted: {}", vu, e);
            }
        }

        metrics.finish(start.elapsed());
        info!(
            "Load test complete: {} iterations in {:.2}s",
            metrics.iterations(),
            start.elapsed().as_secs_f64()
        );
        Ok(metrics)
    }
}

async fn virtual_user(
    vu: usize,
    scenario: Arc<VirtualUserScenario>,
    gate: Arc<dyn IterationGate>,
    pause: Duration,
    reports: mpsc::UnboundedSender<IterationReport>,
) {
    let mut completed = 0;
    while gate.may_start(completed) {
        let report = scenario.run_iteration(vu, completed).await;
        let pauses = report.outcome.pauses_after();
        debug!("VU {} iteration {} ended: {}", vu, completed, report.outcome.as_str());

        if reports.send(report).is_err() {
            break;
        }
        completed += 1;

        if pauses {
            sleep(pause).await;
        }
    }
    debug!("VU {} stopped after {} iterations", vu, completed);
}
