//! Scenario execution
//!
//! Scenarios run one after another. Each gets a fresh [`StoreTestContext`],
//! so the orders it creates are tracked in its own scope and deleted once it
//! finishes, whether it passed or not.

use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::client::StoreApi;
use crate::orchestrator::{StoreTestContext, ORDER_PROCESSING_DELAY};
use crate::retry::CancellationToken;
use crate::scenarios::{Scenario, Suite};

/// Result of a single scenario
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    pub name: String,
    pub suite: Suite,
    pub description: String,
    pub success: bool,
    pub duration_ms: u64,
    pub error_message: Option<String>,
    pub cleanup_attempted: usize,
    pub cleanup_failures: usize,
}

/// Overall run result
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub environment: String,
    pub started_at: DateTime<Utc>,
    pub results: Vec<ScenarioResult>,
    pub total_duration_ms: u64,
    pub passed: usize,
    pub failed: usize,
    pub interrupted: bool,
}

impl RunSummary {
    pub fn new(environment: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
            started_at: Utc::now(),
            results: Vec::new(),
            total_duration_ms: 0,
            passed: 0,
            failed: 0,
            interrupted: false,
        }
    }

    pub fn add_result(&mut self, result: ScenarioResult) {
        if result.success {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
        self.total_duration_ms += result.duration_ms;
        self.results.push(result);
    }

    pub fn is_successful(&self) -> bool {
        self.failed == 0 && !self.interrupted
    }

    pub fn failures(&self) -> impl Iterator<Item = &ScenarioResult> {
        self.results.iter().filter(|r| !r.success)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Plain text report, one line per scenario
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for result in &self.results {
            let mark = if result.success { "PASS" } else { "FAIL" };
            out.push_str(&format!(
                "[{}] {:<9} {} ({} ms)\n",
                mark, result.suite, result.name, result.duration_ms
            ));
            if let Some(message) = &result.error_message {
                out.push_str(&format!("       {}\n", message));
            }
            if result.cleanup_failures > 0 {
                out.push_str(&format!(
                    "       cleanup: {} of {} deletions failed\n",
                    result.cleanup_failures, result.cleanup_attempted
                ));
            }
        }
        out.push_str(&format!(
            "\n{} passed, {} failed ({} ms, environment {})\n",
            self.passed, self.failed, self.total_duration_ms, self.environment
        ));
        if self.interrupted {
            out.push_str("Run interrupted before all scenarios completed\n");
        }
        out
    }
}

/// Runs scenarios serially against one [`StoreApi`]
pub struct ScenarioRunner {
    api: Arc<dyn StoreApi>,
    environment: String,
    cancellation: CancellationToken,
    processing_delay: Duration,
}

impl ScenarioRunner {
    pub fn new(api: Arc<dyn StoreApi>, environment: impl Into<String>) -> Self {
        Self {
            api,
            environment: environment.into(),
            cancellation: CancellationToken::new(),
            processing_delay: ORDER_PROCESSING_DELAY,
        }
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn with_processing_delay(mut self, delay: Duration) -> Self {
        self.processing_delay = delay;
        self
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub async fn run(&self, scenarios: &[Scenario]) -> RunSummary {
        let mut summary = RunSummary::new(self.environment.clone());
        log::info!("Running {} scenarios against environment {}", scenarios.len(), self.environment);

        for scenario in scenarios {
            if self.cancellation.is_cancelled() {
                log::warn!("Cancellation requested, skipping remaining scenarios");
                summary.interrupted = true;
                break;
            }
            summary.add_result(self.run_scenario(scenario).await);
        }

        log::info!(
            "Run finished: {} passed, {} failed",
            summary.passed,
            summary.failed
        );
        summary
    }

    pub async fn run_scenario(&self, scenario: &Scenario) -> ScenarioResult {
        let name = scenario.name();
        log::info!("Starting test: {}", name);

        let mut ctx = StoreTestContext::new(self.api.clone())
            .with_cancellation(self.cancellation.clone())
            .with_processing_delay(self.processing_delay);

        let start = Instant::now();
        let outcome = scenario.run(&mut ctx).await;
        let duration = start.elapsed();

        let cleanup = ctx.perform_order_cleanup().await;

        let error_message = match &outcome {
            Ok(()) => {
                log::info!("Test {} passed in {:?}", name, duration);
                None
            }
            Err(e) => {
                log::error!("Test {} failed: {}", name, e);
                Some(e.to_string())
            }
        };

        ScenarioResult {
            name,
            suite: scenario.suite(),
            description: scenario.description().to_string(),
            success: outcome.is_ok(),
            duration_ms: duration.as_millis() as u64,
            error_message,
            cleanup_attempted: cleanup.attempted(),
            cleanup_failures: cleanup.failures(),
        }
    }
}
