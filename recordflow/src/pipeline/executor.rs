//! Runs a single stage: dependency gating, timeout and retry.

use super::backoff::{RetryDecision, RetryPolicy};
use super::registry::StageDefinition;
use crate::context::ExecutionContext;
use crate::core::StageAttempt;
use crate::errors::PipelineError;
use crate::events::{EventBus, PipelineEvent};
use crate::metrics::RunMetrics;
use parking_lot::RwLock;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Result of one stage invocation.
#[derive(Debug)]
pub struct StageOutcome {
    /// Attempts made; zero when dependency gating failed.
    pub attempts: u32,
    /// Wall time including backoff.
    pub elapsed: Duration,
    /// The terminal error, if the stage failed.
    pub result: Result<(), PipelineError>,
}

impl StageOutcome {
    /// Returns true if the stage succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Executes stage definitions against a run's context.
pub struct StageExecutor<'a> {
    events: &'a EventBus,
    metrics: &'a RwLock<RunMetrics>,
}

impl<'a> StageExecutor<'a> {
    /// Creates an executor that reports to the given bus and metrics.
    #[must_use]
    pub fn new(events: &'a EventBus, metrics: &'a RwLock<RunMetrics>) -> Self {
        Self { events, metrics }
    }

    /// Runs one stage to success or terminal failure.
    ///
    /// Every attempt runs on a copy of `ctx`; the copy replaces `ctx` only
    /// when the attempt succeeds. An attempt that exceeds the stage timeout
    /// is dropped. Attempt records are appended to `ctx.attempts` either way.
    pub async fn execute(&self, definition: &StageDefinition, ctx: &mut ExecutionContext) -> StageOutcome {
        let name = definition.name.as_str();
        let settings = &definition.settings;
        let started = Instant::now();

        if let Some(missing) = settings.dependencies.iter().find(|dep| !ctx.has_result(dep)) {
            return StageOutcome {
                attempts: 0,
                elapsed: started.elapsed(),
                result: Err(PipelineError::unsatisfied(name, missing.clone())),
            };
        }

        self.events.emit(&PipelineEvent::StageStart {
            run_id: ctx.run_id,
            stage: name.to_string(),
        });

        let policy = RetryPolicy::new(settings.attempt_budget());
        let mut attempt = 1;

        loop {
            debug!(stage = %name, attempt, "Running stage attempt");
            let mut record = StageAttempt::start(name, attempt);
            let mut working = ctx.clone();

            let result = match tokio::time::timeout(
                settings.timeout(),
                definition.runner.execute(&mut working, attempt),
            )
            .await
            {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => Err(PipelineError::execution(name, attempt, &e)),
                Err(_) => Err(PipelineError::StageTimeout {
                    stage: name.to_string(),
                    timeout_ms: settings.timeout_ms,
                    attempt,
                }),
            };

            match result {
                Ok(value) => {
                    record.succeed();
                    working.run_id = ctx.run_id;
                    working.attempts = std::mem::take(&mut ctx.attempts);
                    *ctx = working;
                    ctx.attempts.push(record);
                    ctx.stage_results.insert(name.to_string(), value);

                    let elapsed = started.elapsed();
                    self.metrics.write().record_stage(name, elapsed, true);
                    debug!(stage = %name, attempt, elapsed_ms = elapsed.as_millis() as u64, "Stage completed");

                    self.events.emit(&PipelineEvent::StageComplete {
                        run_id: ctx.run_id,
                        stage: name.to_string(),
                        attempts: attempt,
                        duration_ms: elapsed.as_secs_f64() * 1000.0,
                    });

                    return StageOutcome {
                        attempts: attempt,
                        elapsed,
                        result: Ok(()),
                    };
                }
                Err(error) => {
                    record.fail(error.to_string());
                    ctx.attempts.push(record);

                    match policy.decide(attempt, &error) {
                        RetryDecision::Retry(delay) => {
                            warn!(
                                stage = %name,
                                attempt,
                                delay_ms = delay.as_millis() as u64,
                                error = %error,
                                "Stage attempt failed, retrying"
                            );
                            self.events.emit(&PipelineEvent::StageRetry {
                                run_id: ctx.run_id,
                                stage: name.to_string(),
                                attempt,
                                delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                                error: error.to_string(),
                            });
                            tokio::time::sleep(delay).await;
                            attempt += 1;
                        }
                        RetryDecision::GiveUp | RetryDecision::NotRetryable => {
                            let elapsed = started.elapsed();
                            self.metrics.write().record_stage(name, elapsed, false);

                            return StageOutcome {
                                attempts: attempt,
                                elapsed,
                                result: Err(error),
                            };
                        }
                    }
                }
            }
        }
    }
}
