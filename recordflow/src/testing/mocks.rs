//! Mock stages for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;

use crate::context::ExecutionContext;
use crate::stages::Stage;

/// A stage that always fails with the same message.
#[derive(Debug)]
pub struct FailingStage {
    error: String,
    calls: Mutex<u32>,
}

impl FailingStage {
    /// Creates a new failing stage.
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            calls: Mutex::new(0),
        }
    }

    /// Returns the number of times the stage was called.
    #[must_use]
    pub fn calls(&self) -> u32 {
        *self.calls.lock()
    }
}

#[async_trait]
impl Stage for FailingStage {
    async fn execute(&self, _ctx: &mut ExecutionContext, _attempt: u32) -> anyhow::Result<Value> {
        *self.calls.lock() += 1;
        anyhow::bail!("{}", self.error)
    }
}

/// A stage that fails its first `failures` calls, then succeeds.
///
/// Call instants come from `tokio::time`, so gaps are exact under a paused
/// clock.
#[derive(Debug)]
pub struct FlakyStage {
    failures: u32,
    calls: Mutex<Vec<Instant>>,
}

impl FlakyStage {
    /// Creates a stage that fails `failures` times before succeeding.
    #[must_use]
    pub fn new(failures: u32) -> Self {
        Self {
            failures,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Returns the number of calls so far.
    #[must_use]
    pub fn calls(&self) -> u32 {
        u32::try_from(self.calls.lock().len()).unwrap_or(u32::MAX)
    }

    /// Returns the time between consecutive calls.
    #[must_use]
    pub fn gaps(&self) -> Vec<Duration> {
        self.calls
            .lock()
            .windows(2)
            .map(|pair| pair[1].duration_since(pair[0]))
            .collect()
    }
}

#[async_trait]
impl Stage for FlakyStage {
    async fn execute(&self, _ctx: &mut ExecutionContext, attempt: u32) -> anyhow::Result<Value> {
        let call = {
            let mut calls = self.calls.lock();
            calls.push(Instant::now());
            calls.len()
        };
        if call <= self.failures as usize {
            anyhow::bail!("transient failure on attempt {attempt}");
        }
        Ok(serde_json::json!({ "succeeded_on": attempt }))
    }
}

/// A stage that takes time to execute.
#[derive(Debug)]
pub struct SlowStage {
    delay: Duration,
}

impl SlowStage {
    /// Creates a new slow stage.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// Creates a slow stage with delay in milliseconds.
    #[must_use]
    pub fn with_delay_ms(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }
}

#[async_trait]
impl Stage for SlowStage {
    async fn execute(&self, _ctx: &mut ExecutionContext, _attempt: u32) -> anyhow::Result<Value> {
        tokio::time::sleep(self.delay).await;
        Ok(Value::Null)
    }
}

/// A stage that rewrites every record and then never completes.
///
/// Only a timeout ends it.
#[derive(Debug, Clone, Copy, Default)]
pub struct HangingStage;

#[async_trait]
impl Stage for HangingStage {
    async fn execute(&self, ctx: &mut ExecutionContext, _attempt: u32) -> anyhow::Result<Value> {
        for record in &mut ctx.records {
            *record = Value::String("abandoned".to_string());
        }
        futures::future::pending::<()>().await;
        Ok(Value::Null)
    }
}

/// What a [`RecordingStage`] saw on one call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedExecution {
    /// The attempt number passed in.
    pub attempt: u32,
    /// Records in the context at call time.
    pub record_count: usize,
    /// Stage results present at call time, sorted.
    pub visible_results: Vec<String>,
    /// Run metadata at call time.
    pub metadata: serde_json::Map<String, Value>,
}

/// A stage that records every call and returns its call number.
#[derive(Debug, Default)]
pub struct RecordingStage {
    executions: Mutex<Vec<RecordedExecution>>,
}

impl RecordingStage {
    /// Creates a new recording stage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all recorded executions.
    #[must_use]
    pub fn executions(&self) -> Vec<RecordedExecution> {
        self.executions.lock().clone()
    }

    /// Returns the number of executions.
    #[must_use]
    pub fn execution_count(&self) -> usize {
        self.executions.lock().len()
    }
}

#[async_trait]
impl Stage for RecordingStage {
    async fn execute(&self, ctx: &mut ExecutionContext, attempt: u32) -> anyhow::Result<Value> {
        let mut visible_results: Vec<String> = ctx.stage_results.keys().cloned().collect();
        visible_results.sort();

        let mut executions = self.executions.lock();
        executions.push(RecordedExecution {
            attempt,
            record_count: ctx.records.len(),
            visible_results,
            metadata: ctx.metadata.clone().into_iter().collect(),
        });
        Ok(serde_json::json!({ "call": executions.len() }))
    }
}
