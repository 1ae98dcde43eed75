//! Top-level API: registration, scheduling, runs and observability.

use super::executor::StageExecutor;
use super::export::PipelineExport;
use super::registry::{StageDefinition, StageOptions, StageRegistry};
use super::validator::validate_pipeline;
use crate::checkpoint::{Checkpoint, CheckpointManager};
use crate::config::PipelineConfig;
use crate::context::ExecutionContext;
use crate::core::Record;
use crate::errors::{PipelineError, RunError};
use crate::events::{EventBus, EventKind, EventSink, PipelineEvent, Subscription};
use crate::metrics::{ErrorReport, RunMetrics};
use crate::stages::Stage;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Per-run options.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Metadata seeded into the run's context.
    pub metadata: HashMap<String, serde_json::Value>,
}

impl RunOptions {
    /// Creates empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    fn context_for(&self, records: Vec<Record>) -> ExecutionContext {
        let mut ctx = ExecutionContext::new(records);
        ctx.metadata.extend(self.metadata.clone());
        ctx
    }
}

/// Outcome of one chunk of a batched run.
#[derive(Debug)]
pub enum BatchOutcome {
    /// The chunk ran to completion.
    Completed {
        /// Zero-based chunk index.
        index: usize,
        /// The chunk's final context.
        context: ExecutionContext,
    },
    /// The chunk's run aborted.
    Failed {
        /// Zero-based chunk index.
        index: usize,
        /// Why it aborted.
        error: RunError,
        /// The chunk's input records.
        batch: Vec<Record>,
    },
}

impl BatchOutcome {
    /// Returns the chunk index.
    #[must_use]
    pub fn index(&self) -> usize {
        match self {
            Self::Completed { index, .. } | Self::Failed { index, .. } => *index,
        }
    }

    /// Returns true if the chunk completed.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

#[derive(Debug, Default)]
struct PipelineState {
    order: Vec<String>,
    /// False once the registry changed after the order was validated.
    validated: bool,
}

/// Holds the running flag for one run or batched operation.
///
/// Dropping it clears the flag and records the total processing time, also
/// when the run future itself is dropped.
struct RunGuard<'a> {
    running: &'a AtomicBool,
    metrics: &'a RwLock<RunMetrics>,
    started: Instant,
}

impl<'a> RunGuard<'a> {
    fn acquire(running: &'a AtomicBool, metrics: &'a RwLock<RunMetrics>) -> Result<Self, PipelineError> {
        running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| PipelineError::PipelineAlreadyRunning)?;

        Ok(Self {
            running,
            metrics,
            started: Instant::now(),
        })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.metrics.write().total_processing_time_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        self.running.store(false, Ordering::Release);
    }
}

/// Runs record batches through a validated sequence of named stages.
///
/// One run at a time: `run`, `run_batched` and `run_from_checkpoint` fail
/// with [`PipelineError::PipelineAlreadyRunning`] while another is active,
/// and so do `register` and `set_pipeline`.
pub struct PipelineOrchestrator {
    config: PipelineConfig,
    registry: RwLock<StageRegistry>,
    state: RwLock<PipelineState>,
    metrics: RwLock<RunMetrics>,
    checkpoints: Mutex<CheckpointManager>,
    events: EventBus,
    running: AtomicBool,
}

impl std::fmt::Debug for PipelineOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineOrchestrator")
            .field("config", &self.config)
            .field("stages", &self.registry.read().names())
            .field("pipeline", &self.state.read().order)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl Default for PipelineOrchestrator {
    fn default() -> Self {
        Self::with_valid_config(PipelineConfig::default())
    }
}

impl PipelineOrchestrator {
    /// Creates an orchestrator after validating the configuration.
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self::with_valid_config(config))
    }

    fn with_valid_config(config: PipelineConfig) -> Self {
        let checkpoints = CheckpointManager::new(config.checkpoint_interval, config.max_checkpoints);
        Self {
            config,
            registry: RwLock::new(StageRegistry::new()),
            state: RwLock::new(PipelineState::default()),
            metrics: RwLock::new(RunMetrics::new()),
            checkpoints: Mutex::new(checkpoints),
            events: EventBus::default(),
            running: AtomicBool::new(false),
        }
    }

    /// Replaces the sink that receives every lifecycle event.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events.set_sink(sink);
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Registers a stage, replacing any stage with the same name.
    ///
    /// Unset options take the configuration defaults. The scheduled order is
    /// validated again before the next run.
    pub fn register(
        &self,
        name: impl Into<String>,
        runner: Arc<dyn Stage>,
        options: StageOptions,
    ) -> Result<(), PipelineError> {
        self.ensure_idle()?;
        let settings = options.resolve(&self.config)?;
        let name = name.into();

        debug!(stage = %name, dependencies = ?settings.dependencies, "Registering stage");
        self.registry.write().register(name, runner, settings);
        self.state.write().validated = false;
        Ok(())
    }

    /// Returns a registered stage definition.
    #[must_use]
    pub fn stage(&self, name: &str) -> Option<Arc<StageDefinition>> {
        self.registry.read().get(name).cloned()
    }

    /// Validates and stores the execution order.
    ///
    /// The previous order is kept if validation fails.
    pub fn set_pipeline<I, S>(&self, order: I) -> Result<(), PipelineError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ensure_idle()?;
        let order: Vec<String> = order.into_iter().map(Into::into).collect();
        validate_pipeline(&self.registry.read(), &order)?;

        info!(stages = ?order, "Pipeline order set");
        *self.state.write() = PipelineState { order, validated: true };
        Ok(())
    }

    /// Returns the scheduled stage order.
    #[must_use]
    pub fn pipeline(&self) -> Vec<String> {
        self.state.read().order.clone()
    }

    /// Returns true while a run is active.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Runs `records` through the pipeline.
    pub async fn run(&self, records: Vec<Record>) -> Result<ExecutionContext, RunError> {
        self.run_with_options(records, RunOptions::default()).await
    }

    /// Runs `records` through the pipeline with per-run options.
    ///
    /// Metrics are reset at the start. On failure the error carries the
    /// failing stage and the context as it stood.
    pub async fn run_with_options(
        &self,
        records: Vec<Record>,
        options: RunOptions,
    ) -> Result<ExecutionContext, RunError> {
        let _guard = RunGuard::acquire(&self.running, &self.metrics)?;
        self.begin_run();

        let (registry, order) = self.snapshot()?;
        self.execute_run(&registry, &order, options.context_for(records), false)
            .await
    }

    /// Runs `records` in sequential chunks of `batch_size` records.
    ///
    /// `None` uses the configured batch size. A failed chunk is reported in
    /// its outcome and does not stop later chunks. Metrics are reset once and
    /// accumulate over every chunk.
    pub async fn run_batched(
        &self,
        records: Vec<Record>,
        batch_size: Option<usize>,
        options: RunOptions,
    ) -> Result<Vec<BatchOutcome>, RunError> {
        let batch_size = batch_size.unwrap_or(self.config.batch_size);
        if batch_size == 0 {
            return Err(PipelineError::Config("batch_size must be positive".to_string()).into());
        }

        let _guard = RunGuard::acquire(&self.running, &self.metrics)?;
        self.begin_run();
        let (registry, order) = self.snapshot()?;

        let total = records.len();
        info!(records = total, batch_size, "Starting batched run");

        let mut outcomes = Vec::with_capacity(total.div_ceil(batch_size));
        let mut remaining = records;
        let mut index = 0;

        while !remaining.is_empty() {
            let rest = remaining.split_off(batch_size.min(remaining.len()));
            let batch = std::mem::replace(&mut remaining, rest);

            let ctx = options
                .context_for(batch.clone())
                .with_metadata("batch_index", serde_json::json!(index));

            let outcome = match self.execute_run(&registry, &order, ctx, false).await {
                Ok(context) => BatchOutcome::Completed { index, context },
                Err(error) => {
                    warn!(batch = index, error = %error, "Batch failed; continuing with next batch");
                    BatchOutcome::Failed { index, error, batch }
                }
            };
            outcomes.push(outcome);
            index += 1;
        }

        let failed = outcomes.iter().filter(|o| !o.is_completed()).count();
        info!(batches = outcomes.len(), failed, "Batched run finished");
        Ok(outcomes)
    }

    /// Runs `records` starting from a stored checkpoint.
    ///
    /// Stage results are seeded from the checkpoint, and stages that already
    /// have a result are skipped.
    pub async fn run_from_checkpoint(
        &self,
        records: Vec<Record>,
        checkpoint_id: &str,
    ) -> Result<ExecutionContext, RunError> {
        let checkpoint = self.recover(checkpoint_id)?;
        let _guard = RunGuard::acquire(&self.running, &self.metrics)?;
        self.begin_run();

        let (registry, order) = self.snapshot()?;
        info!(checkpoint_id = %checkpoint.id, "Resuming from checkpoint");
        let ctx = ExecutionContext::resume_from(records, &checkpoint);
        self.execute_run(&registry, &order, ctx, true).await
    }

    /// Subscribes a handler to one event kind.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&PipelineEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(kind, handler)
    }

    /// Returns a copy of the current metrics.
    #[must_use]
    pub fn metrics(&self) -> RunMetrics {
        self.metrics.read().clone()
    }

    /// Returns the error summary against the configured threshold.
    #[must_use]
    pub fn get_errors(&self) -> ErrorReport {
        self.metrics.read().error_report(self.config.error_threshold)
    }

    /// Takes a checkpoint of `ctx` at the current processed-record count.
    pub fn create_checkpoint(&self, ctx: &ExecutionContext) -> Checkpoint {
        let processed = self.metrics.read().processed_records;
        let checkpoint = self.checkpoints.lock().create_checkpoint(ctx, processed);
        self.emit_checkpoint(&checkpoint);
        checkpoint
    }

    /// Returns a stored checkpoint.
    pub fn recover(&self, checkpoint_id: &str) -> Result<Checkpoint, PipelineError> {
        self.checkpoints.lock().recover(checkpoint_id)
    }

    /// Returns the stored checkpoints, oldest first.
    #[must_use]
    pub fn checkpoints(&self) -> Vec<Checkpoint> {
        self.checkpoints.lock().checkpoints()
    }

    /// Exports the order, stage settings, config and metrics.
    #[must_use]
    pub fn export(&self) -> PipelineExport {
        let stages = self
            .registry
            .read()
            .iter()
            .map(|definition| (definition.name.clone(), definition.settings.clone()))
            .collect();

        PipelineExport {
            pipeline: self.pipeline(),
            stages,
            config: self.config.clone(),
            metrics: self.metrics(),
        }
    }

    /// Rebuilds an orchestrator from an export.
    ///
    /// `resolver` supplies the executable for each exported stage name.
    pub fn from_export<R>(export: PipelineExport, resolver: R) -> Result<Self, PipelineError>
    where
        R: Fn(&str) -> Option<Arc<dyn Stage>>,
    {
        let orchestrator = Self::new(export.config)?;
        {
            let mut registry = orchestrator.registry.write();
            for (name, settings) in export.stages {
                let runner = resolver(&name).ok_or_else(|| PipelineError::unknown_stage(name.clone()))?;
                registry.register(name, runner, settings);
            }
        }
        orchestrator.set_pipeline(export.pipeline)?;
        *orchestrator.metrics.write() = export.metrics;
        Ok(orchestrator)
    }

    fn ensure_idle(&self) -> Result<(), PipelineError> {
        if self.is_running() {
            return Err(PipelineError::PipelineAlreadyRunning);
        }
        Ok(())
    }

    /// Resets run metrics and the checkpoint progress marker.
    fn begin_run(&self) {
        self.metrics.write().reset();
        self.checkpoints.lock().begin_run();
    }

    /// Copies the registry and order for one run, validating first if the
    /// registry changed since the order was set.
    fn snapshot(&self) -> Result<(StageRegistry, Vec<String>), PipelineError> {
        let registry = self.registry.read().clone();
        let mut state = self.state.write();
        if !state.validated {
            validate_pipeline(&registry, &state.order)?;
            state.validated = true;
        }
        Ok((registry, state.order.clone()))
    }

    async fn execute_run(
        &self,
        registry: &StageRegistry,
        order: &[String],
        mut ctx: ExecutionContext,
        skip_completed: bool,
    ) -> Result<ExecutionContext, RunError> {
        let run_id = ctx.run_id;
        let input_count = ctx.records.len();
        let processed_before = self.metrics.read().processed_records;
        let started = Instant::now();

        info!(run_id = %run_id, records = input_count, stages = order.len(), "Pipeline run started");
        self.events.emit(&PipelineEvent::PipelineStart {
            run_id,
            record_count: input_count,
            stages: order.to_vec(),
        });

        let executor = StageExecutor::new(&self.events, &self.metrics);

        for name in order {
            if skip_completed && ctx.has_result(name) {
                debug!(run_id = %run_id, stage = %name, "Stage already completed; skipping");
                continue;
            }

            let Some(definition) = registry.get(name) else {
                return Err(self.abort(PipelineError::unknown_stage(name.clone()), name, 0, ctx, input_count));
            };

            let outcome = executor.execute(definition, &mut ctx).await;
            let Err(err) = outcome.result else {
                self.checkpoint_progress(&ctx, processed_before);
                continue;
            };

            let continued = definition.settings.continue_on_error && err.is_retryable();
            self.events.emit(&PipelineEvent::StageError {
                run_id,
                stage: name.clone(),
                error: err.to_string(),
                attempts: outcome.attempts,
                continued,
            });

            if !continued {
                return Err(self.abort(err, name, outcome.attempts, ctx, input_count));
            }

            warn!(run_id = %run_id, stage = %name, error = %err, "Stage failed; continuing");
            ctx.record_error(name.clone(), &err);
            self.checkpoint_progress(&ctx, processed_before);
        }

        let output_count = ctx.records.len();
        self.metrics.write().processed_records += output_count as u64;

        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
        info!(
            run_id = %run_id,
            records = output_count,
            errors = ctx.errors.len(),
            duration_ms,
            "Pipeline run completed"
        );
        self.events.emit(&PipelineEvent::PipelineComplete {
            run_id,
            record_count: output_count,
            duration_ms,
        });

        Ok(ctx)
    }

    fn abort(
        &self,
        err: PipelineError,
        stage: &str,
        attempts: u32,
        ctx: ExecutionContext,
        input_count: usize,
    ) -> RunError {
        error!(run_id = %ctx.run_id, stage = %stage, attempts, error = %err, "Pipeline run aborted");
        self.metrics.write().failed_records += input_count as u64;
        self.events.emit(&PipelineEvent::PipelineError {
            run_id: ctx.run_id,
            stage: Some(stage.to_string()),
            error: err.to_string(),
        });
        RunError::at_stage(err, stage, attempts, ctx)
    }

    /// Checkpoints any interval boundary reached by the records currently in
    /// `ctx`, counted on top of the records earlier batches processed.
    fn checkpoint_progress(&self, ctx: &ExecutionContext, processed_before: u64) {
        let current = processed_before + ctx.records.len() as u64;
        let created = self
            .checkpoints
            .lock()
            .record_progress(ctx, processed_before, current);
        for checkpoint in &created {
            self.emit_checkpoint(checkpoint);
        }
    }

    fn emit_checkpoint(&self, checkpoint: &Checkpoint) {
        self.events.emit(&PipelineEvent::CheckpointCreated {
            checkpoint_id: checkpoint.id.clone(),
            records_processed: checkpoint.records_processed,
        });
    }
}
