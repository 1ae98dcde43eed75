//! Named stage definitions.

use crate::config::PipelineConfig;
use crate::errors::PipelineError;
use crate::stages::Stage;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Options supplied when registering a stage.
///
/// Unset timeout and retry values fall back to the orchestrator's
/// configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageOptions {
    /// Stages whose results must exist before this stage runs.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Per-attempt timeout in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Attempt budget; `1` means a single try.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    /// Record failures and keep going instead of aborting the run.
    #[serde(default)]
    pub continue_on_error: bool,
}

impl StageOptions {
    /// Creates empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a dependency.
    #[must_use]
    pub fn depends_on(mut self, dep: impl Into<String>) -> Self {
        self.dependencies.push(dep.into());
        self
    }

    /// Sets the dependencies.
    #[must_use]
    pub fn with_dependencies(mut self, deps: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the timeout.
    #[must_use]
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Sets the attempt budget.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Lets the run continue past this stage's failures.
    #[must_use]
    pub fn continue_on_error(mut self) -> Self {
        self.continue_on_error = true;
        self
    }

    /// Fills unset values from the configuration.
    pub fn resolve(&self, config: &PipelineConfig) -> Result<StageSettings, PipelineError> {
        let timeout_ms = self.timeout_ms.unwrap_or(config.timeout_ms);
        if timeout_ms == 0 {
            return Err(PipelineError::Config("stage timeout_ms must be positive".to_string()));
        }

        Ok(StageSettings {
            dependencies: self.dependencies.clone(),
            timeout_ms,
            max_retries: self.max_retries.unwrap_or(config.retry_attempts),
            continue_on_error: self.continue_on_error,
        })
    }
}

/// Resolved execution options of a registered stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSettings {
    /// Stages whose results must exist before this stage runs.
    pub dependencies: Vec<String>,
    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: u64,
    /// Attempt budget as configured.
    pub max_retries: u32,
    /// Record failures and keep going instead of aborting the run.
    pub continue_on_error: bool,
}

impl StageSettings {
    /// Returns the per-attempt timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Number of attempts the executor makes; a budget of zero still runs
    /// the stage once.
    #[must_use]
    pub fn attempt_budget(&self) -> u32 {
        self.max_retries.max(1)
    }
}

impl From<StageSettings> for StageOptions {
    fn from(settings: StageSettings) -> Self {
        Self {
            dependencies: settings.dependencies,
            timeout_ms: Some(settings.timeout_ms),
            max_retries: Some(settings.max_retries),
            continue_on_error: settings.continue_on_error,
        }
    }
}

/// A registered stage.
#[derive(Debug, Clone)]
pub struct StageDefinition {
    /// The unique stage name.
    pub name: String,
    /// Resolved execution options.
    pub settings: StageSettings,
    /// The stage implementation.
    pub runner: Arc<dyn Stage>,
}

/// Stage definitions keyed by name.
#[derive(Debug, Clone, Default)]
pub struct StageRegistry {
    stages: HashMap<String, Arc<StageDefinition>>,
    /// Registration order, for deterministic traversal and export.
    order: Vec<String>,
}

impl StageRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a stage, replacing any stage with the same name.
    ///
    /// Returns the replaced definition.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        runner: Arc<dyn Stage>,
        settings: StageSettings,
    ) -> Option<Arc<StageDefinition>> {
        let name = name.into();
        let definition = Arc::new(StageDefinition {
            name: name.clone(),
            settings,
            runner,
        });

        let previous = self.stages.insert(name.clone(), definition);
        if previous.is_some() {
            warn!(stage = %name, "Stage already registered; overwriting definition");
        } else {
            self.order.push(name);
        }
        previous
    }

    /// Returns the definition of a stage.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<StageDefinition>> {
        self.stages.get(name)
    }

    /// Returns true if the stage is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.stages.contains_key(name)
    }

    /// Returns stage names in registration order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.order
    }

    /// Iterates definitions in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<StageDefinition>> {
        self.order.iter().filter_map(|name| self.stages.get(name))
    }

    /// Returns the number of registered stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}
