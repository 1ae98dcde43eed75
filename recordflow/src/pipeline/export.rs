//! Serializable snapshot of an orchestrator's configuration and state.

use super::registry::StageSettings;
use crate::config::PipelineConfig;
use crate::errors::PipelineError;
use crate::metrics::RunMetrics;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Exported pipeline: stage order, stage settings, config and metrics.
///
/// Executables are not serializable; [`super::PipelineOrchestrator::from_export`]
/// asks the host to supply them by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineExport {
    /// Stage names in execution order.
    pub pipeline: Vec<String>,
    /// Registered stages as `[name, settings]` pairs, in registration order.
    pub stages: Vec<(String, StageSettings)>,
    /// Orchestrator configuration.
    pub config: PipelineConfig,
    /// Metrics at export time.
    pub metrics: RunMetrics,
}

impl PipelineExport {
    /// Serializes to pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String, PipelineError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses an export from JSON.
    pub fn from_json(json: &str) -> Result<Self, PipelineError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Writes the export to a file as JSON.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<(), PipelineError> {
        fs::write(path, self.to_json_pretty()?)?;
        Ok(())
    }

    /// Reads an export from a JSON file.
    pub fn read_from(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}
