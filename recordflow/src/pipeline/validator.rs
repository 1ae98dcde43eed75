//! Static validation of the pipeline order and dependency graph.

use super::StageRegistry;
use crate::errors::PipelineError;
use std::collections::HashSet;
use tracing::warn;

/// Validates a pipeline order against the registry.
///
/// Fails if a scheduled stage is not registered or if the dependency graph
/// over all registered stages has a cycle. Stages scheduled before one of
/// their dependencies are accepted with a warning, since dependency gating
/// happens at execution time.
pub fn validate_pipeline(registry: &StageRegistry, order: &[String]) -> Result<(), PipelineError> {
    if let Some(unknown) = order.iter().find(|name| !registry.contains(name)) {
        return Err(PipelineError::unknown_stage(unknown.clone()));
    }

    validate_acyclic(registry)?;

    for (stage, dependency) in ordering_violations(registry, order) {
        warn!(
            stage = %stage,
            dependency = %dependency,
            "Stage is scheduled before its dependency; it will fail dependency gating"
        );
    }

    Ok(())
}

/// Checks that the dependency graph over every registered stage is acyclic.
///
/// Depth-first traversal in registration order with an on-stack set; the
/// first stage revisited while still on the stack is reported. Runs in
/// O(stages + edges).
pub fn validate_acyclic(registry: &StageRegistry) -> Result<(), PipelineError> {
    let mut visited = HashSet::new();
    let mut on_stack = HashSet::new();
    let mut path = Vec::new();

    for name in registry.names() {
        if !visited.contains(name.as_str()) {
            visit(registry, name, &mut visited, &mut on_stack, &mut path)?;
        }
    }

    Ok(())
}

fn visit<'a>(
    registry: &'a StageRegistry,
    node: &'a str,
    visited: &mut HashSet<&'a str>,
    on_stack: &mut HashSet<&'a str>,
    path: &mut Vec<&'a str>,
) -> Result<(), PipelineError> {
    visited.insert(node);
    on_stack.insert(node);
    path.push(node);

    if let Some(definition) = registry.get(node) {
        for dep in &definition.settings.dependencies {
            if on_stack.contains(dep.as_str()) {
                let start = path.iter().position(|n| *n == dep.as_str()).unwrap_or(0);
                let mut cycle: Vec<String> = path[start..].iter().map(|s| (*s).to_string()).collect();
                cycle.push(dep.clone());
                return Err(PipelineError::CyclicDependency {
                    stage: dep.clone(),
                    cycle,
                });
            }
            if visited.contains(dep.as_str()) {
                continue;
            }
            if !registry.contains(dep) {
                return Err(PipelineError::unknown_dependency(dep.clone(), node));
            }
            visit(registry, dep, visited, on_stack, path)?;
        }
    }

    path.pop();
    on_stack.remove(node);
    Ok(())
}

/// Returns `(stage, dependency)` pairs where the dependency is not scheduled
/// earlier than the stage.
#[must_use]
pub fn ordering_violations(registry: &StageRegistry, order: &[String]) -> Vec<(String, String)> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut violations = Vec::new();

    for name in order {
        if let Some(definition) = registry.get(name) {
            for dep in &definition.settings.dependencies {
                if !seen.contains(dep.as_str()) {
                    violations.push((name.clone(), dep.clone()));
                }
            }
        }
        seen.insert(name);
    }

    violations
}
