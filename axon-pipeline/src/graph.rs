//! DAG compilation: levels, cycle detection, writer-conflict checks.

use crate::config::{AgentSpec, ExecutionMode, PipelineConfig};
use crate::error::PipelineError;
use axon_context::{Namespace, Validator};
use std::collections::{BTreeMap, HashMap, HashSet};

/// A compiled, validated pipeline ready for execution.
#[derive(Debug, Clone)]
pub struct CompiledPipeline {
    /// The source configuration.
    pub config: PipelineConfig,
    /// Topological levels; agents within a level are sorted by id.
    pub levels: Vec<Vec<AgentSpec>>,
}

impl CompiledPipeline {
    /// All agent specs in execution order.
    pub fn agents(&self) -> impl Iterator<Item = &AgentSpec> {
        self.levels.iter().flatten()
    }
}

/// Compile a pipeline descriptor into levels.
///
/// Rejects duplicate ids, edges to unknown agents, dependency cycles,
/// and (in parallel mode) two same-level agents permitted to write the
/// same data namespace. Disabled agents are dropped; edges through
/// them are treated as satisfied.
///
/// # Errors
///
/// `DuplicateAgent`, `UnknownDependency`, `Cycle`, or
/// `ConflictingWriters`.
pub fn compile(config: &PipelineConfig, validator: &Validator) -> Result<CompiledPipeline, PipelineError> {
    let mut seen = HashSet::new();
    for spec in &config.agents {
        if !seen.insert(spec.id.as_str()) {
            return Err(PipelineError::DuplicateAgent(spec.id.clone()));
        }
    }

    let all_ids: HashSet<&str> = config.agents.iter().map(|a| a.id.as_str()).collect();
    for spec in &config.agents {
        for dep in &spec.depends_on {
            if !all_ids.contains(dep.as_str()) {
                return Err(PipelineError::UnknownDependency {
                    agent: spec.id.clone(),
                    dependency: dep.clone(),
                });
            }
        }
    }

    let enabled: Vec<&AgentSpec> = config.agents.iter().filter(|a| a.enabled).collect();
    let enabled_ids: HashSet<&str> = enabled.iter().map(|a| a.id.as_str()).collect();

    // Kahn's algorithm over the enabled subgraph. Edges to disabled
    // agents are dropped.
    let mut indegree: BTreeMap<&str, usize> = BTreeMap::new();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
    for spec in &enabled {
        let live_deps = spec
            .depends_on
            .iter()
            .filter(|d| enabled_ids.contains(d.as_str()))
            .count();
        indegree.insert(spec.id.as_str(), live_deps);
        for dep in &spec.depends_on {
            if enabled_ids.contains(dep.as_str()) {
                dependents.entry(dep.as_str()).or_default().push(spec.id.as_str());
            }
        }
    }

    let by_id: HashMap<&str, &AgentSpec> = enabled.iter().map(|a| (a.id.as_str(), *a)).collect();
    let mut levels: Vec<Vec<AgentSpec>> = Vec::new();
    let mut placed = 0usize;

    let mut ready: Vec<&str> = indegree
        .iter()
        .filter(|(_, d)| **d == 0)
        .map(|(id, _)| *id)
        .collect();
    while !ready.is_empty() {
        ready.sort_unstable();
        let level: Vec<AgentSpec> = ready.iter().map(|id| by_id[id].clone()).collect();
        placed += level.len();

        let mut next: Vec<&str> = Vec::new();
        for id in &ready {
            if let Some(children) = dependents.get(id) {
                for child in children {
                    let d = indegree.get_mut(child).expect("child was indexed");
                    *d -= 1;
                    if *d == 0 {
                        next.push(child);
                    }
                }
            }
        }
        levels.push(level);
        ready = next;
    }

    if placed != enabled.len() {
        let mut stuck: Vec<String> = indegree
            .iter()
            .filter(|(_, d)| **d > 0)
            .map(|(id, _)| id.to_string())
            .collect();
        stuck.sort_unstable();
        return Err(PipelineError::Cycle { agents: stuck });
    }

    if config.mode == ExecutionMode::Parallel {
        check_writer_conflicts(&levels, validator)?;
    }

    Ok(CompiledPipeline {
        config: config.clone(),
        levels,
    })
}

/// Reject levels where two agents may write the same data namespace.
/// Diagnostics and audit are scheduler-mediated and exempt.
fn check_writer_conflicts(
    levels: &[Vec<AgentSpec>],
    validator: &Validator,
) -> Result<(), PipelineError> {
    for level in levels {
        if level.len() < 2 {
            continue;
        }
        let mut writers: BTreeMap<Namespace, Vec<String>> = BTreeMap::new();
        for spec in level {
            for ns in validator.writable_namespaces(&spec.id) {
                if ns.is_data() {
                    writers.entry(ns).or_default().push(spec.id.clone());
                }
            }
        }
        for (namespace, agents) in writers {
            if agents.len() > 1 {
                return Err(PipelineError::ConflictingWriters { namespace, agents });
            }
        }
    }
    Ok(())
}
