//! DAG builder for the phase dependency graph.
//!
//! The builder takes phase descriptors in declared order and produces a
//! validated `PhaseGraph`: every dependency must name a declared phase and
//! the graph must be acyclic. Violations are configuration errors raised at
//! construction, never at run time.

use std::collections::{HashMap, HashSet};

use crate::errors::PipelineError;
use crate::orchestrator::state::PipelineState;
use crate::phase::{Phase, PhaseDescriptor};

/// Index into the phase list.
pub type PhaseIndex = usize;

/// A directed acyclic graph of phases.
#[derive(Debug)]
pub struct PhaseGraph {
    /// Descriptors in declared order
    phases: Vec<PhaseDescriptor>,
    /// Map from phase name to index
    index_map: HashMap<String, PhaseIndex>,
    /// Forward edges: index -> phases that depend on it
    forward_edges: Vec<Vec<PhaseIndex>>,
    /// Reverse edges: index -> phases it depends on
    reverse_edges: Vec<Vec<PhaseIndex>>,
    /// Topological order, ties broken by declared position
    order: Vec<PhaseIndex>,
}

impl PhaseGraph {
    /// The eleven pipeline phases.
    pub fn standard() -> Result<Self, PipelineError> {
        DagBuilder::new(Phase::ALL.iter().map(Phase::descriptor).collect()).build()
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    pub fn phases(&self) -> &[PhaseDescriptor] {
        &self.phases
    }

    pub fn get(&self, name: &str) -> Option<&PhaseDescriptor> {
        self.index_map.get(name).and_then(|&i| self.phases.get(i))
    }

    pub fn get_index(&self, name: &str) -> Option<PhaseIndex> {
        self.index_map.get(name).copied()
    }

    /// Phases that depend on the given phase.
    pub fn dependents(&self, index: PhaseIndex) -> &[PhaseIndex] {
        self.forward_edges.get(index).map_or(&[], |v| v.as_slice())
    }

    /// Phases the given phase depends on.
    pub fn dependencies(&self, index: PhaseIndex) -> &[PhaseIndex] {
        self.reverse_edges.get(index).map_or(&[], |v| v.as_slice())
    }

    /// Every declared phase in execution order.
    pub fn execution_order(&self) -> Vec<&PhaseDescriptor> {
        self.order.iter().map(|&i| &self.phases[i]).collect()
    }

    /// The requested phases in a valid execution order.
    ///
    /// Unknown names are rejected; duplicates collapse to one entry.
    pub fn topological_members(
        &self,
        requested: &[String],
    ) -> Result<Vec<&PhaseDescriptor>, PipelineError> {
        let mut wanted = HashSet::new();
        let mut unknown = Vec::new();
        for name in requested {
            match self.index_map.get(name) {
                Some(&i) => {
                    wanted.insert(i);
                }
                None => unknown.push(name.as_str()),
            }
        }
        if !unknown.is_empty() {
            return Err(PipelineError::Configuration(format!(
                "Unknown phase(s): {}. Valid phases: {}",
                unknown.join(", "),
                self.phases
                    .iter()
                    .map(|p| p.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }

        Ok(self
            .order
            .iter()
            .filter(|i| wanted.contains(i))
            .map(|&i| &self.phases[i])
            .collect())
    }

    /// Dependencies of `phase` whose status is not "completed".
    pub fn unmet_dependencies(&self, phase: &str, state: &PipelineState) -> Vec<String> {
        self.get(phase)
            .map(|desc| {
                desc.dependencies
                    .iter()
                    .filter(|dep| !state.is_completed(dep))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Builder for constructing phase graphs.
pub struct DagBuilder {
    phases: Vec<PhaseDescriptor>,
}

impl DagBuilder {
    pub fn new(phases: Vec<PhaseDescriptor>) -> Self {
        Self { phases }
    }

    pub fn build(self) -> Result<PhaseGraph, PipelineError> {
        let mut index_map = HashMap::new();
        for (i, phase) in self.phases.iter().enumerate() {
            if index_map.insert(phase.name.clone(), i).is_some() {
                return Err(PipelineError::Configuration(format!(
                    "Duplicate phase name: {}",
                    phase.name
                )));
            }
        }

        let mut forward_edges: Vec<Vec<PhaseIndex>> = vec![Vec::new(); self.phases.len()];
        let mut reverse_edges: Vec<Vec<PhaseIndex>> = vec![Vec::new(); self.phases.len()];

        for (to_idx, phase) in self.phases.iter().enumerate() {
            for dep in &phase.dependencies {
                let from_idx = *index_map.get(dep).ok_or_else(|| {
                    PipelineError::Configuration(format!(
                        "Unknown dependency '{}' in phase '{}': no phase with that name exists",
                        dep, phase.name
                    ))
                })?;
                forward_edges[from_idx].push(to_idx);
                reverse_edges[to_idx].push(from_idx);
            }
        }

        let mut graph = PhaseGraph {
            phases: self.phases,
            index_map,
            forward_edges,
            reverse_edges,
            order: Vec::new(),
        };
        graph.order = Self::topological_order(&graph)?;

        Ok(graph)
    }

    /// Kahn's algorithm, always taking the lowest declared index that is ready.
    fn topological_order(graph: &PhaseGraph) -> Result<Vec<PhaseIndex>, PipelineError> {
        let mut in_degree: Vec<usize> = graph.reverse_edges.iter().map(Vec::len).collect();
        let mut ready: std::collections::BTreeSet<PhaseIndex> = in_degree
            .iter()
            .enumerate()
            .filter(|&(_, deg)| *deg == 0)
            .map(|(i, _)| i)
            .collect();

        let mut order = Vec::with_capacity(graph.len());
        while let Some(node) = ready.pop_first() {
            order.push(node);
            for &dependent in graph.dependents(node) {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        if order.len() != graph.len() {
            let cycle_phases: Vec<&str> = in_degree
                .iter()
                .enumerate()
                .filter(|&(_, deg)| *deg > 0)
                .map(|(i, _)| graph.phases[i].name.as_str())
                .collect();
            return Err(PipelineError::Configuration(format!(
                "Cycle detected in phase dependencies. Involved phases: {:?}",
                cycle_phases
            )));
        }

        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phase(name: &str, deps: &[&str]) -> PhaseDescriptor {
        PhaseDescriptor::new(name, deps)
    }

    fn names(list: &[&PhaseDescriptor]) -> Vec<String> {
        list.iter().map(|p| p.name.clone()).collect()
    }

    #[test]
    fn test_standard_graph_orders_alpha_chain() {
        let graph = PhaseGraph::standard().unwrap();
        assert_eq!(graph.len(), 11);

        let order = names(&graph.execution_order());
        let pos = |n: &str| order.iter().position(|x| x == n).unwrap();
        assert!(pos("premultiply") < pos("alpha_split"));
        assert!(pos("alpha_split") < pos("alpha_upscale"));
        assert!(pos("upscale") < pos("recombine"));
        assert!(pos("alpha_upscale") < pos("recombine"));
        assert!(pos("recombine") < pos("verify"));
        assert!(pos("scrub") < pos("generate_mod"));
    }

    #[test]
    fn test_recombine_has_three_prerequisites() {
        let graph = PhaseGraph::standard().unwrap();
        let idx = graph.get_index("recombine").unwrap();
        let deps: Vec<&str> = graph
            .dependencies(idx)
            .iter()
            .map(|&i| graph.phases()[i].name.as_str())
            .collect();
        assert_eq!(deps, vec!["upscale", "alpha_split", "alpha_upscale"]);
    }

    #[test]
    fn test_topological_members_ignores_request_order() {
        let graph = DagBuilder::new(vec![
            phase("a", &[]),
            phase("b", &["a"]),
            phase("c", &["b"]),
        ])
        .build()
        .unwrap();

        let members = graph
            .topological_members(&["c".into(), "a".into(), "c".into()])
            .unwrap();
        assert_eq!(names(&members), vec!["a", "c"]);
    }

    #[test]
    fn test_topological_members_rejects_unknown_phase() {
        let graph = PhaseGraph::standard().unwrap();
        let err = graph
            .topological_members(&["upscale".into(), "sharpen".into()])
            .unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
        assert!(err.to_string().contains("sharpen"));
    }

    #[test]
    fn test_unmet_dependencies_reads_state() {
        let graph = PhaseGraph::standard().unwrap();
        let mut state = PipelineState::default();
        state.insert("upscale", "completed");
        state.insert("alpha_split", "failed: disk full");

        let unmet = graph.unmet_dependencies("recombine", &state);
        assert_eq!(unmet, vec!["alpha_split", "alpha_upscale"]);
    }

    #[test]
    fn test_cycle_detection() {
        let result = DagBuilder::new(vec![
            phase("a", &["c"]),
            phase("b", &["a"]),
            phase("c", &["b"]),
        ])
        .build();
        let err = result.unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
        assert!(err.to_string().contains("Cycle"));
    }

    #[test]
    fn test_missing_dependency() {
        let err = DagBuilder::new(vec![phase("a", &["nonexistent"])])
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("nonexistent"));
    }

    #[test]
    fn test_duplicate_phase_name() {
        let err = DagBuilder::new(vec![phase("a", &[]), phase("a", &[])])
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("Duplicate"));
    }

    #[test]
    fn test_declared_order_breaks_ties() {
        let graph = DagBuilder::new(vec![
            phase("root", &[]),
            phase("left", &["root"]),
            phase("right", &["root"]),
            phase("join", &["right", "left"]),
        ])
        .build()
        .unwrap();
        assert_eq!(
            names(&graph.execution_order()),
            vec!["root", "left", "right", "join"]
        );
    }
}
