//! # Dependency Graph
//!
//! Static, immutable map from sub-step identifier to its owning phase and the
//! sub-step identifiers it depends on. Built once at configuration time and
//! injected by reference into every component that consults it; nothing
//! mutates it at runtime.
//!
//! Phase ordering is not enforced here as a barrier: a later-phase sub-step
//! waits only on the specific sub-steps it declares, which is what allows a
//! phase-4 sub-step to start the moment its phase-2 dependency completes.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use thiserror::Error;

use crate::models::core::ids::{PhaseId, SubStepId};

/// Errors raised while building a dependency graph from configuration
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Duplicate sub-step id '{0}' in workflow configuration")]
    DuplicateSubStep(SubStepId),

    #[error("Sub-step '{sub_step}' depends on unknown sub-step '{dependency}'")]
    UnknownDependency {
        sub_step: SubStepId,
        dependency: SubStepId,
    },

    #[error("Sub-step '{0}' depends on itself")]
    SelfDependency(SubStepId),

    #[error("Dependency cycle detected: {}", .path.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(" -> "))]
    CycleDetected { path: Vec<SubStepId> },
}

/// Serialized form of the graph; the reverse adjacency is rebuilt on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSpec {
    dependencies: BTreeMap<SubStepId, BTreeSet<SubStepId>>,
    phase_of: BTreeMap<SubStepId, PhaseId>,
}

/// Immutable sub-step dependency graph for one composite step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(into = "GraphSpec", from = "GraphSpec")]
pub struct DependencyGraph {
    dependencies: BTreeMap<SubStepId, BTreeSet<SubStepId>>,
    dependents: BTreeMap<SubStepId, BTreeSet<SubStepId>>,
    phase_of: BTreeMap<SubStepId, PhaseId>,
}

impl From<DependencyGraph> for GraphSpec {
    fn from(graph: DependencyGraph) -> Self {
        Self {
            dependencies: graph.dependencies,
            phase_of: graph.phase_of,
        }
    }
}

impl From<GraphSpec> for DependencyGraph {
    fn from(spec: GraphSpec) -> Self {
        let dependents = reverse_adjacency(&spec.dependencies);
        Self {
            dependencies: spec.dependencies,
            dependents,
            phase_of: spec.phase_of,
        }
    }
}

fn reverse_adjacency(
    dependencies: &BTreeMap<SubStepId, BTreeSet<SubStepId>>,
) -> BTreeMap<SubStepId, BTreeSet<SubStepId>> {
    let mut dependents: BTreeMap<SubStepId, BTreeSet<SubStepId>> = dependencies
        .keys()
        .map(|id| (id.clone(), BTreeSet::new()))
        .collect();
    for (sub_step, deps) in dependencies {
        for dep in deps {
            dependents
                .entry(dep.clone())
                .or_default()
                .insert(sub_step.clone());
        }
    }
    dependents
}

impl DependencyGraph {
    /// Start building a graph from configuration entries
    pub fn builder() -> DependencyGraphBuilder {
        DependencyGraphBuilder {
            entries: Vec::new(),
        }
    }

    /// Declared dependencies of a sub-step
    pub fn dependencies_of(&self, id: &SubStepId) -> Option<&BTreeSet<SubStepId>> {
        self.dependencies.get(id)
    }

    /// Sub-steps that directly depend on the given sub-step
    pub fn dependents_of(&self, id: &SubStepId) -> Option<&BTreeSet<SubStepId>> {
        self.dependents.get(id)
    }

    /// All sub-steps downstream of the given sub-step, direct and transitive.
    ///
    /// The result does not include the sub-step itself. Ordering is the
    /// lexicographic order of the id type, which keeps operator previews
    /// deterministic.
    pub fn transitive_dependents(&self, id: &SubStepId) -> BTreeSet<SubStepId> {
        let mut seen = BTreeSet::new();
        let mut queue: VecDeque<&SubStepId> = VecDeque::new();
        queue.push_back(id);
        while let Some(current) = queue.pop_front() {
            if let Some(children) = self.dependents.get(current) {
                for child in children {
                    if seen.insert(child.clone()) {
                        queue.push_back(child);
                    }
                }
            }
        }
        seen
    }

    /// Phase that owns the given sub-step
    pub fn phase_of(&self, id: &SubStepId) -> Option<&PhaseId> {
        self.phase_of.get(id)
    }

    /// Check whether the graph knows the given sub-step
    pub fn contains(&self, id: &SubStepId) -> bool {
        self.dependencies.contains_key(id)
    }

    /// Iterate over every sub-step id in the graph
    pub fn sub_steps(&self) -> impl Iterator<Item = &SubStepId> {
        self.dependencies.keys()
    }

    /// Number of sub-steps in the graph
    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    /// Check whether the graph has no sub-steps
    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }
}

/// Accumulates configuration entries and validates them into a graph.
pub struct DependencyGraphBuilder {
    entries: Vec<(SubStepId, PhaseId, Vec<SubStepId>)>,
}

impl DependencyGraphBuilder {
    /// Declare a sub-step, its owning phase and its dependencies
    pub fn sub_step(
        mut self,
        id: impl Into<SubStepId>,
        phase: impl Into<PhaseId>,
        depends_on: impl IntoIterator<Item = SubStepId>,
    ) -> Self {
        self.entries
            .push((id.into(), phase.into(), depends_on.into_iter().collect()));
        self
    }

    /// Validate the accumulated entries and build the immutable graph.
    ///
    /// Rejects duplicate ids, references to unknown sub-steps,
    /// self-dependencies and dependency cycles.
    pub fn build(self) -> Result<DependencyGraph, GraphError> {
        let mut dependencies: BTreeMap<SubStepId, BTreeSet<SubStepId>> = BTreeMap::new();
        let mut phase_of = BTreeMap::new();

        for (id, phase, deps) in &self.entries {
            if dependencies.contains_key(id) {
                return Err(GraphError::DuplicateSubStep(id.clone()));
            }
            if deps.contains(id) {
                return Err(GraphError::SelfDependency(id.clone()));
            }
            dependencies.insert(id.clone(), deps.iter().cloned().collect());
            phase_of.insert(id.clone(), phase.clone());
        }

        for (id, deps) in &dependencies {
            for dep in deps {
                if !dependencies.contains_key(dep) {
                    return Err(GraphError::UnknownDependency {
                        sub_step: id.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }

        detect_cycle(&dependencies)?;

        let dependents = reverse_adjacency(&dependencies);
        Ok(DependencyGraph {
            dependencies,
            dependents,
            phase_of,
        })
    }
}

#[derive(Clone, Copy, PartialEq)]
enum VisitState {
    Unvisited,
    InStack,
    Done,
}

/// Depth-first cycle check over the dependency edges.
fn detect_cycle(
    dependencies: &BTreeMap<SubStepId, BTreeSet<SubStepId>>,
) -> Result<(), GraphError> {
    let mut state: BTreeMap<&SubStepId, VisitState> = dependencies
        .keys()
        .map(|id| (id, VisitState::Unvisited))
        .collect();

    for start in dependencies.keys() {
        if state[start] != VisitState::Unvisited {
            continue;
        }
        // Iterative DFS keeping the in-stack path for cycle reporting.
        let mut stack: Vec<(&SubStepId, std::collections::btree_set::Iter<'_, SubStepId>)> =
            vec![(start, dependencies[start].iter())];
        state.insert(start, VisitState::InStack);

        while !stack.is_empty() {
            let next_child = match stack.last_mut() {
                Some((_, children)) => children.next(),
                None => None,
            };
            match next_child {
                Some(child) => match state[child] {
                    VisitState::InStack => {
                        let mut path: Vec<SubStepId> =
                            stack.iter().map(|(id, _)| (*id).clone()).collect();
                        path.push(child.clone());
                        return Err(GraphError::CycleDetected { path });
                    }
                    VisitState::Unvisited => {
                        state.insert(child, VisitState::InStack);
                        stack.push((child, dependencies[child].iter()));
                    }
                    VisitState::Done => {}
                },
                None => {
                    if let Some((node, _)) = stack.pop() {
                        state.insert(node, VisitState::Done);
                    }
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> SubStepId {
        SubStepId::from(s)
    }

    fn diamond() -> DependencyGraph {
        DependencyGraph::builder()
            .sub_step("a", "phase_1", [])
            .sub_step("b", "phase_2", [id("a")])
            .sub_step("c", "phase_2", [id("a")])
            .sub_step("d", "phase_3", [id("b"), id("c")])
            .build()
            .unwrap()
    }

    #[test]
    fn test_dependencies_and_phase_lookup() {
        let graph = diamond();
        assert!(graph.dependencies_of(&id("a")).unwrap().is_empty());
        assert_eq!(graph.dependencies_of(&id("d")).unwrap().len(), 2);
        assert_eq!(graph.phase_of(&id("b")).unwrap(), &PhaseId::from("phase_2"));
        assert_eq!(graph.len(), 4);
    }

    #[test]
    fn test_direct_and_transitive_dependents() {
        let graph = diamond();
        let direct: BTreeSet<SubStepId> = [id("b"), id("c")].into_iter().collect();
        assert_eq!(graph.dependents_of(&id("a")).unwrap(), &direct);

        let downstream = graph.transitive_dependents(&id("a"));
        assert_eq!(
            downstream,
            [id("b"), id("c"), id("d")].into_iter().collect()
        );
        assert!(graph.transitive_dependents(&id("d")).is_empty());

        assert!(graph.contains(&id("d")));
        assert!(!graph.contains(&id("ghost")));
    }

    #[test]
    fn test_duplicate_sub_step_rejected() {
        let result = DependencyGraph::builder()
            .sub_step("a", "phase_1", [])
            .sub_step("a", "phase_2", [])
            .build();
        assert!(matches!(result, Err(GraphError::DuplicateSubStep(_))));
    }

    #[test]
    fn test_unknown_dependency_rejected() {
        let result = DependencyGraph::builder()
            .sub_step("a", "phase_1", [id("ghost")])
            .build();
        assert!(matches!(
            result,
            Err(GraphError::UnknownDependency { .. })
        ));
    }

    #[test]
    fn test_self_dependency_rejected() {
        let result = DependencyGraph::builder()
            .sub_step("a", "phase_1", [id("a")])
            .build();
        assert!(matches!(result, Err(GraphError::SelfDependency(_))));
    }

    #[test]
    fn test_cycle_rejected() {
        let result = DependencyGraph::builder()
            .sub_step("a", "phase_1", [id("c")])
            .sub_step("b", "phase_1", [id("a")])
            .sub_step("c", "phase_1", [id("b")])
            .build();
        assert!(matches!(result, Err(GraphError::CycleDetected { .. })));
    }

    #[test]
    fn test_serde_round_trip_rebuilds_dependents() {
        let graph = diamond();
        let json = serde_json::to_string(&graph).unwrap();
        let restored: DependencyGraph = serde_json::from_str(&json).unwrap();
        assert_eq!(
            restored.transitive_dependents(&id("a")),
            graph.transitive_dependents(&id("a"))
        );
    }
}
