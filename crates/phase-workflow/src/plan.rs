//! Declarative execution plans
//!
//! An `ExecutionPlan` is a directed acyclic graph of phase identifiers. Each
//! node lists the phases it depends on; the orchestrator dispatches a node
//! once all of them are terminal.

use phase_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// One phase in a plan together with its dependencies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanNode {
    pub id: String,
    pub dependencies: Vec<String>,
}

/// A validated dependency graph over phase identifiers
///
/// Nodes keep their insertion order, which is also the dispatch order
/// inside a group.
///
/// # Example
///
/// ```
/// use phase_workflow::ExecutionPlan;
///
/// let plan = ExecutionPlan::builder()
///     .root("fetch")
///     .phase("cluster", ["fetch"])
///     .phase("forecast", ["cluster"])
///     .phase("profile", ["cluster"])
///     .phase("synthesis", ["forecast", "profile"])
///     .build()
///     .unwrap();
///
/// assert_eq!(plan.waves().len(), 4);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    nodes: Vec<PlanNode>,
}

impl ExecutionPlan {
    /// Create a new plan builder
    pub fn builder() -> ExecutionPlanBuilder {
        ExecutionPlanBuilder::new()
    }

    /// Nodes in insertion order
    pub fn nodes(&self) -> &[PlanNode] {
        &self.nodes
    }

    /// Look up a node by identifier
    pub fn node(&self, id: &str) -> Option<&PlanNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    /// All identifiers in insertion order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|node| node.id.as_str())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Check identifiers are unique, dependencies exist and there is no cycle
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for node in &self.nodes {
            if !seen.insert(node.id.as_str()) {
                return Err(Error::DuplicatePhase(node.id.clone()));
            }
        }

        for node in &self.nodes {
            if let Some(missing) = node
                .dependencies
                .iter()
                .find(|dep| !seen.contains(dep.as_str()))
            {
                return Err(Error::UnknownDependency {
                    phase: node.id.clone(),
                    dependency: missing.clone(),
                });
            }
        }

        match self.find_cycle() {
            Some(cycle) => Err(Error::Cycle(cycle)),
            None => Ok(()),
        }
    }

    /// Topological layers: every phase appears one layer after its deepest
    /// dependency. Assumes the plan is valid.
    pub fn waves(&self) -> Vec<Vec<String>> {
        let mut depth: HashMap<&str, usize> = HashMap::new();
        let mut remaining: Vec<&PlanNode> = self.nodes.iter().collect();

        while !remaining.is_empty() {
            let before = remaining.len();
            remaining.retain(|&node| {
                let deps: Option<Vec<usize>> = node
                    .dependencies
                    .iter()
                    .map(|dep| depth.get(dep.as_str()).copied())
                    .collect();
                match deps {
                    Some(levels) => {
                        let level = levels.into_iter().max().map_or(0, |max| max + 1);
                        depth.insert(node.id.as_str(), level);
                        false
                    }
                    None => true,
                }
            });
            if remaining.len() == before {
                break;
            }
        }

        let layers = depth.values().copied().max().map_or(0, |max| max + 1);
        let mut waves = vec![Vec::new(); layers];
        for node in &self.nodes {
            if let Some(&level) = depth.get(node.id.as_str()) {
                waves[level].push(node.id.clone());
            }
        }
        waves
    }

    /// Depth-first search for a back edge; returns the cycle path closed on
    /// its first node (e.g. `a -> b -> a`)
    fn find_cycle(&self) -> Option<Vec<String>> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            Unvisited,
            InProgress,
            Done,
        }

        fn visit<'a>(
            id: &'a str,
            graph: &HashMap<&'a str, &'a [String]>,
            marks: &mut HashMap<&'a str, Mark>,
            path: &mut Vec<&'a str>,
        ) -> Option<Vec<String>> {
            match marks.get(id).copied().unwrap_or(Mark::Unvisited) {
                Mark::Done => return None,
                Mark::InProgress => {
                    let start = path.iter().position(|p| *p == id).unwrap_or(0);
                    let mut cycle: Vec<String> =
                        path[start..].iter().map(ToString::to_string).collect();
                    cycle.push(id.to_string());
                    return Some(cycle);
                }
                Mark::Unvisited => {}
            }

            marks.insert(id, Mark::InProgress);
            path.push(id);
            for dep in graph.get(id).copied().unwrap_or_default() {
                if let Some(cycle) = visit(dep.as_str(), graph, marks, path) {
                    return Some(cycle);
                }
            }
            path.pop();
            marks.insert(id, Mark::Done);
            None
        }

        let graph: HashMap<&str, &[String]> = self
            .nodes
            .iter()
            .map(|node| (node.id.as_str(), node.dependencies.as_slice()))
            .collect();
        let mut marks = HashMap::new();
        let mut path = Vec::new();

        self.nodes
            .iter()
            .find_map(|node| visit(node.id.as_str(), &graph, &mut marks, &mut path))
    }
}

/// Builder for execution plans
#[derive(Debug, Default)]
pub struct ExecutionPlanBuilder {
    nodes: Vec<PlanNode>,
}

impl ExecutionPlanBuilder {
    /// Create a new plan builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a phase and the phases it depends on
    ///
    /// Repeated dependency identifiers are collapsed, keeping the first
    /// occurrence.
    pub fn phase<I, S>(mut self, id: impl Into<String>, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut deps: Vec<String> = Vec::new();
        for dep in dependencies {
            let dep = dep.into();
            if !deps.contains(&dep) {
                deps.push(dep);
            }
        }
        self.nodes.push(PlanNode {
            id: id.into(),
            dependencies: deps,
        });
        self
    }

    /// Add a phase with no dependencies
    pub fn root(self, id: impl Into<String>) -> Self {
        self.phase(id, Vec::<String>::new())
    }

    /// Validate and build the plan
    pub fn build(self) -> Result<ExecutionPlan> {
        let plan = ExecutionPlan { nodes: self.nodes };
        plan.validate()?;
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond() -> ExecutionPlan {
        ExecutionPlan::builder()
            .root("p1")
            .phase("p2", ["p1"])
            .phase("p3", ["p1"])
            .phase("p4", ["p2", "p3"])
            .build()
            .unwrap()
    }

    #[test]
    fn test_diamond_waves() {
        let plan = diamond();
        assert_eq!(
            plan.waves(),
            vec![
                vec!["p1".to_string()],
                vec!["p2".to_string(), "p3".to_string()],
                vec!["p4".to_string()],
            ]
        );
        assert_eq!(plan.len(), 4);
    }

    #[test]
    fn test_dependencies_deduplicated() {
        let plan = ExecutionPlan::builder()
            .root("a")
            .phase("b", ["a", "a"])
            .build()
            .unwrap();
        assert_eq!(plan.node("b").unwrap().dependencies, vec!["a".to_string()]);
    }

    #[test]
    fn test_simple_cycle() {
        let err = ExecutionPlan::builder()
            .phase("a", ["c"])
            .phase("b", ["a"])
            .phase("c", ["b"])
            .build()
            .unwrap_err();

        match err {
            Error::Cycle(path) => {
                assert_eq!(path.first(), path.last());
                assert_eq!(path.len(), 4);
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_self_cycle() {
        let err = ExecutionPlan::builder()
            .phase("a", ["a"])
            .build()
            .unwrap_err();
        assert_eq!(err, Error::Cycle(vec!["a".to_string(), "a".to_string()]));
    }

    #[test]
    fn test_unknown_dependency() {
        let err = ExecutionPlan::builder()
            .phase("a", ["ghost"])
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            Error::UnknownDependency {
                phase: "a".to_string(),
                dependency: "ghost".to_string(),
            }
        );
    }

    #[test]
    fn test_duplicate_phase() {
        let err = ExecutionPlan::builder()
            .root("a")
            .root("a")
            .build()
            .unwrap_err();
        assert_eq!(err, Error::DuplicatePhase("a".to_string()));
    }

    #[test]
    fn test_empty_plan_is_valid() {
        let plan = ExecutionPlan::builder().build().unwrap();
        assert!(plan.is_empty());
        assert!(plan.waves().is_empty());
    }
}
