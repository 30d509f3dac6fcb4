//! Project dependency graph and topological batching
//!
//! Edges point from a dependent to its dependency. Batching is Kahn-style
//! layering: every batch holds all projects whose dependencies were fully
//! placed in earlier batches, so each project lands in the earliest batch
//! it can run in.

use crate::error::{WavestrapError, WavestrapResult};
use crate::project::ProjectSet;
use std::collections::{BTreeSet, HashMap};

/// A set of project names safe to process concurrently, in input order
pub type Batch = Vec<String>;

/// Which edges gate batching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchScope {
    /// Every project and every edge
    All,
    /// Workspace aggregators are left out and their edges never gate
    InstallableOnly,
}

#[derive(Debug, Clone)]
struct GraphNode {
    name: String,
    workspace_aggregator: bool,
}

/// Directed acyclic "depends on" graph over workspace projects
#[derive(Debug, Clone, Default)]
pub struct ProjectGraph {
    nodes: Vec<GraphNode>,
    index: HashMap<String, usize>,
    /// `dependent -> {dependency, ...}` by node index
    upstream: Vec<BTreeSet<usize>>,
}

impl ProjectGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph for every project in the set
    pub fn from_projects(projects: &ProjectSet) -> WavestrapResult<Self> {
        let mut graph = Self::new();
        for project in projects.iter() {
            graph.add_node(&project.name, project.workspace_aggregator);
        }
        for project in projects.iter() {
            for dependency in &project.internal_dependencies {
                graph.add_dependency(&project.name, dependency)?;
            }
        }
        Ok(graph)
    }

    /// Register a project. Re-registering updates the aggregator flag.
    pub fn add_node(&mut self, name: &str, workspace_aggregator: bool) {
        if let Some(&i) = self.index.get(name) {
            self.nodes[i].workspace_aggregator = workspace_aggregator;
            return;
        }
        self.index.insert(name.to_string(), self.nodes.len());
        self.nodes.push(GraphNode {
            name: name.to_string(),
            workspace_aggregator,
        });
        self.upstream.push(BTreeSet::new());
    }

    /// Record that `dependent` depends on `dependency`
    ///
    /// Cycles are not rejected here; [`ProjectGraph::batches`] reports them.
    pub fn add_dependency(&mut self, dependent: &str, dependency: &str) -> WavestrapResult<()> {
        let not_found = || WavestrapError::ProjectNotFound {
            dependent: dependent.to_string(),
            dependency: dependency.to_string(),
        };
        let from = *self.index.get(dependent).ok_or_else(not_found)?;
        let to = *self.index.get(dependency).ok_or_else(not_found)?;
        self.upstream[from].insert(to);
        Ok(())
    }

    /// Direct dependencies of `name`, in input order
    pub fn dependencies_of(&self, name: &str) -> Vec<&str> {
        self.index
            .get(name)
            .map(|&i| {
                self.upstream[i]
                    .iter()
                    .map(|&d| self.nodes[d].name.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Split the graph into dependency-ordered batches
    ///
    /// Fails with [`WavestrapError::CyclicDependency`] naming one cycle when
    /// the graph is not acyclic.
    pub fn batches(&self, scope: BatchScope) -> WavestrapResult<Vec<Batch>> {
        let n = self.nodes.len();
        let active: Vec<bool> = self
            .nodes
            .iter()
            .map(|node| scope == BatchScope::All || !node.workspace_aggregator)
            .collect();

        let mut downstream: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut in_degree = vec![0usize; n];
        for (dependent, deps) in self.upstream.iter().enumerate() {
            if !active[dependent] {
                continue;
            }
            for &dep in deps.iter().filter(|&&d| active[d]) {
                downstream[dep].push(dependent);
                in_degree[dependent] += 1;
            }
        }

        let mut resolved = vec![false; n];
        let mut pending: Vec<usize> = (0..n).filter(|&i| active[i]).collect();
        let mut batches = Vec::new();

        while !pending.is_empty() {
            let (ready, blocked): (Vec<usize>, Vec<usize>) =
                pending.into_iter().partition(|&i| in_degree[i] == 0);

            if ready.is_empty() {
                return Err(WavestrapError::CyclicDependency {
                    cycle: self.find_cycle(&blocked, &resolved, &active),
                });
            }

            for &node in &ready {
                resolved[node] = true;
                for &dependent in &downstream[node] {
                    in_degree[dependent] -= 1;
                }
            }

            batches.push(ready.iter().map(|&i| self.nodes[i].name.clone()).collect());
            pending = blocked;
        }

        Ok(batches)
    }

    /// Walk unresolved dependencies from the first blocked node until a
    /// node repeats. Every blocked node has an unresolved dependency, so
    /// the walk always closes a cycle.
    fn find_cycle(&self, blocked: &[usize], resolved: &[bool], active: &[bool]) -> Vec<String> {
        let mut seen: HashMap<usize, usize> = HashMap::new();
        let mut path: Vec<usize> = Vec::new();
        let mut current = blocked[0];

        loop {
            if let Some(&start) = seen.get(&current) {
                let mut cycle: Vec<String> = path[start..]
                    .iter()
                    .map(|&i| self.nodes[i].name.clone())
                    .collect();
                cycle.push(self.nodes[current].name.clone());
                return cycle;
            }
            seen.insert(current, path.len());
            path.push(current);

            match self.upstream[current]
                .iter()
                .find(|&&d| active[d] && !resolved[d])
            {
                Some(&next) => current = next,
                None => {
                    return path.iter().map(|&i| self.nodes[i].name.clone()).collect();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::Project;

    fn graph(nodes: &[&str], edges: &[(&str, &str)]) -> ProjectGraph {
        let mut g = ProjectGraph::new();
        for n in nodes {
            g.add_node(n, false);
        }
        for (dependent, dependency) in edges {
            g.add_dependency(dependent, dependency).unwrap();
        }
        g
    }

    /// Union is the input set, each project once, dependencies strictly earlier.
    fn assert_valid_batching(g: &ProjectGraph, edges: &[(String, String)], batches: &[Batch]) {
        let mut level: HashMap<&str, usize> = HashMap::new();
        for (i, batch) in batches.iter().enumerate() {
            assert!(!batch.is_empty(), "empty batch {}", i);
            for name in batch {
                assert!(level.insert(name.as_str(), i).is_none(), "{} placed twice", name);
            }
        }
        assert_eq!(level.len(), g.len());
        for (dependent, dependency) in edges {
            assert!(
                level[dependency.as_str()] < level[dependent.as_str()],
                "{} must come before {}",
                dependency,
                dependent
            );
        }
        // Maximal parallelism: every project past batch 0 waits on the previous batch.
        for (i, batch) in batches.iter().enumerate().skip(1) {
            for name in batch {
                let waits_on_previous = g
                    .dependencies_of(name)
                    .iter()
                    .any(|d| level[d] == i - 1);
                assert!(waits_on_previous, "{} could run earlier than batch {}", name, i);
            }
        }
    }

    #[test]
    fn chain_produces_one_batch_per_level() {
        let g = graph(&["c", "b", "a"], &[("b", "c"), ("a", "b")]);
        let batches = g.batches(BatchScope::All).unwrap();
        assert_eq!(batches, vec![vec!["c"], vec!["b"], vec!["a"]]);
    }

    #[test]
    fn diamond_groups_middle_layer() {
        let g = graph(
            &["app", "left", "right", "base"],
            &[
                ("app", "left"),
                ("app", "right"),
                ("left", "base"),
                ("right", "base"),
            ],
        );
        let batches = g.batches(BatchScope::All).unwrap();
        assert_eq!(batches, vec![vec!["base"], vec!["left", "right"], vec!["app"]]);
    }

    #[test]
    fn batch_members_keep_input_order() {
        let g = graph(&["zeta", "alpha", "mid"], &[]);
        let batches = g.batches(BatchScope::All).unwrap();
        assert_eq!(batches, vec![vec!["zeta", "alpha", "mid"]]);
    }

    #[test]
    fn generated_dags_satisfy_batching_invariants() {
        // Small LCG so the shapes are reproducible without extra crates.
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        let mut next = move || {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (seed >> 33) as usize
        };

        for round in 0..50 {
            let size = 1 + next() % 12;
            let names: Vec<String> = (0..size).map(|i| format!("p{}-{}", round, i)).collect();
            let mut edges = Vec::new();
            for i in 1..size {
                for j in 0..i {
                    if next() % 3 == 0 {
                        // Only point at lower indices, so the graph stays acyclic.
                        edges.push((names[i].clone(), names[j].clone()));
                    }
                }
            }

            let mut g = ProjectGraph::new();
            // Register in reverse to make sure input order is not topological order.
            for name in names.iter().rev() {
                g.add_node(name, false);
            }
            for (dependent, dependency) in &edges {
                g.add_dependency(dependent, dependency).unwrap();
            }

            let batches = g.batches(BatchScope::All).unwrap();
            assert_valid_batching(&g, &edges, &batches);
        }
    }

    #[test]
    fn cycle_is_reported_with_path() {
        let g = graph(&["a", "b", "c", "d"], &[("a", "b"), ("b", "c"), ("c", "a"), ("d", "a")]);
        match g.batches(BatchScope::All) {
            Err(WavestrapError::CyclicDependency { cycle }) => {
                assert_eq!(cycle.first(), cycle.last());
                assert_eq!(cycle.len(), 4);
                for name in ["a", "b", "c"] {
                    assert!(cycle.iter().any(|c| c == name));
                }
                assert!(!cycle.iter().any(|c| c == "d"));
            }
            other => panic!("expected cycle error, got {:?}", other),
        }
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let g = graph(&["solo"], &[("solo", "solo")]);
        match g.batches(BatchScope::All) {
            Err(WavestrapError::CyclicDependency { cycle }) => {
                assert_eq!(cycle, vec!["solo", "solo"]);
            }
            other => panic!("expected cycle error, got {:?}", other),
        }
    }

    #[test]
    fn unknown_dependency_rejected() {
        let mut g = graph(&["a"], &[]);
        let result = g.add_dependency("a", "missing");
        assert!(matches!(result, Err(WavestrapError::ProjectNotFound { .. })));
    }

    #[test]
    fn install_scope_skips_aggregators() {
        let projects = ProjectSet::new(vec![
            Project::new("root", "/ws").aggregator(),
            Project::new("core", "/ws/core").depends_on("root"),
            Project::new("plugin", "/ws/plugin").depends_on("core"),
            Project::new("tools", "/ws/tools").depends_on("root"),
        ])
        .unwrap();
        let g = ProjectGraph::from_projects(&projects).unwrap();

        let install = g.batches(BatchScope::InstallableOnly).unwrap();
        assert_eq!(install, vec![vec!["core", "tools"], vec!["plugin"]]);

        let full = g.batches(BatchScope::All).unwrap();
        assert_eq!(full, vec![vec!["root"], vec!["core", "tools"], vec!["plugin"]]);
    }

    #[test]
    fn empty_graph_has_no_batches() {
        assert!(ProjectGraph::new().batches(BatchScope::All).unwrap().is_empty());
    }
}
