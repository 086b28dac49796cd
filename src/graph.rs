//! Project dependency graph.
//!
//! Nodes are project names. An edge `a -> b` means `b` depends on `a`, so `a`
//! has to be planned and applied first.

use std::collections::{BTreeMap, HashMap};

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use thiserror::Error;

use crate::config::Project;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum GraphError {
    #[error("project '{project}' depends on unknown project '{dependency}'")]
    UnknownDependency { project: String, dependency: String },
    #[error("dependency cycle detected involving project '{0}'")]
    Cycle(String),
}

#[derive(Debug, Clone, Default)]
pub struct ProjectGraph {
    graph: DiGraph<String, ()>,
    nodes: HashMap<String, NodeIndex>,
}

impl ProjectGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the graph for a project list, rejecting unknown dependencies and cycles.
    pub fn from_projects(projects: &[Project]) -> Result<Self, GraphError> {
        let mut graph = Self::new();
        for project in projects {
            graph.add_project(&project.name);
        }
        for project in projects {
            for dependency in &project.depends_on {
                graph.add_dependency(&project.name, dependency)?;
            }
        }
        graph.topological_order()?;
        Ok(graph)
    }

    /// Adds a node, returning the existing one for a known name.
    pub fn add_project(&mut self, name: &str) -> NodeIndex {
        if let Some(index) = self.nodes.get(name) {
            return *index;
        }
        let index = self.graph.add_node(name.to_string());
        self.nodes.insert(name.to_string(), index);
        index
    }

    pub fn add_dependency(&mut self, project: &str, dependency: &str) -> Result<(), GraphError> {
        let unknown = |dependency: &str| GraphError::UnknownDependency {
            project: project.to_string(),
            dependency: dependency.to_string(),
        };
        let to = *self.nodes.get(project).ok_or_else(|| unknown(project))?;
        let from = *self.nodes.get(dependency).ok_or_else(|| unknown(dependency))?;
        self.graph.update_edge(from, to, ());
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn project_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn project_names(&self) -> Vec<&str> {
        self.graph.node_weights().map(String::as_str).collect()
    }

    fn neighbors(&self, name: &str, direction: Direction) -> Vec<&str> {
        let Some(index) = self.nodes.get(name) else {
            return vec![];
        };
        let mut names: Vec<&str> = self
            .graph
            .neighbors_directed(*index, direction)
            .map(|n| self.graph[n].as_str())
            .collect();
        names.sort_unstable();
        names
    }

    /// Projects `name` depends on directly.
    pub fn dependencies_of(&self, name: &str) -> Vec<&str> {
        self.neighbors(name, Direction::Incoming)
    }

    /// Projects depending on `name` directly.
    pub fn dependents_of(&self, name: &str) -> Vec<&str> {
        self.neighbors(name, Direction::Outgoing)
    }

    /// Project names with every dependency before its dependents.
    pub fn topological_order(&self) -> Result<Vec<&str>, GraphError> {
        toposort(&self.graph, None)
            .map(|order| order.into_iter().map(|n| self.graph[n].as_str()).collect())
            .map_err(|cycle| GraphError::Cycle(self.graph[cycle.node_id()].clone()))
    }

    /// Execution layers: layer 0 has no dependencies, layer N depends only on
    /// projects in layers 0..N-1. Projects in one layer can run in parallel.
    pub fn layers(&self) -> Result<BTreeMap<String, u32>, GraphError> {
        let mut layers: BTreeMap<String, u32> = BTreeMap::new();
        for name in self.topological_order()? {
            let layer = self
                .dependencies_of(name)
                .iter()
                .filter_map(|dep| layers.get(*dep))
                .map(|l| l + 1)
                .max()
                .unwrap_or(0);
            layers.insert(name.to_string(), layer);
        }
        Ok(layers)
    }
}
