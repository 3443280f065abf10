//! Package dependency resolution.
//!
//! Packages of a release form a directed graph with an edge from each
//! dependency to its dependent. Installation order is a topological order of
//! the requested closure, ties broken by package name.

use std::collections::{BTreeSet, HashMap, HashSet};

use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use thiserror::Error;
use tracing::debug;

use crate::release::{Release, ReleaseError};

#[derive(Debug, Error)]
pub enum ResolveError {
  #[error("Given package {0} does not exist!")]
  PackageNotFound(String),

  #[error("Given job does not exist!")]
  JobNotFound(String),

  #[error("package {package} depends on {dependency}, which is not part of the release")]
  DependencyNotFound { package: String, dependency: String },

  #[error("dependency cycle detected involving package {0}")]
  DependencyCycle(String),

  #[error(transparent)]
  Release(#[from] ReleaseError),
}

/// The package graph of one release.
pub struct DependencyGraph {
  graph: DiGraph<String, ()>,
  nodes: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
  /// Build the graph from every package the release lists.
  pub fn from_release(release: &Release) -> Result<Self, ResolveError> {
    let mut graph = DiGraph::new();
    let mut nodes = HashMap::new();

    // BTreeMap iteration keeps node indices stable across runs.
    for name in release.packages.keys() {
      let idx = graph.add_node(name.clone());
      nodes.insert(name.clone(), idx);
    }

    for (name, entry) in &release.packages {
      let dependent = nodes[name];
      for dependency in &entry.dependencies {
        let Some(&dep_idx) = nodes.get(dependency) else {
          return Err(ResolveError::DependencyNotFound {
            package: name.clone(),
            dependency: dependency.clone(),
          });
        };
        graph.add_edge(dep_idx, dependent, ());
      }
    }

    let dag = Self { graph, nodes };
    dag.verify_acyclic()?;
    Ok(dag)
  }

  fn verify_acyclic(&self) -> Result<(), ResolveError> {
    toposort(&self.graph, None)
      .map_err(|cycle| ResolveError::DependencyCycle(self.graph[cycle.node_id()].clone()))?;
    Ok(())
  }

  /// Order `requested` for installation.
  ///
  /// With `transitive` the result is the full dependency closure; without it
  /// the result holds exactly the requested packages. Either way a package
  /// comes after every selected package it depends on.
  pub fn resolve(&self, requested: &[String], transitive: bool) -> Result<Vec<String>, ResolveError> {
    let mut selected: HashSet<NodeIndex> = HashSet::new();
    let mut stack: Vec<NodeIndex> = Vec::new();

    for name in requested {
      let idx = *self
        .nodes
        .get(name)
        .ok_or_else(|| ResolveError::PackageNotFound(name.clone()))?;
      if selected.insert(idx) {
        stack.push(idx);
      }
    }

    if transitive {
      while let Some(idx) = stack.pop() {
        for dep in self.graph.neighbors_directed(idx, Direction::Incoming) {
          if selected.insert(dep) {
            stack.push(dep);
          }
        }
      }
    }

    let order = self.ordered(&selected)?;
    debug!(requested = ?requested, transitive, resolved = ?order, "resolved packages");
    Ok(order)
  }

  /// Kahn's algorithm restricted to `selected`, picking the smallest name first.
  fn ordered(&self, selected: &HashSet<NodeIndex>) -> Result<Vec<String>, ResolveError> {
    let mut in_degree: HashMap<NodeIndex, usize> = selected
      .iter()
      .map(|&idx| {
        let deps = self
          .graph
          .neighbors_directed(idx, Direction::Incoming)
          .filter(|dep| selected.contains(dep))
          .count();
        (idx, deps)
      })
      .collect();

    let mut ready: BTreeSet<(String, NodeIndex)> = in_degree
      .iter()
      .filter(|&(_, &deg)| deg == 0)
      .map(|(&idx, _)| (self.graph[idx].clone(), idx))
      .collect();

    let mut order = Vec::with_capacity(selected.len());
    while let Some((name, idx)) = ready.pop_first() {
      order.push(name);
      for dependent in self.graph.neighbors_directed(idx, Direction::Outgoing) {
        if let Some(deg) = in_degree.get_mut(&dependent) {
          *deg -= 1;
          if *deg == 0 {
            ready.insert((self.graph[dependent].clone(), dependent));
          }
        }
      }
    }

    if order.len() != selected.len() {
      let stuck = in_degree
        .iter()
        .filter(|&(_, &deg)| deg > 0)
        .map(|(&idx, _)| self.graph[idx].clone())
        .min()
        .unwrap_or_default();
      return Err(ResolveError::DependencyCycle(stuck));
    }
    Ok(order)
  }
}

/// Resolve the packages needed by a set of release jobs.
///
/// Each job contributes the packages its spec declares.
pub fn job_packages(release: &Release, jobs: &[String], transitive: bool) -> Result<Vec<String>, ResolveError> {
  let mut requested = Vec::new();
  for job in jobs {
    if !release.jobs.contains_key(job) {
      return Err(ResolveError::JobNotFound(job.clone()));
    }
    let spec = release.load_job(job)?;
    for package in spec.packages {
      if !requested.contains(&package) {
        requested.push(package);
      }
    }
  }
  DependencyGraph::from_release(release)?.resolve(&requested, transitive)
}

/// Resolve an explicit list of package names.
pub fn packages(release: &Release, names: &[String], transitive: bool) -> Result<Vec<String>, ResolveError> {
  DependencyGraph::from_release(release)?.resolve(names, transitive)
}
