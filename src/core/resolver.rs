//! Dependency resolution
//!
//! Computes the build order of components and detects dependency cycles.
//! Traversal keeps its own stack, so a long dependency chain cannot exhaust
//! the call stack.

use indexmap::{IndexMap, IndexSet};

use crate::error::GraphError;

/// Dependency graph between components
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// Adjacency list: component -> dependencies, in insertion order
    edges: IndexMap<String, Vec<String>>,
    /// All known components, in insertion order
    nodes: IndexSet<String>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

impl DependencyGraph {
    /// Create a new empty dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a component with its dependencies
    pub fn add_component(&mut self, name: &str, dependencies: Vec<String>) {
        self.nodes.insert(name.to_string());
        for dep in &dependencies {
            self.nodes.insert(dep.clone());
        }
        self.edges.insert(name.to_string(), dependencies);
    }

    /// Dependencies of a component
    pub fn dependencies(&self, name: &str) -> &[String] {
        self.edges.get(name).map_or(&[], Vec::as_slice)
    }

    /// Number of known components
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if no component was added
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Compute topological sort (build order)
    ///
    /// Returns components in order such that dependencies come before
    /// dependents. Ties are broken by insertion order, so the result is
    /// stable for a given document.
    pub fn topological_sort(&self) -> Result<Vec<String>, GraphError> {
        let mut marks: IndexMap<&str, Mark> = IndexMap::new();
        let mut result = Vec::with_capacity(self.nodes.len());

        for root in &self.nodes {
            if marks.contains_key(root.as_str()) {
                continue;
            }

            // (node, index of the next dependency to visit)
            let mut stack: Vec<(&str, usize)> = vec![(root.as_str(), 0)];
            marks.insert(root.as_str(), Mark::InProgress);

            while let Some(top) = stack.last_mut() {
                let (node, next) = *top;
                top.1 += 1;
                if let Some(dep) = self.dependencies(node).get(next) {
                    match marks.get(dep.as_str()) {
                        Some(Mark::Done) => {}
                        Some(Mark::InProgress) => {
                            let start = stack
                                .iter()
                                .position(|(n, _)| *n == dep.as_str())
                                .unwrap_or(0);
                            let mut cycle: Vec<String> =
                                stack[start..].iter().map(|(n, _)| (*n).to_string()).collect();
                            cycle.push(dep.clone());
                            return Err(GraphError::CyclicComponentDependency { cycle });
                        }
                        None => {
                            marks.insert(dep.as_str(), Mark::InProgress);
                            stack.push((dep.as_str(), 0));
                        }
                    }
                } else {
                    stack.pop();
                    marks.insert(node, Mark::Done);
                    result.push(node.to_string());
                }
            }
        }

        Ok(result)
    }

    /// Check if the graph has any cycles
    pub fn has_cycle(&self) -> bool {
        self.topological_sort().is_err()
    }
}
