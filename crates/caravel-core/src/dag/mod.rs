//! Directed acyclic graph of installables connected by depends-on edges.

pub mod subgraph;
pub(crate) mod traverse;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::manifest::{Installable, NodeDescriptor};

/// Graph construction and lookup errors. All of these are fatal to the whole
/// run; no partial graph is ever returned.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("'{node}' depends on a descriptor that doesn't exist: '{dependency}'")]
    MissingDependency { node: String, dependency: String },
    #[error("'{0}' depends on itself")]
    SelfDependency(String),
    #[error("cyclical dependencies detected")]
    Cycle,
    #[error("graph doesn't contain a node called '{0}'")]
    UnknownNode(String),
}

/// A graph node: a unique name, the installable it represents, and whether
/// the node was explicitly selected for processing (vs. pulled in only as an
/// ancestor for its outputs).
pub struct NamedNode {
    name: String,
    installable: Arc<dyn Installable>,
    marked: bool,
}

impl NamedNode {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn installable(&self) -> &Arc<dyn Installable> {
        &self.installable
    }

    /// Whether this node should be processed, not just consulted for outputs.
    pub fn is_marked(&self) -> bool {
        self.marked
    }
}

impl fmt::Debug for NamedNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedNode")
            .field("name", &self.name)
            .field("marked", &self.marked)
            .finish()
    }
}

/// Directed acyclic graph of named nodes. Edges point from dependency
/// (parent) to dependent (child). One instance exists per orchestration
/// invocation; the structure is read-only during traversal.
#[derive(Debug, Default)]
pub struct Dag {
    graph: DiGraph<NamedNode, ()>,
    indices: HashMap<String, NodeIndex>,
}

impl Dag {
    /// Build a graph from node descriptors.
    ///
    /// Every node in a freshly built graph is marked for processing. A
    /// dependency on an undeclared name, a node depending on itself, or any
    /// cycle fails the whole build.
    pub fn build(descriptors: &HashMap<String, NodeDescriptor>) -> Result<Self, GraphError> {
        let mut dag = Dag::default();
        for (name, descriptor) in descriptors {
            let node_idx = dag.ensure_node(name, &descriptor.installable, true);
            for dependency in &descriptor.depends_on {
                if dependency == name {
                    return Err(GraphError::SelfDependency(name.clone()));
                }
                let dep_descriptor = descriptors.get(dependency).ok_or_else(|| {
                    GraphError::MissingDependency {
                        node: name.clone(),
                        dependency: dependency.clone(),
                    }
                })?;
                let dep_idx = dag.ensure_node(dependency, &dep_descriptor.installable, true);
                dag.ensure_edge(dep_idx, node_idx);
            }
        }
        if toposort(&dag.graph, None).is_err() {
            return Err(GraphError::Cycle);
        }
        Ok(dag)
    }

    /// Idempotently create a node. The marked flag only ever upgrades from
    /// false to true, never back.
    pub(crate) fn ensure_node(
        &mut self,
        name: &str,
        installable: &Arc<dyn Installable>,
        marked: bool,
    ) -> NodeIndex {
        match self.indices.get(name) {
            Some(&idx) => {
                if marked {
                    self.graph[idx].marked = true;
                }
                idx
            }
            None => {
                let idx = self.graph.add_node(NamedNode {
                    name: name.to_string(),
                    installable: Arc::clone(installable),
                    marked,
                });
                self.indices.insert(name.to_string(), idx);
                idx
            }
        }
    }

    /// Add a dependency→dependent edge unless it already exists.
    pub(crate) fn ensure_edge(&mut self, parent: NodeIndex, child: NodeIndex) {
        if self.graph.find_edge(parent, child).is_none() {
            self.graph.add_edge(parent, child, ());
        }
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.indices.contains_key(name)
    }

    pub fn find(&self, name: &str) -> Option<NodeIndex> {
        self.indices.get(name).copied()
    }

    pub fn node(&self, idx: NodeIndex) -> &NamedNode {
        &self.graph[idx]
    }

    pub fn node_indices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.node_indices()
    }

    pub fn node_names(&self) -> Vec<String> {
        self.graph
            .node_indices()
            .map(|idx| self.graph[idx].name.clone())
            .collect()
    }

    /// Direct dependencies of a node.
    pub fn parents(&self, idx: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.neighbors_directed(idx, Direction::Incoming)
    }

    /// Direct dependents of a node.
    pub fn children(&self, idx: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.neighbors_directed(idx, Direction::Outgoing)
    }

    /// Whether a dependency edge exists between two named nodes.
    pub fn contains_edge(&self, parent: &str, child: &str) -> bool {
        match (self.find(parent), self.find(child)) {
            (Some(p), Some(c)) => self.graph.find_edge(p, c).is_some(),
            _ => false,
        }
    }

    /// Number of edges between two named nodes (build never duplicates one).
    pub fn edge_multiplicity(&self, parent: &str, child: &str) -> usize {
        match (self.find(parent), self.find(child)) {
            (Some(p), Some(c)) => self.graph.edges_connecting(p, c).count(),
            _ => 0,
        }
    }
}
