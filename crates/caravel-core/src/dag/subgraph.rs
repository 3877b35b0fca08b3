//! Reduction of a graph to a selected node set plus all of its ancestors.
//!
//! Ancestors ride along unmarked so that selected nodes can still merge
//! outputs from units they depend on, even when those units aren't being
//! acted on in this invocation.

use petgraph::graph::NodeIndex;

use super::{Dag, GraphError};

impl Dag {
    /// Extract a new graph containing the selected nodes, marked for
    /// processing, plus all of their transitive ancestors, unmarked, with
    /// edges preserved between every included node.
    ///
    /// A node reached both as an ancestor and by direct selection ends up
    /// marked: the flag upgrades and never downgrades within one extraction.
    /// The result is a subset of an already-acyclic graph with the same edge
    /// directions, so no fresh cycle check is needed.
    pub fn extract_subgraph<S: AsRef<str>>(&self, selected: &[S]) -> Result<Dag, GraphError> {
        let mut out = Dag::default();
        for name in selected {
            let name = name.as_ref();
            let src_idx = self
                .find(name)
                .ok_or_else(|| GraphError::UnknownNode(name.to_string()))?;
            let node = self.node(src_idx);
            let dst_idx = out.ensure_node(node.name(), node.installable(), true);
            self.copy_ancestors(src_idx, dst_idx, &mut out);
        }
        Ok(out)
    }

    /// Recursively add `src_idx`'s parents (and theirs) to `out` as unmarked
    /// nodes, mirroring the source edges.
    fn copy_ancestors(&self, src_idx: NodeIndex, dst_idx: NodeIndex, out: &mut Dag) {
        for parent_idx in self.parents(src_idx) {
            let parent = self.node(parent_idx);
            let dst_parent = out.ensure_node(parent.name(), parent.installable(), false);
            out.ensure_edge(dst_parent, dst_idx);
            self.copy_ancestors(parent_idx, dst_parent, out);
        }
    }
}
