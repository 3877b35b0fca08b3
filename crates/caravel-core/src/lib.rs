//! Caravel Core Library
//!
//! Dependency/deployment orchestration: builds a directed acyclic graph from
//! declarative manifests of installable units, extracts sub-graphs for
//! partial selections, and drives install/delete/template/output actions
//! over the graph with a bounded worker pool, propagating per-node output
//! registries to dependents.
//!
//! Manifest parsing, source acquisition, installer mechanics, template
//! rendering and cloud providers all live outside this crate; they are
//! consumed through the trait seams in [`installer`] and [`stack`].

pub mod config;
pub mod dag;
pub mod executor;
pub mod installer;
pub mod manifest;
pub mod registry;
pub mod stack;
pub mod types;

/// Re-exports of commonly used types
pub mod prelude {
    // Graph
    pub use crate::dag::{Dag, GraphError, NamedNode};

    // Execution
    pub use crate::config::ExecutorConfig;
    pub use crate::executor::{ExecuteOptions, Executor};

    // Data model
    pub use crate::manifest::{
        ActionTrigger, Installable, Manifest, NodeDescriptor, descriptors_for_manifests,
    };
    pub use crate::registry::LocalRegistry;

    // Collaborator seams
    pub use crate::installer::{Installer, InstallerFactory};
    pub use crate::stack::{Provider, StackContext};

    // Actions
    pub use crate::types::Action;
}
