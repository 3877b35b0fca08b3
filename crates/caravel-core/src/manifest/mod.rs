//! The installable/manifest data model consumed by the graph builder.
//!
//! Manifest and stack-file parsing live outside this crate; callers hand the
//! core already-materialized installables grouped into ordered manifests.

pub mod descriptor;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::registry::LocalRegistry;

pub use descriptor::{NodeDescriptor, descriptors_for_manifests};

/// A side-effecting trigger declared on an installable, usable as either a
/// pre-action or a post-action.
///
/// Pre-actions run before a marked node is planned; post-actions run after a
/// successful approved apply. Ancestor-only nodes never run either.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionTrigger {
    /// Ask the provider to reconcile the cluster after a change.
    ClusterUpdate,
    /// Register extra provider vars files for subsequent nodes.
    AddProviderVarsFiles { paths: Vec<PathBuf> },
}

/// One deployable unit declared in a manifest, identified by
/// `manifestId:unitId`.
///
/// Implementations are created by manifest loading (out of scope here) and
/// must already be materialized at `cache_dir()` before execution. The local
/// registry slot is written exactly once per traversal, by the worker that
/// processed the node, so interior mutability with a plain mutex is enough.
pub trait Installable: Send + Sync {
    /// Short id, unique within the owning manifest.
    fn id(&self) -> &str;

    /// Id of the manifest this unit was declared in.
    fn manifest_id(&self) -> &str;

    /// Stable `manifestId:unitId` identifier, unique across the whole stack.
    fn fully_qualified_id(&self) -> String {
        format!("{}:{}", self.manifest_id(), self.id())
    }

    /// Explicitly declared dependency ids. Short ids resolve against the
    /// owning manifest. Ignored when the manifest is sequential.
    fn depends_on(&self) -> Vec<String> {
        Vec::new()
    }

    /// Whether this unit produces outputs for dependents to consume.
    fn has_outputs(&self) -> bool {
        false
    }

    /// Directory the unit's sources were acquired into. Must exist before
    /// any action runs against the unit.
    fn cache_dir(&self) -> PathBuf;

    /// The unit's freshly computed outputs. Read after the installer's
    /// output step has run.
    fn outputs(&self) -> anyhow::Result<Map<String, Value>> {
        Ok(Map::new())
    }

    fn pre_actions(&self) -> Vec<ActionTrigger> {
        Vec::new()
    }

    fn post_actions(&self) -> Vec<ActionTrigger> {
        Vec::new()
    }

    /// The registry attached by the most recent traversal, if any.
    fn local_registry(&self) -> Option<LocalRegistry>;

    /// Attach the merged registry. Treated as immutable once set.
    fn set_local_registry(&self, registry: LocalRegistry);
}

/// An ordered collection of installables.
///
/// When `sequential` is set, each installable implicitly depends on the one
/// declared immediately before it, overriding explicit `depends_on` lists.
#[derive(Clone)]
pub struct Manifest {
    id: String,
    sequential: bool,
    installables: Vec<Arc<dyn Installable>>,
}

impl Manifest {
    pub fn new(
        id: impl Into<String>,
        sequential: bool,
        installables: Vec<Arc<dyn Installable>>,
    ) -> Self {
        Self {
            id: id.into(),
            sequential,
            installables,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn sequential(&self) -> bool {
        self.sequential
    }

    pub fn installables(&self) -> &[Arc<dyn Installable>] {
        &self.installables
    }
}

impl fmt::Debug for Manifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manifest")
            .field("id", &self.id)
            .field("sequential", &self.sequential)
            .field("installables", &self.installables.len())
            .finish()
    }
}
