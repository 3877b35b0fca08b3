//! Stack context and provider seams consumed during execution.
//!
//! These are narrow views of the surrounding system: templating and variable
//! merging happen elsewhere, the orchestrator only asks for them at the
//! right moments and passes the stack object explicitly everywhere (no
//! process-wide "current stack").

use std::path::Path;

use async_trait::async_trait;

use crate::manifest::Installable;
use crate::registry::LocalRegistry;

/// The target environment a graph execution runs against.
#[async_trait]
pub trait StackContext: Send + Sync {
    /// Compute the fully merged template variables for an installable,
    /// optionally folding in an output registry.
    async fn templated_vars(
        &self,
        installable: &dyn Installable,
        outputs: Option<&LocalRegistry>,
    ) -> anyhow::Result<serde_json::Value>;

    /// Render the installable's templates with the given variables.
    async fn render_templates(
        &self,
        installable: &dyn Installable,
        vars: &serde_json::Value,
        dry_run: bool,
    ) -> anyhow::Result<()>;

    fn provider(&self) -> &dyn Provider;
}

/// Post-action triggers exposed by the cloud/cluster provider.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Reconcile the cluster after a unit changed it.
    async fn update_cluster(&self, dry_run: bool) -> anyhow::Result<()>;

    /// Register an extra vars file for subsequent provider lookups.
    fn add_vars_file(&self, path: &Path);
}
