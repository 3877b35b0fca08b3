//! The installer seam. The orchestrator decides what to run and in what
//! order; installers own the mechanics of actually running it.

use std::sync::Arc;

use async_trait::async_trait;

use crate::manifest::Installable;
use crate::stack::StackContext;

/// Executes the concrete install/delete/output steps for one installable.
///
/// Plan steps are dry-run analyses; apply steps make changes. The
/// orchestrator never retries a step, so implementations are assumed
/// idempotent. Steps may shell out to long-running subprocesses; bounding
/// their runtime is the installer's responsibility.
#[async_trait]
pub trait Installer: Send + Sync {
    async fn plan_install(
        &self,
        installable: &dyn Installable,
        stack: &dyn StackContext,
        dry_run: bool,
    ) -> anyhow::Result<()>;

    async fn apply_install(
        &self,
        installable: &dyn Installable,
        stack: &dyn StackContext,
        dry_run: bool,
    ) -> anyhow::Result<()>;

    async fn plan_delete(
        &self,
        installable: &dyn Installable,
        stack: &dyn StackContext,
        dry_run: bool,
    ) -> anyhow::Result<()>;

    async fn apply_delete(
        &self,
        installable: &dyn Installable,
        stack: &dyn StackContext,
        dry_run: bool,
    ) -> anyhow::Result<()>;

    /// Materialize the unit's outputs so `Installable::outputs` can read
    /// them.
    async fn output(
        &self,
        installable: &dyn Installable,
        stack: &dyn StackContext,
        dry_run: bool,
    ) -> anyhow::Result<()>;

    /// Remove any intermediate artifacts the installer left behind. Not
    /// dispatched by the executor; exposed for outer cleanup flows.
    async fn clean(
        &self,
        installable: &dyn Installable,
        stack: &dyn StackContext,
        dry_run: bool,
    ) -> anyhow::Result<()>;
}

/// Picks the installer implementation appropriate for an installable.
pub trait InstallerFactory: Send + Sync {
    fn installer_for(&self, installable: &dyn Installable) -> anyhow::Result<Arc<dyn Installer>>;
}
