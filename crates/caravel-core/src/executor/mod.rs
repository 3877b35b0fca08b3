//! The worker-pool executor: drives install/delete/template/output actions
//! over a dependency graph with bounded parallelism.
//!
//! A fixed pool of workers pulls ready nodes from a shared channel, runs the
//! action-specific steps against each node, assembles the node's local
//! registry, and signals completion back to the traversal engine. The first
//! error received anywhere aborts the whole execution, except in
//! ignore-errors delete mode where failures are logged and traversal
//! continues.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use petgraph::graph::NodeIndex;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ExecutorConfig;
use crate::dag::Dag;
use crate::dag::traverse::{self, TraversalDirection};
use crate::installer::{Installer, InstallerFactory};
use crate::manifest::{ActionTrigger, Installable};
use crate::registry::{self, LocalRegistry};
use crate::stack::StackContext;
use crate::types::Action;

/// Caller-controlled switches for one execution.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecuteOptions {
    /// Run the plan (dry-run analysis) step.
    pub plan: bool,
    /// Run the apply step. Without this, nothing changes.
    pub approved: bool,
    pub skip_pre_actions: bool,
    pub skip_post_actions: bool,
    /// Delete only: log node failures and keep tearing down.
    pub ignore_errors: bool,
    pub dry_run: bool,
}

/// What a worker does to each node it claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    Run(Action),
    /// Downward pre-pass before a delete: populate registries only, so
    /// outputs are available while dependents are torn down.
    LoadOutputs,
}

impl Pass {
    fn label(&self) -> &'static str {
        match self {
            Pass::Run(action) => action.as_str(),
            Pass::LoadOutputs => "load outputs for",
        }
    }
}

/// Executes one action across a graph with a bounded worker pool.
pub struct Executor {
    dag: Arc<Dag>,
    workers: usize,
    poll_interval: Duration,
    delete_poll_interval: Duration,
}

impl Executor {
    pub fn new(dag: Dag, config: &ExecutorConfig) -> Self {
        Self {
            dag: Arc::new(dag),
            workers: config.workers.max(1),
            poll_interval: config.poll_interval(),
            delete_poll_interval: config.delete_poll_interval(),
        }
    }

    pub fn dag(&self) -> &Dag {
        &self.dag
    }

    /// Run `action` against every node of the graph, dependencies first for
    /// install/template/output, dependents first for delete.
    ///
    /// Within a set of simultaneously eligible nodes no relative order is
    /// guaranteed; only the dependency-respecting partial order is.
    pub async fn execute(
        &self,
        action: Action,
        stack: Arc<dyn StackContext>,
        installers: Arc<dyn InstallerFactory>,
        opts: ExecuteOptions,
    ) -> anyhow::Result<()> {
        info!(%action, nodes = self.dag.len(), workers = self.workers, "executing graph");
        match action {
            Action::Install | Action::Template | Action::Output => {
                self.run_pass(
                    Pass::Run(action),
                    TraversalDirection::Down,
                    self.poll_interval,
                    &stack,
                    &installers,
                    opts,
                )
                .await
            }
            Action::Delete => {
                self.run_pass(
                    Pass::LoadOutputs,
                    TraversalDirection::Down,
                    self.poll_interval,
                    &stack,
                    &installers,
                    opts,
                )
                .await?;
                self.run_pass(
                    Pass::Run(Action::Delete),
                    TraversalDirection::Up,
                    self.delete_poll_interval,
                    &stack,
                    &installers,
                    opts,
                )
                .await
            }
        }
    }

    async fn run_pass(
        &self,
        pass: Pass,
        direction: TraversalDirection,
        poll_interval: Duration,
        stack: &Arc<dyn StackContext>,
        installers: &Arc<dyn InstallerFactory>,
        opts: ExecuteOptions,
    ) -> anyhow::Result<()> {
        if self.dag.is_empty() {
            return Ok(());
        }

        let (ready_tx, ready_rx) = mpsc::channel::<NodeIndex>(self.dag.len());
        let (done_tx, done_rx) = mpsc::unbounded_channel::<NodeIndex>();
        let (error_tx, mut error_rx) = mpsc::unbounded_channel::<anyhow::Error>();
        let ready_rx = Arc::new(Mutex::new(ready_rx));

        // Failures are only ever tolerated while tearing a stack down.
        let ignore_errors = opts.ignore_errors
            && matches!(pass, Pass::Run(Action::Delete) | Pass::LoadOutputs);

        let mut workers: Vec<JoinHandle<()>> = Vec::with_capacity(self.workers);
        for worker_id in 0..self.workers {
            let ctx = WorkerContext {
                dag: Arc::clone(&self.dag),
                stack: Arc::clone(stack),
                installers: Arc::clone(installers),
                pass,
                opts,
                ignore_errors,
            };
            workers.push(tokio::spawn(worker_loop(
                worker_id,
                ctx,
                Arc::clone(&ready_rx),
                done_tx.clone(),
                error_tx.clone(),
            )));
        }
        drop(done_tx);
        drop(error_tx);

        let mut walk = tokio::spawn(traverse::walk(
            Arc::clone(&self.dag),
            direction,
            poll_interval,
            ready_tx,
            done_rx,
        ));

        let result = tokio::select! {
            walk_result = &mut walk => flatten(walk_result),
            maybe_err = error_rx.recv() => match maybe_err {
                Some(err) => Err(err),
                // Every worker exited without reporting; take the traversal's
                // verdict.
                None => flatten((&mut walk).await),
            },
        };

        if let Err(err) = result {
            // First error aborts the pass. In-flight workers finish their
            // current node and exit once the ready channel closes with the
            // aborted traversal task.
            walk.abort();
            return Err(err);
        }

        for worker in workers {
            worker.await.context("worker task panicked")?;
        }
        Ok(())
    }
}

fn flatten(result: Result<anyhow::Result<()>, tokio::task::JoinError>) -> anyhow::Result<()> {
    result.context("traversal task panicked")?
}

struct WorkerContext {
    dag: Arc<Dag>,
    stack: Arc<dyn StackContext>,
    installers: Arc<dyn InstallerFactory>,
    pass: Pass,
    opts: ExecuteOptions,
    ignore_errors: bool,
}

/// One worker: claim ready nodes until the channel closes, process each, and
/// report done or error. In ignore-errors mode a failed node is logged and
/// still reported done so the traversal can proceed past it.
async fn worker_loop(
    worker_id: usize,
    ctx: WorkerContext,
    ready_rx: Arc<Mutex<mpsc::Receiver<NodeIndex>>>,
    done_tx: mpsc::UnboundedSender<NodeIndex>,
    error_tx: mpsc::UnboundedSender<anyhow::Error>,
) {
    loop {
        let idx = {
            let mut rx = ready_rx.lock().await;
            match rx.recv().await {
                Some(idx) => idx,
                None => break,
            }
        };
        let node_name = ctx.dag.node(idx).name().to_string();
        debug!(worker = worker_id, node = %node_name, "processing node");
        match process_node(&ctx, idx).await {
            Ok(()) => {
                let _ = done_tx.send(idx);
            }
            Err(err) if ctx.ignore_errors => {
                warn!(
                    node = %node_name,
                    error = format!("{err:#}"),
                    "ignoring failure, continuing teardown"
                );
                let _ = done_tx.send(idx);
            }
            Err(err) => {
                let _ = error_tx
                    .send(err.context(format!("failed to {} '{}'", ctx.pass.label(), node_name)));
            }
        }
    }
}

/// Run one pass' steps against a single node.
///
/// The registry is assembled here, after the node's own action and before
/// the done signal, so a parent's registry is always attached by the time
/// any child's eligibility check can observe the completion.
async fn process_node(ctx: &WorkerContext, idx: NodeIndex) -> anyhow::Result<()> {
    let node = ctx.dag.node(idx);
    let installable = Arc::clone(node.installable());
    let marked = node.is_marked();
    let opts = ctx.opts;

    let cache_dir = installable.cache_dir();
    if !cache_dir.exists() {
        anyhow::bail!(
            "cache directory {} does not exist for '{}'",
            cache_dir.display(),
            node.name()
        );
    }

    let installer = ctx.installers.installer_for(installable.as_ref())?;

    match ctx.pass {
        Pass::LoadOutputs => {}
        Pass::Run(Action::Install) | Pass::Run(Action::Delete) if marked => {
            install_or_delete(ctx, installable.as_ref(), installer.as_ref()).await?;
        }
        Pass::Run(Action::Install) | Pass::Run(Action::Delete) => {
            // Ancestor-only node: nothing to change, it only contributes
            // outputs to the nodes that pulled it in.
            debug!(node = %node.name(), "not selected for processing, loading outputs only");
        }
        Pass::Run(Action::Template) => {
            let vars = ctx
                .stack
                .templated_vars(installable.as_ref(), None)
                .await?;
            ctx.stack
                .render_templates(installable.as_ref(), &vars, opts.dry_run)
                .await?;
        }
        Pass::Run(Action::Output) => {}
    }

    // The upward delete pass reuses the registries attached by the downward
    // pre-pass; re-running output steps against deleted units would fail.
    if ctx.pass != Pass::Run(Action::Delete) {
        let registry = build_local_registry(ctx, idx, &installable, installer.as_ref()).await?;
        installable.set_local_registry(registry);
    }

    // Re-render so templates can see the outputs read above.
    if ctx.pass == Pass::Run(Action::Template) {
        let outputs = installable.local_registry();
        let vars = ctx
            .stack
            .templated_vars(installable.as_ref(), outputs.as_ref())
            .await?;
        ctx.stack
            .render_templates(installable.as_ref(), &vars, opts.dry_run)
            .await?;
    }

    Ok(())
}

async fn install_or_delete(
    ctx: &WorkerContext,
    installable: &dyn Installable,
    installer: &dyn Installer,
) -> anyhow::Result<()> {
    let deleting = ctx.pass == Pass::Run(Action::Delete);
    let opts = ctx.opts;
    let stack = ctx.stack.as_ref();

    if !opts.skip_pre_actions {
        for trigger in installable.pre_actions() {
            run_trigger(&trigger, stack, opts.dry_run).await?;
        }
    }

    if opts.plan {
        if deleting {
            installer.plan_delete(installable, stack, opts.dry_run).await?;
        } else {
            installer.plan_install(installable, stack, opts.dry_run).await?;
        }
    }

    if opts.approved {
        if deleting {
            installer.apply_delete(installable, stack, opts.dry_run).await?;
        } else {
            installer.apply_install(installable, stack, opts.dry_run).await?;
        }
        if !opts.skip_post_actions {
            for trigger in installable.post_actions() {
                run_trigger(&trigger, stack, opts.dry_run).await?;
            }
        }
    }

    Ok(())
}

async fn run_trigger(
    trigger: &ActionTrigger,
    stack: &dyn StackContext,
    dry_run: bool,
) -> anyhow::Result<()> {
    match trigger {
        ActionTrigger::ClusterUpdate => stack
            .provider()
            .update_cluster(dry_run)
            .await
            .context("cluster update action failed"),
        ActionTrigger::AddProviderVarsFiles { paths } => {
            for path in paths {
                stack.provider().add_vars_file(path);
            }
            Ok(())
        }
    }
}

/// Assemble a node's local registry: merge every direct parent's registry
/// (filtered when crossing a manifest boundary), then register the node's
/// own freshly computed outputs.
async fn build_local_registry(
    ctx: &WorkerContext,
    idx: NodeIndex,
    installable: &Arc<dyn Installable>,
    installer: &dyn Installer,
) -> anyhow::Result<LocalRegistry> {
    let mut result = LocalRegistry::new();
    let manifest_id = installable.manifest_id();

    for parent_idx in ctx.dag.parents(idx) {
        let parent = ctx.dag.node(parent_idx).installable();
        // Guaranteed populated by traversal ordering; an ancestor that never
        // produced one contributes nothing.
        let Some(parent_registry) = parent.local_registry() else {
            continue;
        };
        registry::merge_parent_registry(
            &mut result,
            &parent_registry,
            parent.manifest_id() != manifest_id,
        );
    }

    if installable.has_outputs() {
        installer
            .output(installable.as_ref(), ctx.stack.as_ref(), ctx.opts.dry_run)
            .await
            .with_context(|| {
                format!(
                    "failed to run the output step for '{}'",
                    installable.fully_qualified_id()
                )
            })?;
        let outputs = installable.outputs()?;
        registry::register_outputs(
            &mut result,
            installable.id(),
            &installable.fully_qualified_id(),
            &outputs,
        );
    }

    Ok(result)
}
