//! Shared fake collaborators for orchestration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use caravel_core::installer::{Installer, InstallerFactory};
use caravel_core::manifest::{ActionTrigger, Installable, NodeDescriptor};
use caravel_core::registry::LocalRegistry;
use caravel_core::stack::{Provider, StackContext};

/// Scriptable installable with an inspectable registry slot.
#[derive(Debug)]
pub struct TestInstallable {
    manifest_id: String,
    id: String,
    depends_on: Vec<String>,
    outputs: Map<String, Value>,
    cache_dir: PathBuf,
    pre_actions: Vec<ActionTrigger>,
    post_actions: Vec<ActionTrigger>,
    registry: Mutex<Option<LocalRegistry>>,
}

impl TestInstallable {
    pub fn new(manifest_id: &str, id: &str) -> Self {
        Self {
            manifest_id: manifest_id.to_string(),
            id: id.to_string(),
            depends_on: Vec::new(),
            outputs: Map::new(),
            cache_dir: std::env::temp_dir(),
            pre_actions: Vec::new(),
            post_actions: Vec::new(),
            registry: Mutex::new(None),
        }
    }

    pub fn with_dependencies(mut self, deps: &[&str]) -> Self {
        self.depends_on = deps.iter().map(|d| d.to_string()).collect();
        self
    }

    pub fn with_output(mut self, key: &str, value: Value) -> Self {
        self.outputs.insert(key.to_string(), value);
        self
    }

    pub fn with_cache_dir(mut self, dir: &Path) -> Self {
        self.cache_dir = dir.to_path_buf();
        self
    }

    pub fn with_pre_action(mut self, action: ActionTrigger) -> Self {
        self.pre_actions.push(action);
        self
    }

    pub fn with_post_action(mut self, action: ActionTrigger) -> Self {
        self.post_actions.push(action);
        self
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl Installable for TestInstallable {
    fn id(&self) -> &str {
        &self.id
    }

    fn manifest_id(&self) -> &str {
        &self.manifest_id
    }

    fn depends_on(&self) -> Vec<String> {
        self.depends_on.clone()
    }

    fn has_outputs(&self) -> bool {
        !self.outputs.is_empty()
    }

    fn cache_dir(&self) -> PathBuf {
        self.cache_dir.clone()
    }

    fn outputs(&self) -> anyhow::Result<Map<String, Value>> {
        Ok(self.outputs.clone())
    }

    fn pre_actions(&self) -> Vec<ActionTrigger> {
        self.pre_actions.clone()
    }

    fn post_actions(&self) -> Vec<ActionTrigger> {
        self.post_actions.clone()
    }

    fn local_registry(&self) -> Option<LocalRegistry> {
        self.registry.lock().unwrap().clone()
    }

    fn set_local_registry(&self, registry: LocalRegistry) {
        *self.registry.lock().unwrap() = Some(registry);
    }
}

/// Build descriptors straight from test installables, keyed by
/// fully-qualified id. Dependencies must already be fully qualified.
pub fn descriptors_from(
    installables: &[Arc<TestInstallable>],
) -> HashMap<String, NodeDescriptor> {
    installables
        .iter()
        .map(|installable| {
            (
                installable.fully_qualified_id(),
                NodeDescriptor {
                    depends_on: installable.depends_on(),
                    installable: Arc::clone(installable) as Arc<dyn Installable>,
                },
            )
        })
        .collect()
}

/// Installer that records every step it runs, in call order, and can be told
/// to fail specific steps for specific units.
#[derive(Debug, Default)]
pub struct RecordingInstaller {
    calls: Mutex<Vec<(String, String)>>,
    fail_apply_delete: HashSet<String>,
    fail_output: HashSet<String>,
}

impl RecordingInstaller {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_apply_delete(ids: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            fail_apply_delete: ids.iter().map(|id| id.to_string()).collect(),
            ..Self::default()
        })
    }

    pub fn failing_output(ids: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            fail_output: ids.iter().map(|id| id.to_string()).collect(),
            ..Self::default()
        })
    }

    fn record(&self, step: &str, installable: &dyn Installable) {
        self.calls
            .lock()
            .unwrap()
            .push((step.to_string(), installable.fully_qualified_id()));
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    /// Unit ids recorded for one step, in call order.
    pub fn step_order(&self, step: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|(s, _)| s == step)
            .map(|(_, id)| id)
            .collect()
    }

    /// Position of a unit's step in the overall call order.
    pub fn position(&self, step: &str, id: &str) -> Option<usize> {
        self.calls()
            .iter()
            .position(|(s, i)| s == step && i == id)
    }
}

#[async_trait]
impl Installer for RecordingInstaller {
    async fn plan_install(
        &self,
        installable: &dyn Installable,
        _stack: &dyn StackContext,
        _dry_run: bool,
    ) -> anyhow::Result<()> {
        self.record("plan_install", installable);
        Ok(())
    }

    async fn apply_install(
        &self,
        installable: &dyn Installable,
        _stack: &dyn StackContext,
        _dry_run: bool,
    ) -> anyhow::Result<()> {
        self.record("apply_install", installable);
        Ok(())
    }

    async fn plan_delete(
        &self,
        installable: &dyn Installable,
        _stack: &dyn StackContext,
        _dry_run: bool,
    ) -> anyhow::Result<()> {
        self.record("plan_delete", installable);
        Ok(())
    }

    async fn apply_delete(
        &self,
        installable: &dyn Installable,
        _stack: &dyn StackContext,
        _dry_run: bool,
    ) -> anyhow::Result<()> {
        self.record("apply_delete", installable);
        if self.fail_apply_delete.contains(&installable.fully_qualified_id()) {
            anyhow::bail!("apply delete failed for {}", installable.fully_qualified_id());
        }
        Ok(())
    }

    async fn output(
        &self,
        installable: &dyn Installable,
        _stack: &dyn StackContext,
        _dry_run: bool,
    ) -> anyhow::Result<()> {
        self.record("output", installable);
        if self.fail_output.contains(&installable.fully_qualified_id()) {
            anyhow::bail!("output step failed for {}", installable.fully_qualified_id());
        }
        Ok(())
    }

    async fn clean(
        &self,
        installable: &dyn Installable,
        _stack: &dyn StackContext,
        _dry_run: bool,
    ) -> anyhow::Result<()> {
        self.record("clean", installable);
        Ok(())
    }
}

/// Factory handing the same installer to every node.
pub struct SingleInstallerFactory(pub Arc<RecordingInstaller>);

impl InstallerFactory for SingleInstallerFactory {
    fn installer_for(&self, _installable: &dyn Installable) -> anyhow::Result<Arc<dyn Installer>> {
        Ok(Arc::clone(&self.0) as Arc<dyn Installer>)
    }
}

/// Stack context that records template renders and post-action triggers.
#[derive(Debug, Default)]
pub struct NullStack {
    pub provider: NullProvider,
    pub renders: Mutex<Vec<String>>,
}

impl NullStack {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn renders(&self) -> Vec<String> {
        self.renders.lock().unwrap().clone()
    }
}

#[async_trait]
impl StackContext for NullStack {
    async fn templated_vars(
        &self,
        _installable: &dyn Installable,
        outputs: Option<&LocalRegistry>,
    ) -> anyhow::Result<Value> {
        Ok(outputs.map(|r| r.as_value()).unwrap_or_else(|| json!({})))
    }

    async fn render_templates(
        &self,
        installable: &dyn Installable,
        _vars: &Value,
        _dry_run: bool,
    ) -> anyhow::Result<()> {
        self.renders
            .lock()
            .unwrap()
            .push(installable.fully_qualified_id());
        Ok(())
    }

    fn provider(&self) -> &dyn Provider {
        &self.provider
    }
}

#[derive(Debug, Default)]
pub struct NullProvider {
    pub cluster_updates: Mutex<usize>,
    pub vars_files: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl Provider for NullProvider {
    async fn update_cluster(&self, _dry_run: bool) -> anyhow::Result<()> {
        *self.cluster_updates.lock().unwrap() += 1;
        Ok(())
    }

    fn add_vars_file(&self, path: &Path) {
        self.vars_files.lock().unwrap().push(path.to_path_buf());
    }
}
