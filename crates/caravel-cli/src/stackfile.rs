//! Minimal TOML stack-file loader.
//!
//! This is pure glue for inspecting dependency plans from the command line;
//! the core library never parses files and real deployments are expected to
//! construct manifests programmatically.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use serde::Deserialize;

use caravel_core::prelude::{Installable, LocalRegistry, Manifest};

#[derive(Debug, Deserialize)]
struct StackFile {
    #[serde(default, rename = "manifest")]
    manifests: Vec<ManifestEntry>,
}

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    id: String,
    #[serde(default)]
    sequential: bool,
    #[serde(default, rename = "installable")]
    installables: Vec<InstallableEntry>,
}

#[derive(Debug, Deserialize)]
struct InstallableEntry {
    id: String,
    #[serde(default)]
    depends_on: Vec<String>,
    #[serde(default)]
    has_outputs: bool,
    #[serde(default)]
    cache_dir: Option<PathBuf>,
}

/// An installable declared in a stack file. Only carries what plan
/// inspection needs.
#[derive(Debug)]
struct StackFileInstallable {
    id: String,
    manifest_id: String,
    depends_on: Vec<String>,
    has_outputs: bool,
    cache_dir: PathBuf,
    registry: Mutex<Option<LocalRegistry>>,
}

impl Installable for StackFileInstallable {
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
        self.has_outputs
    }

    fn cache_dir(&self) -> PathBuf {
        self.cache_dir.clone()
    }

    fn local_registry(&self) -> Option<LocalRegistry> {
        self.registry.lock().ok()?.clone()
    }

    fn set_local_registry(&self, registry: LocalRegistry) {
        if let Ok(mut slot) = self.registry.lock() {
            *slot = Some(registry);
        }
    }
}

/// Load the manifests declared in a TOML stack file.
pub fn load_stack(path: &Path) -> anyhow::Result<Vec<Manifest>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read stack file: {}", path.display()))?;
    let stack: StackFile = toml::from_str(&content)
        .with_context(|| format!("Failed to parse stack file: {}", path.display()))?;

    let manifests = stack
        .manifests
        .into_iter()
        .map(|manifest| {
            let installables = manifest
                .installables
                .into_iter()
                .map(|entry| {
                    Arc::new(StackFileInstallable {
                        id: entry.id,
                        manifest_id: manifest.id.clone(),
                        depends_on: entry.depends_on,
                        has_outputs: entry.has_outputs,
                        cache_dir: entry.cache_dir.unwrap_or_else(std::env::temp_dir),
                        registry: Mutex::new(None),
                    }) as Arc<dyn Installable>
                })
                .collect();
            Manifest::new(manifest.id, manifest.sequential, installables)
        })
        .collect();
    Ok(manifests)
}
