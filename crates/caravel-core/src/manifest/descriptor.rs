//! Raw dependency declarations, resolved from manifests before any graph
//! edges exist.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::{Installable, Manifest};

/// A node name plus its resolved dependency names, the graph builder's input.
#[derive(Clone)]
pub struct NodeDescriptor {
    pub depends_on: Vec<String>,
    pub installable: Arc<dyn Installable>,
}

impl fmt::Debug for NodeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeDescriptor")
            .field("name", &self.installable.fully_qualified_id())
            .field("depends_on", &self.depends_on)
            .finish()
    }
}

/// Walk all manifests' installables in declaration order and resolve their
/// dependencies into descriptors keyed by fully-qualified id.
///
/// Sequential manifests chain each installable onto the immediately
/// preceding one, overriding explicit `depends_on` declarations.
pub fn descriptors_for_manifests(manifests: &[Manifest]) -> HashMap<String, NodeDescriptor> {
    let mut descriptors = HashMap::new();
    for manifest in manifests {
        let mut previous: Option<String> = None;
        for installable in manifest.installables() {
            let name = installable.fully_qualified_id();
            let depends_on = if manifest.sequential() {
                previous.iter().cloned().collect()
            } else {
                installable
                    .depends_on()
                    .iter()
                    .map(|dep| qualify(manifest.id(), dep))
                    .collect()
            };
            descriptors.insert(
                name.clone(),
                NodeDescriptor {
                    depends_on,
                    installable: Arc::clone(installable),
                },
            );
            previous = Some(name);
        }
    }
    descriptors
}

/// Dependency ids without a manifest qualifier refer to units in the same
/// manifest.
fn qualify(manifest_id: &str, dep: &str) -> String {
    if dep.contains(':') {
        dep.to_string()
    } else {
        format!("{manifest_id}:{dep}")
    }
}
