//! Executor tuning loaded from an optional TOML config file.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Worker-pool and traversal tuning.
///
/// Delete operations converge more slowly than installs (dependents must
/// drain first), so they get their own re-scan interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Maximum number of parallel installer invocations.
    pub workers: usize,
    /// Upper bound on the traversal loop's re-scan latency, in milliseconds.
    pub poll_interval_ms: u64,
    /// Re-scan latency bound while deleting, in milliseconds.
    pub delete_poll_interval_ms: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            workers: 5,
            poll_interval_ms: 500,
            delete_poll_interval_ms: 2000,
        }
    }
}

impl ExecutorConfig {
    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn delete_poll_interval(&self) -> Duration {
        Duration::from_millis(self.delete_poll_interval_ms)
    }
}
