//! Shared core types used across the graph and executor layers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Action to run against the nodes of a dependency graph.
///
/// Install, template and output walk the graph downward (dependencies first);
/// delete walks it upward (dependents first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Install,
    Delete,
    Template,
    Output,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Install => "install",
            Action::Delete => "delete",
            Action::Template => "template",
            Action::Output => "output",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when an action name doesn't match any known action.
#[derive(Debug, thiserror::Error)]
#[error("unknown action '{0}', expected one of: install, delete, template, output")]
pub struct UnknownAction(pub String);

impl FromStr for Action {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "install" => Ok(Action::Install),
            "delete" => Ok(Action::Delete),
            "template" => Ok(Action::Template),
            "output" => Ok(Action::Output),
            other => Err(UnknownAction(other.to_string())),
        }
    }
}
