//! Service definitions loaded from the project config.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// Command to run: either a single shell-style line or an explicit argv.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandSpec {
    Line(String),
    Argv(Vec<String>),
}

impl CommandSpec {
    /// Argv form of the command. Line commands are split on whitespace;
    /// commands needing quoting should use the argv form.
    pub fn argv(&self) -> Vec<String> {
        match self {
            CommandSpec::Line(line) => line.split_whitespace().map(str::to_string).collect(),
            CommandSpec::Argv(argv) => argv.clone(),
        }
    }
}

/// One service entry in the project config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceSpec {
    pub id: String,
    /// Display name shown in log prefixes and the status pane; defaults to
    /// the id.
    #[serde(default)]
    pub name: Option<String>,
    pub command: CommandSpec,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Whether the service starts when the orchestrator starts.
    #[serde(default = "default_true")]
    pub start_automatically: bool,
    /// Services that must be `ready` before this one spawns; until then it
    /// shows as pending.
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// TCP port polled to decide readiness. Without one, the service is
    /// considered ready as soon as it spawns.
    #[serde(default)]
    pub ready_port: Option<u16>,
}

impl ServiceSpec {
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}
