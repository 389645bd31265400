//! Project and environment configuration.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::service::ServiceSpec;

pub const CONFIG_FILE_NAME: &str = "localdev.config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found at {path}")]
    NotFound { path: PathBuf },

    #[error("failed to read config at {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// The project config file. Services are keyed by id; the key becomes the
/// spec's id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocaldevConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub services: HashMap<String, ServiceEntry>,
}

/// One service entry as written in the config file, without its id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceEntry {
    #[serde(default)]
    pub name: Option<String>,
    pub command: crate::service::CommandSpec,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default = "default_true")]
    pub start_automatically: bool,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub ready_port: Option<u16>,
}

fn default_true() -> bool {
    true
}

impl LocaldevConfig {
    pub fn load(project_path: &Path) -> Result<Self, ConfigError> {
        let path = project_path.join(CONFIG_FILE_NAME);
        if !path.exists() {
            return Err(ConfigError::NotFound { path });
        }
        let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse { path, source })
    }

    /// Service specs in stable (sorted by id) order.
    pub fn service_specs(&self) -> Vec<ServiceSpec> {
        let mut ids: Vec<&String> = self.services.keys().collect();
        ids.sort();
        ids.into_iter()
            .map(|id| {
                let entry = &self.services[id];
                ServiceSpec {
                    id: id.clone(),
                    name: entry.name.clone(),
                    command: entry.command.clone(),
                    cwd: entry.cwd.clone(),
                    env: entry.env.clone(),
                    start_automatically: entry.start_automatically,
                    depends_on: entry.depends_on.clone(),
                    ready_port: entry.ready_port,
                }
            })
            .collect()
    }

    pub fn project_name(&self) -> &str {
        self.name.as_deref().unwrap_or("localdev")
    }
}

/// Environment switches, read once at startup.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    /// Mirror every terminal write to this file, for debugging the renderer.
    pub write_log: Option<PathBuf>,
    /// Run against this project directory instead of the current one.
    pub project_path: Option<PathBuf>,
}

impl EnvConfig {
    pub fn from_env() -> Self {
        Self {
            write_log: env_string_opt("LOCALDEV_WRITE_LOG").map(PathBuf::from),
            project_path: env_string_opt("LOCALDEV_PROJECT_PATH").map(PathBuf::from),
        }
    }
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    })
}
