//! Process-level settings: where workspaces live and how sessions get one.
//!
//! Values come from built-in defaults, then an optional YAML file, then
//! `MZDOCK_*` environment variables. The CLI applies its own flags last.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{DockError, Result};

pub const DEFAULT_CONFIG_FILE: &str = "mzdock.yaml";
pub const ENV_WORKSPACES: &str = "MZDOCK_WORKSPACES";
pub const ENV_MODE: &str = "MZDOCK_MODE";
pub const ENV_ACCESS_TOKEN: &str = "MZDOCK_ACCESS_TOKEN";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Offline use: one shared workspace, no verification gate.
    #[default]
    Local,
    /// Multi-tenant use: a fresh workspace per session behind the gate.
    #[serde(alias = "online")]
    Hosted,
}

impl Mode {
    pub fn parse(raw: &str) -> Option<Mode> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "local" => Some(Mode::Local),
            "hosted" | "online" => Some(Mode::Hosted),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Local => "local",
            Mode::Hosted => "hosted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PairingConfig {
    /// Cross-check the experiment identity of both files in a positional pair.
    pub validate_identity: bool,
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            validate_identity: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub workspaces_root: PathBuf,
    pub mode: Mode,
    pub default_workspace: String,
    pub access_token: Option<String>,
    pub pairing: PairingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspaces_root: PathBuf::from("workspaces"),
            mode: Mode::Local,
            default_workspace: "default".to_string(),
            access_token: None,
            pairing: PairingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Loads `path` when given, otherwise `mzdock.yaml` if it exists in the
    /// working directory, otherwise defaults. Environment overrides apply on top.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| DockError::io(path, e))?;
        let config = Self::from_yaml_str(&raw).map_err(|e| DockError::config_read(path, e))?;
        debug!(path = %path.display(), mode = config.mode.as_str(), "loaded config file");
        Ok(config)
    }

    pub fn from_yaml_str(raw: &str) -> std::result::Result<Self, serde_yaml::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }

    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(root) = lookup(ENV_WORKSPACES).filter(|v| !v.trim().is_empty()) {
            self.workspaces_root = PathBuf::from(root);
        }
        if let Some(raw) = lookup(ENV_MODE) {
            self.mode = Mode::parse(&raw).ok_or_else(|| {
                DockError::config_read(
                    Path::new(ENV_MODE),
                    format!("unknown mode {:?} (expected local or hosted)", raw),
                )
            })?;
        }
        if let Some(token) = lookup(ENV_ACCESS_TOKEN).filter(|v| !v.is_empty()) {
            self.access_token = Some(token);
        }
        Ok(())
    }
}
