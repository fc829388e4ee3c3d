//! Server configuration
//!
//! Defaults, then an optional JSON file, then environment variables:
//!
//! - `DPF_BACKEND`: `in_process` or `native`
//! - `ANSYS_DPF_PATH`: directory holding the engine library
//! - `DPF_SERVER_CONTEXT`: `entry` or `premium`

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{DpfError, Result};

pub const ENV_BACKEND: &str = "DPF_BACKEND";
pub const ENV_ENGINE_PATH: &str = "ANSYS_DPF_PATH";
pub const ENV_CONTEXT: &str = "DPF_SERVER_CONTEXT";

/// Which engine the server drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    #[default]
    InProcess,
    Native,
}

impl FromStr for Backend {
    type Err = DpfError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "in_process" | "inprocess" | "mock" => Ok(Backend::InProcess),
            "native" => Ok(Backend::Native),
            other => Err(DpfError::Config(format!("unknown backend '{}'", other))),
        }
    }
}

/// Licensing context the engine is started with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ServerContext {
    #[default]
    Entry,
    Premium,
}

impl FromStr for ServerContext {
    type Err = DpfError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "entry" => Ok(ServerContext::Entry),
            "premium" => Ok(ServerContext::Premium),
            other => Err(DpfError::Config(format!("unknown server context '{}'", other))),
        }
    }
}

/// Server configuration file format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub version: String,
    #[serde(default)]
    pub backend: Backend,
    /// Directory of the engine library (native backend only)
    #[serde(default)]
    pub engine_path: Option<PathBuf>,
    #[serde(default)]
    pub context: ServerContext,
    /// Record every derive-registered custom operator when the server starts
    #[serde(default = "default_true")]
    pub load_registered_operators: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            backend: Backend::InProcess,
            engine_path: None,
            context: ServerContext::Entry,
            load_registered_operators: true,
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by the process environment
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Override fields from variables returned by `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(backend) = lookup(ENV_BACKEND) {
            self.backend = backend.parse()?;
        }
        if let Some(path) = lookup(ENV_ENGINE_PATH) {
            if !path.is_empty() {
                self.engine_path = Some(PathBuf::from(path));
            }
        }
        if let Some(context) = lookup(ENV_CONTEXT) {
            self.context = context.parse()?;
        }
        Ok(())
    }

    /// Write the default configuration if `path` does not exist yet
    pub fn ensure_config_file(path: &Path) -> Result<()> {
        if !path.exists() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let json = serde_json::to_string_pretty(&Self::default())?;
            fs::write(path, json)?;
        }
        Ok(())
    }

    /// Load a JSON configuration file, creating it with defaults if missing
    pub fn from_json_file(path: &Path) -> Result<Self> {
        Self::ensure_config_file(path)?;
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| DpfError::Config(format!("{}: {}", path.display(), e)))
    }

    /// File first, environment on top
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = Self::from_json_file(path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;

        // Write to temporary file first
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, json)?;
        fs::rename(&temp_path, path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_env_overrides_defaults() {
        let vars: HashMap<&str, &str> = [
            (ENV_BACKEND, "native"),
            (ENV_ENGINE_PATH, "/opt/ansys/dpf"),
            (ENV_CONTEXT, "Premium"),
        ]
        .into_iter()
        .collect();
        let mut config = ServerConfig::default();
        config
            .apply_env(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.backend, Backend::Native);
        assert_eq!(config.engine_path, Some(PathBuf::from("/opt/ansys/dpf")));
        assert_eq!(config.context, ServerContext::Premium);
    }

    #[test]
    fn test_bad_backend_is_a_config_error() {
        let mut config = ServerConfig::default();
        let err = config
            .apply_env(|key| (key == ENV_BACKEND).then(|| "grpc".to_string()))
            .unwrap_err();
        assert!(matches!(err, DpfError::Config(_)));
    }

    #[test]
    fn test_json_format() {
        let json = serde_json::to_string_pretty(&ServerConfig::default()).unwrap();
        assert!(json.contains("\"backend\": \"in_process\""));
        assert!(json.contains("\"context\": \"entry\""));
    }
}
