//! Process configuration.
//!
//! `CadkitConfig` is loaded from `<workspace_dir>/config.toml` if present,
//! falling back to defaults otherwise. The workspace directory itself is
//! resolved before the config file is read: constructor argument first,
//! then the `MULTI_AGENT_WORKSPACE_DIR` environment variable, then a
//! relative default (§6).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

const WORKSPACE_DIR_ENV: &str = "MULTI_AGENT_WORKSPACE_DIR";
const DEFAULT_WORKSPACE_DIR: &str = ".cadkit";
const CONFIG_FILE_NAME: &str = "config.toml";

fn default_tolerance() -> f64 {
    1e-6
}

fn default_tangent_tolerance() -> f64 {
    1e-2
}

fn default_max_concurrent_agents() -> u32 {
    10
}

fn default_max_solver_iterations() -> u32 {
    100
}

fn default_max_history() -> usize {
    100
}

fn default_role_template_path() -> PathBuf {
    PathBuf::from("roles.json")
}

fn default_quality_preset() -> cadkit_kernel::QualityPreset {
    cadkit_kernel::QualityPreset::Standard
}

/// Top-level process configuration, composed of per-subsystem sections.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct CadkitConfig {
    pub store: StoreConfig,
    pub solver: SolverConfig,
    pub agents: AgentConfig,
    pub kernel: KernelConfig,
}

impl Default for CadkitConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            solver: SolverConfig::default(),
            agents: AgentConfig::default(),
            kernel: KernelConfig::default(),
        }
    }
}

/// Persistent store and history settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct StoreConfig {
    #[serde(default = "default_max_history")]
    pub max_history_per_workspace: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_history_per_workspace: default_max_history(),
        }
    }
}

/// Constraint graph and solver tuning.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SolverConfig {
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    #[serde(default = "default_tangent_tolerance")]
    pub tangent_tolerance: f64,
    #[serde(default = "default_max_solver_iterations")]
    pub max_iterations: u32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tolerance: default_tolerance(),
            tangent_tolerance: default_tangent_tolerance(),
            max_iterations: default_max_solver_iterations(),
        }
    }
}

/// Multi-agent controller settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct AgentConfig {
    #[serde(default = "default_max_concurrent_agents")]
    pub max_concurrent_agents: u32,
    #[serde(default = "default_role_template_path")]
    pub role_template_path: PathBuf,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_concurrent_agents: default_max_concurrent_agents(),
            role_template_path: default_role_template_path(),
        }
    }
}

/// Geometry kernel settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct KernelConfig {
    #[serde(default = "default_quality_preset")]
    pub default_quality: cadkit_kernel::QualityPreset,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            default_quality: default_quality_preset(),
        }
    }
}

impl CadkitConfig {
    /// Resolve the workspace directory per §6: explicit argument, then
    /// `MULTI_AGENT_WORKSPACE_DIR`, then the repository-relative default.
    #[must_use]
    pub fn resolve_workspace_dir(explicit: Option<&Path>) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }
        if let Ok(from_env) = std::env::var(WORKSPACE_DIR_ENV) {
            return PathBuf::from(from_env);
        }
        PathBuf::from(DEFAULT_WORKSPACE_DIR)
    }

    /// Load configuration from `<workspace_dir>/config.toml`, falling back
    /// to defaults when the file does not exist.
    pub fn load(workspace_dir: &Path) -> Result<Self, CoreError> {
        let path = workspace_dir.join(CONFIG_FILE_NAME);
        match std::fs::read_to_string(&path) {
            Ok(contents) => toml::from_str(&contents).map_err(|err| CoreError::Corrupt {
                context: path.display().to_string(),
                detail: err.to_string(),
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(CoreError::Io(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_spec_defaults() {
        let config = CadkitConfig::default();
        assert!((config.solver.tolerance - 1e-6).abs() < f64::EPSILON);
        assert!((config.solver.tangent_tolerance - 1e-2).abs() < f64::EPSILON);
        assert_eq!(config.agents.max_concurrent_agents, 10);
        assert_eq!(config.store.max_history_per_workspace, 100);
    }

    #[test]
    fn missing_config_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = CadkitConfig::load(dir.path()).expect("load");
        assert_eq!(config.agents.max_concurrent_agents, 10);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let toml_src = "[store]\nbogus_field = 1\n";
        let result: Result<CadkitConfig, _> = toml::from_str(toml_src);
        assert!(result.is_err());
    }

    #[test]
    fn explicit_dir_wins_over_env() {
        // SAFETY: tests run single-threaded within this module's scope for
        // this env var; no other test reads or writes it concurrently.
        std::env::set_var("MULTI_AGENT_WORKSPACE_DIR", "/tmp/env-dir");
        let resolved = CadkitConfig::resolve_workspace_dir(Some(Path::new("/tmp/explicit")));
        std::env::remove_var("MULTI_AGENT_WORKSPACE_DIR");
        assert_eq!(resolved, PathBuf::from("/tmp/explicit"));
    }
}
