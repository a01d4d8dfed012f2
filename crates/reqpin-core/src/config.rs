use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use reqpin_util::errors::ReqpinError;

use crate::marker::MarkerEnvironment;

/// Project configuration file name, searched upwards from the working directory.
pub const PROJECT_CONFIG: &str = "reqpin.toml";

/// User configuration: `~/.reqpin/config.toml` overlaid with the nearest
/// `reqpin.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub resolve: ResolveConfig,

    #[serde(default)]
    pub environment: EnvironmentConfig,

    #[serde(default)]
    pub extract: ExtractConfig,
}

/// Package index settings from `[index]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default = "default_index_url")]
    pub url: String,
    #[serde(default, rename = "extra-urls")]
    pub extra_urls: Vec<String>,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Resolve without any index (only sources and solutions).
    #[serde(default)]
    pub offline: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            url: default_index_url(),
            extra_urls: Vec::new(),
            timeout: default_timeout(),
            offline: false,
        }
    }
}

fn default_index_url() -> String {
    "https://pypi.org/pypi".to_string()
}

fn default_timeout() -> u64 {
    30
}

/// Resolution settings from `[resolve]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveConfig {
    #[serde(default = "default_max_invalidations", rename = "max-invalidations")]
    pub max_invalidations: usize,
    #[serde(default, rename = "allow-prereleases")]
    pub allow_prereleases: bool,
    /// Source trees searched for local projects.
    #[serde(default)]
    pub sources: Vec<PathBuf>,
    /// Glob patterns excluded from source tree walks.
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            max_invalidations: default_max_invalidations(),
            allow_prereleases: false,
            sources: Vec::new(),
            exclude: Vec::new(),
        }
    }
}

fn default_max_invalidations() -> usize {
    3
}

/// Target environment from `[environment]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    #[serde(default = "default_python_version", rename = "python-version")]
    pub python_version: String,
    /// Explicit marker values, e.g. `sys_platform = "win32"`.
    #[serde(default)]
    pub markers: BTreeMap<String, String>,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            python_version: default_python_version(),
            markers: BTreeMap::new(),
        }
    }
}

fn default_python_version() -> String {
    "3.12".to_string()
}

/// Metadata extraction for `setup.py` projects, from `[extract]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractConfig {
    /// Program and arguments; the source directory is appended.
    #[serde(default)]
    pub command: Vec<String>,
}

impl Config {
    /// Load the global configuration and the nearest project configuration
    /// above `cwd`. Missing files fall back to defaults.
    pub fn load(cwd: &Path) -> miette::Result<Self> {
        let global = read_optional(&Self::global_path())?;
        let project = match reqpin_util::fs::find_ancestor_with(cwd, PROJECT_CONFIG) {
            Some(dir) => read_optional(&dir.join(PROJECT_CONFIG))?,
            None => None,
        };
        Self::from_layers(global.as_deref(), project.as_deref())
    }

    /// Merge two TOML documents, the project one taking precedence key by key.
    pub fn from_layers(global: Option<&str>, project: Option<&str>) -> miette::Result<Self> {
        let mut merged = toml::Table::new();
        for (label, text) in [("global", global), ("project", project)] {
            let Some(text) = text else { continue };
            let table: toml::Table = toml::from_str(text).map_err(|e| ReqpinError::Config {
                message: format!("Failed to parse {label} config: {e}"),
            })?;
            merge_tables(&mut merged, table);
        }
        toml::Value::Table(merged).try_into().map_err(|e| {
            ReqpinError::Config {
                message: format!("Invalid configuration: {e}"),
            }
            .into()
        })
    }

    /// Returns the default path to the global config file.
    pub fn global_path() -> PathBuf {
        dirs_path().join("config.toml")
    }

    /// Marker environment for the configured interpreter, with explicit
    /// overrides applied on top of the host values.
    pub fn marker_environment(&self) -> MarkerEnvironment {
        let mut env = MarkerEnvironment::host(&self.environment.python_version);
        for (key, value) in &self.environment.markers {
            env.set(key.clone(), value.clone());
        }
        env
    }
}

fn read_optional(path: &Path) -> miette::Result<Option<String>> {
    if !path.is_file() {
        return Ok(None);
    }
    tracing::debug!("reading config {}", path.display());
    std::fs::read_to_string(path).map(Some).map_err(|e| {
        ReqpinError::Config {
            message: format!("Failed to read {}: {e}", path.display()),
        }
        .into()
    })
}

fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Returns the path to the reqpin data directory (`~/.reqpin/`).
pub fn dirs_path() -> PathBuf {
    reqpin_util::fs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".reqpin")
}
