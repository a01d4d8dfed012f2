//! Reading project metadata out of source trees.
//!
//! `pyproject.toml` files with a static `[project]` table are read
//! directly. Anything else (typically `setup.py` projects) goes through a
//! user-configured command that runs in a throwaway directory and prints
//! the metadata as JSON.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use reqpin_core::{DistInfo, Requirement, Version};
use reqpin_util::process::CommandBuilder;

use crate::error::ExtractionError;

pub trait MetadataExtractor {
    fn extract(&self, source_dir: &Path) -> Result<DistInfo, ExtractionError>;
}

#[derive(Debug, Deserialize)]
struct PyProject {
    project: Option<ProjectTable>,
}

#[derive(Debug, Deserialize)]
struct ProjectTable {
    name: String,
    version: Option<String>,
    #[serde(default)]
    dependencies: Vec<String>,
    #[serde(default, rename = "optional-dependencies")]
    optional_dependencies: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    dynamic: Vec<String>,
}

/// Static PEP 621 metadata from `pyproject.toml`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PyprojectExtractor;

impl MetadataExtractor for PyprojectExtractor {
    fn extract(&self, source_dir: &Path) -> Result<DistInfo, ExtractionError> {
        let path = source_dir.join("pyproject.toml");
        if !path.is_file() {
            return Err(ExtractionError::NoMetadata {
                path: source_dir.to_path_buf(),
            });
        }
        let text = std::fs::read_to_string(&path).map_err(|source| ExtractionError::Io {
            path: path.clone(),
            source,
        })?;
        let pyproject: PyProject = toml::from_str(&text).map_err(|e| ExtractionError::Invalid {
            path: path.clone(),
            message: e.to_string(),
        })?;

        let Some(project) = pyproject.project else {
            return Err(ExtractionError::NoMetadata { path });
        };
        if project.dynamic.iter().any(|field| field == "dependencies") {
            tracing::debug!("{} declares dynamic dependencies", path.display());
            return Err(ExtractionError::NoMetadata { path });
        }

        let mut requirements = Vec::new();
        for text in &project.dependencies {
            requirements.push(parse_requirement(&path, text)?);
        }
        for (extra, deps) in &project.optional_dependencies {
            for text in deps {
                requirements.push(parse_requirement(&path, text)?.with_extra_marker(extra));
            }
        }

        let version = match project.version.as_deref() {
            Some(text) => parse_version(&path, text)?,
            None => {
                tracing::debug!("{} does not declare a static version, using 0", path.display());
                Version::from_release([0])
            }
        };
        Ok(DistInfo::new(project.name, version, requirements))
    }
}

/// Output expected from an extraction command.
#[derive(Debug, Deserialize)]
struct ExtractedMetadata {
    name: String,
    version: String,
    #[serde(default)]
    requires_dist: Option<Vec<String>>,
}

/// Runs a configured program with the source directory as its last
/// argument and reads `{name, version, requires_dist}` JSON from stdout.
///
/// The child runs in a fresh temporary directory with a cleared
/// environment: only `PATH` is passed through, and `HOME`/`TMPDIR` point
/// into the temporary directory.
#[derive(Debug, Clone)]
pub struct CommandExtractor {
    program: String,
    args: Vec<String>,
}

impl CommandExtractor {
    /// `None` for an empty command line.
    pub fn new(command: &[String]) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

impl MetadataExtractor for CommandExtractor {
    fn extract(&self, source_dir: &Path) -> Result<DistInfo, ExtractionError> {
        let spawn_err = |message: String| ExtractionError::Spawn {
            program: self.program.clone(),
            message,
        };
        let sandbox = tempfile::tempdir().map_err(|e| spawn_err(e.to_string()))?;
        let source_dir = source_dir
            .canonicalize()
            .map_err(|source| ExtractionError::Io {
                path: source_dir.to_path_buf(),
                source,
            })?;
        let home = sandbox.path().display().to_string();

        let output = CommandBuilder::new(self.program.clone())
            .args(self.args.iter().cloned())
            .arg(source_dir.display().to_string())
            .clear_env()
            .env("PATH", std::env::var("PATH").unwrap_or_default())
            .env("HOME", home.clone())
            .env("TMPDIR", home)
            .cwd(sandbox.path())
            .exec()
            .map_err(|e| spawn_err(e.to_string()))?;

        if !output.status.success() {
            return Err(ExtractionError::Failed {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let extracted: ExtractedMetadata =
            serde_json::from_slice(&output.stdout).map_err(|e| ExtractionError::Invalid {
                path: source_dir.clone(),
                message: format!("unexpected output from `{}`: {e}", self.program),
            })?;
        let version = parse_version(&source_dir, &extracted.version)?;
        let requirements = extracted
            .requires_dist
            .unwrap_or_default()
            .iter()
            .map(|text| parse_requirement(&source_dir, text))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(DistInfo::new(extracted.name, version, requirements))
    }
}

fn parse_requirement(path: &Path, text: &str) -> Result<Requirement, ExtractionError> {
    Requirement::parse(text).map_err(|e| ExtractionError::Invalid {
        path: path.to_path_buf(),
        message: format!("invalid requirement `{text}`: {e}"),
    })
}

fn parse_version(path: &Path, text: &str) -> Result<Version, ExtractionError> {
    Version::parse(text).map_err(|e| ExtractionError::Invalid {
        path: path.to_path_buf(),
        message: format!("invalid version `{text}`: {e}"),
    })
}
