//! Local source trees.

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};

use reqpin_core::{DistInfo, RepositoryId, Requirement};

use crate::error::{ExtractionError, RepositoryError, RepositoryInitializationError};
use crate::extract::{MetadataExtractor, PyprojectExtractor};
use crate::repository::{select_by_name, Candidate, DistributionType, Repository};

/// Kind part of a source repository's identity.
pub const SOURCE_KIND: &str = "source";

/// Directory names that are never searched.
pub const SPECIAL_DIRS: &[&str] = &[
    "site-packages",
    "dist-packages",
    ".git",
    ".svn",
    ".idea",
    "__pycache__",
    "node_modules",
    "venv",
    ".venv",
    ".eggs",
    "build",
    "dist",
];

/// A directory containing one of these is a package, not a project root.
const MARKER_FILES: &[&str] = &["__init__.py"];

const PROJECT_FILES: &[&str] = &["pyproject.toml", "setup.py"];

/// Projects found under a directory tree.
///
/// Metadata is read once, when the repository is created. Projects whose
/// metadata cannot be read are logged and left out.
pub struct SourceRepository {
    root: PathBuf,
    identity: RepositoryId,
    candidates: Vec<Candidate>,
}

impl SourceRepository {
    /// Walk `root`, skipping [`SPECIAL_DIRS`], test directories inside
    /// projects, and any directory matching one of `exclude` (globs
    /// relative to `root`). `fallback` reads projects without static
    /// metadata.
    pub fn new(
        root: &Path,
        exclude: &[String],
        fallback: Option<&dyn MetadataExtractor>,
    ) -> Result<Self, RepositoryInitializationError> {
        if !root.is_dir() {
            return Err(RepositoryInitializationError::MissingSource {
                path: root.to_path_buf(),
            });
        }
        let root = root.canonicalize().map_err(|source| RepositoryInitializationError::Io {
            path: root.to_path_buf(),
            source,
        })?;
        let excludes = build_globset(exclude)?;
        let identity = RepositoryId::new(SOURCE_KIND, root.display());

        let mut project_dirs = Vec::new();
        walk(&root, &root, &excludes, &mut project_dirs)?;
        tracing::debug!("found {} project directories under {}", project_dirs.len(), root.display());

        let mut deferred = Vec::new();
        let mut candidates = Vec::new();
        for dir in project_dirs {
            match PyprojectExtractor.extract(&dir) {
                Ok(dist) => candidates.push(source_candidate(dist, &dir, &identity)),
                Err(ExtractionError::NoMetadata { .. }) if dir.join("setup.py").is_file() => {
                    deferred.push(dir);
                }
                Err(e) => tracing::error!("failed to read metadata for {}: {e}", dir.display()),
            }
        }

        for dir in deferred {
            let Some(extractor) = fallback else {
                tracing::warn!(
                    "skipping {}: setup.py projects need an extraction command",
                    dir.display()
                );
                continue;
            };
            match extractor.extract(&dir) {
                Ok(dist) => candidates.push(source_candidate(dist, &dir, &identity)),
                Err(e) => tracing::error!("failed to extract metadata for {}: {e}", dir.display()),
            }
        }

        candidates.sort_by(|a, b| {
            reqpin_core::normalize_name(&a.name)
                .cmp(&reqpin_core::normalize_name(&b.name))
                .then_with(|| b.version.cmp(&a.version))
        });

        Ok(Self {
            root,
            identity,
            candidates,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Repository for SourceRepository {
    fn identity(&self) -> RepositoryId {
        self.identity.clone()
    }

    fn get_candidates(&mut self, req: Option<&Requirement>) -> Result<Vec<Candidate>, RepositoryError> {
        Ok(select_by_name(&self.candidates, req))
    }

    fn resolve_candidate(&mut self, candidate: &Candidate) -> Result<(DistInfo, bool), RepositoryError> {
        candidate
            .preparsed
            .clone()
            .map(|dist| (dist, true))
            .ok_or_else(|| RepositoryError::NotFound {
                identity: self.identity.to_string(),
                name: candidate.name.clone(),
                version: candidate.version.to_string(),
            })
    }

    fn allows_prereleases(&self) -> bool {
        true
    }
}

fn source_candidate(dist: DistInfo, dir: &Path, identity: &RepositoryId) -> Candidate {
    let dist = dist.with_origin(identity.clone());
    Candidate::new(
        dist.name.clone(),
        dist.version.clone(),
        DistributionType::Source,
        dir.display().to_string(),
        identity.clone(),
    )
    .with_preparsed(dist)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, RepositoryInitializationError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| RepositoryInitializationError::InvalidExclude {
            pattern: pattern.clone(),
            message: e.to_string(),
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| RepositoryInitializationError::InvalidExclude {
        pattern: patterns.join(", "),
        message: e.to_string(),
    })
}

fn is_skipped_dir(name: &str) -> bool {
    SPECIAL_DIRS.contains(&name) || name.ends_with(".egg-info") || name.ends_with(".dist-info")
}

fn is_test_dir(name: &str) -> bool {
    name == "tests" || name == "test" || name.ends_with("-tests") || name.ends_with("-test")
}

fn walk(
    root: &Path,
    dir: &Path,
    excludes: &GlobSet,
    found: &mut Vec<PathBuf>,
) -> Result<(), RepositoryInitializationError> {
    let io_err = |source| RepositoryInitializationError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    let mut subdirs = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let name = entry.file_name().to_string_lossy().to_string();
        let file_type = entry.file_type().map_err(io_err)?;
        if file_type.is_dir() {
            subdirs.push((name, entry.path()));
        } else {
            files.push(name);
        }
    }

    if dir != root && files.iter().any(|f| MARKER_FILES.contains(&f.as_str())) {
        return Ok(());
    }
    let is_project = files.iter().any(|f| PROJECT_FILES.contains(&f.as_str()));
    if is_project {
        found.push(dir.to_path_buf());
    }

    subdirs.sort();
    for (name, path) in subdirs {
        if is_skipped_dir(&name) || (is_project && is_test_dir(&name)) {
            continue;
        }
        let relative = path.strip_prefix(root).unwrap_or(&path);
        if excludes.is_match(relative) {
            tracing::debug!("excluding {}", path.display());
            continue;
        }
        walk(root, &path, excludes, found)?;
    }
    Ok(())
}
