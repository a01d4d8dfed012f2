//! Previously written solutions as a closed candidate source.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use reqpin_core::solution::{load_solution, SolutionError};
use reqpin_core::{
    normalize_name, DistInfo, DistributionGraph, MergeCache, PackageName, RepositoryId, Requirement,
};

use crate::error::{RepositoryError, RepositoryInitializationError};
use crate::repository::{select_by_name, Candidate, DistributionType, Repository};

/// Offers exactly the pins recorded in a solution file, in file order.
///
/// Excluded names are never offered, which forces those packages to be
/// resolved again from the other repositories while the rest of the
/// solution is trusted.
pub struct SolutionRepository {
    path: PathBuf,
    identity: RepositoryId,
    graph: DistributionGraph,
    candidates: Vec<Candidate>,
    excluded: HashSet<PackageName>,
}

impl SolutionRepository {
    pub fn load(path: &Path, excluded: &[String]) -> Result<Self, RepositoryInitializationError> {
        let text = std::fs::read_to_string(path).map_err(|source| RepositoryInitializationError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_text(&text, path, excluded)
    }

    pub fn from_text(text: &str, path: &Path, excluded: &[String]) -> Result<Self, RepositoryInitializationError> {
        let identity = RepositoryId::new("solution", path.display());
        let mut cache = MergeCache::new();
        let graph = load_solution(text, Some(&identity), &mut cache).map_err(|source| match source {
            SolutionError::Unannotated { line, text } => RepositoryInitializationError::Unannotated {
                path: path.to_path_buf(),
                line,
                text,
            },
            source => RepositoryInitializationError::Solution {
                path: path.to_path_buf(),
                source,
            },
        })?;

        let candidates = graph
            .nodes()
            .filter(|(_, node)| node.key.extra.is_none() && !node.is_meta())
            .filter_map(|(_, node)| node.metadata.as_ref())
            .map(|dist| {
                Candidate::new(
                    dist.name.clone(),
                    dist.version.clone(),
                    DistributionType::Prebuilt,
                    path.display().to_string(),
                    identity.clone(),
                )
                .with_preparsed(dist.clone())
            })
            .collect();
        tracing::debug!("loaded solution {} with {} pins", path.display(), graph.len());

        Ok(Self {
            path: path.to_path_buf(),
            identity,
            graph,
            candidates,
            excluded: excluded.iter().map(|name| normalize_name(name)).collect(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The finalized graph read from the file.
    pub fn graph(&self) -> &DistributionGraph {
        &self.graph
    }

    fn is_excluded(&self, name: &str) -> bool {
        self.excluded.contains(&normalize_name(name))
    }
}

impl Repository for SolutionRepository {
    fn identity(&self) -> RepositoryId {
        self.identity.clone()
    }

    /// Every pin for `None`; otherwise the pin for the requested name
    /// unless that name is excluded.
    fn get_candidates(&mut self, req: Option<&Requirement>) -> Result<Vec<Candidate>, RepositoryError> {
        match req {
            Some(req) if self.is_excluded(&req.name) => Ok(Vec::new()),
            _ => Ok(select_by_name(&self.candidates, req)),
        }
    }

    fn resolve_candidate(&mut self, candidate: &Candidate) -> Result<(DistInfo, bool), RepositoryError> {
        let not_found = || RepositoryError::NotFound {
            identity: self.identity.to_string(),
            name: candidate.name.clone(),
            version: candidate.version.to_string(),
        };
        let id = self.graph.get(&candidate.name, None).ok_or_else(not_found)?;
        let node = self.graph.node(id);
        match &node.metadata {
            Some(dist) if dist.version == candidate.version => Ok((dist.clone(), node.complete)),
            _ => Err(not_found()),
        }
    }

    fn allows_prereleases(&self) -> bool {
        true
    }
}
