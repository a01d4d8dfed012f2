//! A closed, in-memory set of distributions.

use std::collections::HashSet;

use reqpin_core::{DistInfo, PackageName, RepositoryId, Requirement, Version};

use crate::error::RepositoryError;
use crate::repository::{select_by_name, Candidate, DistributionType, Repository};

/// Distributions held in memory, offered highest version first.
#[derive(Debug, Clone)]
pub struct MemoryRepository {
    identity: RepositoryId,
    dists: Vec<DistInfo>,
    candidates: Vec<Candidate>,
    incomplete: HashSet<(PackageName, Version)>,
    prereleases: bool,
}

impl MemoryRepository {
    pub fn new(label: &str, dists: impl IntoIterator<Item = DistInfo>) -> Self {
        let identity = RepositoryId::new("memory", label);
        let mut dists: Vec<DistInfo> = dists
            .into_iter()
            .map(|dist| dist.with_origin(identity.clone()))
            .collect();
        dists.sort_by(|a, b| a.key().cmp(&b.key()).then_with(|| b.version.cmp(&a.version)));

        let candidates = dists
            .iter()
            .map(|dist| {
                Candidate::new(
                    dist.name.clone(),
                    dist.version.clone(),
                    DistributionType::Prebuilt,
                    format!("{}=={}", dist.name, dist.version),
                    identity.clone(),
                )
                .with_preparsed(dist.clone())
            })
            .collect();

        Self {
            identity,
            dists,
            candidates,
            incomplete: HashSet::new(),
            prereleases: false,
        }
    }

    /// Report the metadata of `name==version` as incomplete.
    pub fn mark_incomplete(mut self, name: &str, version: &Version) -> Self {
        self.incomplete
            .insert((reqpin_core::normalize_name(name), version.clone()));
        self
    }

    pub fn with_prereleases(mut self, allow: bool) -> Self {
        self.prereleases = allow;
        self
    }

    pub fn len(&self) -> usize {
        self.dists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dists.is_empty()
    }
}

impl Repository for MemoryRepository {
    fn identity(&self) -> RepositoryId {
        self.identity.clone()
    }

    fn get_candidates(&mut self, req: Option<&Requirement>) -> Result<Vec<Candidate>, RepositoryError> {
        Ok(select_by_name(&self.candidates, req))
    }

    fn resolve_candidate(&mut self, candidate: &Candidate) -> Result<(DistInfo, bool), RepositoryError> {
        let key = reqpin_core::normalize_name(&candidate.name);
        let dist = self
            .dists
            .iter()
            .find(|d| d.key() == key && d.version == candidate.version)
            .ok_or_else(|| RepositoryError::NotFound {
                identity: self.identity.to_string(),
                name: candidate.name.clone(),
                version: candidate.version.to_string(),
            })?;
        let complete = !self.incomplete.contains(&(key, candidate.version.clone()));
        Ok((dist.clone(), complete))
    }

    fn allows_prereleases(&self) -> bool {
        self.prereleases
    }
}
