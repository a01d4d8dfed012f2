//! Ordered aggregate of repositories.

use reqpin_core::{DistInfo, RepositoryId, Requirement};

use crate::error::{RepositoryError, RepositoryInitializationError};
use crate::repository::{Candidate, Repository};

/// Repositories consulted in registration order.
#[derive(Default)]
pub struct MultiRepository {
    repos: Vec<Box<dyn Repository>>,
    closed: bool,
}

impl MultiRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a repository. The same identity may only be added once.
    pub fn add(&mut self, repo: Box<dyn Repository>) -> Result<(), RepositoryInitializationError> {
        let identity = repo.identity();
        if self.repos.iter().any(|r| r.identity() == identity) {
            return Err(RepositoryInitializationError::Duplicate {
                identity: identity.to_string(),
            });
        }
        tracing::debug!("registered repository {identity}");
        self.repos.push(repo);
        Ok(())
    }

    pub fn with(mut self, repo: impl Repository + 'static) -> Result<Self, RepositoryInitializationError> {
        self.add(Box::new(repo))?;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.repos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repos.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn members(&self) -> impl Iterator<Item = &dyn Repository> + '_ {
        self.repos.iter().map(|r| r.as_ref())
    }

    pub fn members_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn Repository>> + '_ {
        self.repos.iter_mut()
    }

    fn member_for(&mut self, origin: &RepositoryId) -> Option<&mut Box<dyn Repository>> {
        self.repos.iter_mut().find(|r| &r.identity() == origin)
    }
}

impl Repository for MultiRepository {
    fn identity(&self) -> RepositoryId {
        let ids: Vec<String> = self.repos.iter().map(|r| r.identity().to_string()).collect();
        RepositoryId::new("multi", ids.join(","))
    }

    /// Candidates of every member, in registration order. A failing member
    /// is skipped unless every member fails.
    fn get_candidates(&mut self, req: Option<&Requirement>) -> Result<Vec<Candidate>, RepositoryError> {
        let mut candidates = Vec::new();
        let mut first_err = None;
        let mut failures = 0;
        for repo in &mut self.repos {
            match repo.get_candidates(req) {
                Ok(found) => candidates.extend(found),
                Err(e) => {
                    tracing::warn!("{} failed to list candidates: {e}", repo.identity());
                    failures += 1;
                    first_err.get_or_insert(e);
                }
            }
        }
        match first_err {
            Some(e) if failures == self.repos.len() => Err(e),
            _ => Ok(candidates),
        }
    }

    fn resolve_candidate(&mut self, candidate: &Candidate) -> Result<(DistInfo, bool), RepositoryError> {
        let identity = self.identity();
        match self.member_for(&candidate.origin) {
            Some(repo) => repo.resolve_candidate(candidate),
            None => Err(RepositoryError::NotFound {
                identity: identity.to_string(),
                name: candidate.name.clone(),
                version: candidate.version.to_string(),
            }),
        }
    }

    /// Close every member exactly once; later calls do nothing.
    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        for repo in &mut self.repos {
            repo.close();
        }
    }

    fn allows_prereleases(&self) -> bool {
        self.repos.iter().any(|r| r.allows_prereleases())
    }
}

impl Drop for MultiRepository {
    fn drop(&mut self) {
        self.close();
    }
}
