//! The repository protocol: sources of candidates and their metadata.

use std::collections::BTreeSet;
use std::fmt;

use reqpin_core::{normalize_name, DistInfo, RepositoryId, Requirement, Version};

use crate::error::RepositoryError;

/// How a candidate is distributed. Prebuilt candidates are preferred by
/// index-backed repositories when both exist for a version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DistributionType {
    Prebuilt,
    Source,
}

impl fmt::Display for DistributionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistributionType::Prebuilt => f.write_str("prebuilt"),
            DistributionType::Source => f.write_str("source"),
        }
    }
}

/// A concrete offer of one package version that has not been materialized
/// yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub name: String,
    pub version: Version,
    /// Extras requested by the requirement this candidate answers.
    pub extras: BTreeSet<String>,
    pub kind: DistributionType,
    /// Metadata already known without calling `resolve_candidate`.
    pub preparsed: Option<DistInfo>,
    /// Opaque per-repository handle (file URL, source directory, ...).
    pub location: String,
    pub origin: RepositoryId,
}

impl Candidate {
    pub fn new(
        name: impl Into<String>,
        version: Version,
        kind: DistributionType,
        location: impl Into<String>,
        origin: RepositoryId,
    ) -> Self {
        Self {
            name: name.into(),
            version,
            extras: BTreeSet::new(),
            kind,
            preparsed: None,
            location: location.into(),
            origin,
        }
    }

    pub fn with_preparsed(mut self, dist: DistInfo) -> Self {
        self.preparsed = Some(dist);
        self
    }

    /// Does this candidate satisfy the version constraint of `req`?
    pub fn satisfies(&self, req: &Requirement, allow_prereleases: bool) -> bool {
        normalize_name(&self.name) == req.key() && req.specifier.contains(&self.version, allow_prereleases)
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=={} ({}, {})", self.name, self.version, self.kind, self.origin)
    }
}

/// A source of candidates.
///
/// Repositories are scoped resources: the resolver calls [`close`](Self::close)
/// exactly once when a run ends, successfully or not. Two repositories are
/// the same repository when their identities are equal.
pub trait Repository {
    fn identity(&self) -> RepositoryId;

    /// Candidates in this repository's preference order. With `None`,
    /// every candidate the repository can offer; otherwise those whose
    /// name matches `req` and that are not excluded. Version filtering is
    /// left to the caller.
    fn get_candidates(&mut self, req: Option<&Requirement>) -> Result<Vec<Candidate>, RepositoryError>;

    /// Materialize full metadata for `candidate`. The flag is `false` when
    /// the metadata is a best guess that a later resolution may refine.
    fn resolve_candidate(&mut self, candidate: &Candidate) -> Result<(DistInfo, bool), RepositoryError>;

    fn close(&mut self) {}

    fn allows_prereleases(&self) -> bool {
        false
    }
}

impl PartialEq for dyn Repository {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl fmt::Debug for dyn Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Repository({})", self.identity())
    }
}

/// Keep the candidates whose name matches `req` (all of them for `None`),
/// recording the requested extras on each.
pub fn select_by_name<'a, I>(candidates: I, req: Option<&Requirement>) -> Vec<Candidate>
where
    I: IntoIterator<Item = &'a Candidate>,
{
    let Some(req) = req else {
        return candidates.into_iter().cloned().collect();
    };
    let key = req.key();
    candidates
        .into_iter()
        .filter(|c| normalize_name(&c.name) == key)
        .map(|c| Candidate {
            extras: req.extras.clone(),
            ..c.clone()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(name: &str, version: &str) -> Candidate {
        Candidate::new(
            name,
            Version::parse(version).unwrap(),
            DistributionType::Prebuilt,
            "",
            RepositoryId::new("memory", "test"),
        )
    }

    #[test]
    fn satisfies_checks_name_and_version() {
        let c = candidate("Foo_Bar", "1.5");
        assert!(c.satisfies(&Requirement::parse("foo-bar>=1").unwrap(), false));
        assert!(!c.satisfies(&Requirement::parse("foo-bar>=2").unwrap(), false));
        assert!(!c.satisfies(&Requirement::parse("other").unwrap(), false));
    }

    #[test]
    fn prereleases_need_permission() {
        let c = candidate("foo", "2.0b1");
        let req = Requirement::parse("foo>=1").unwrap();
        assert!(!c.satisfies(&req, false));
        assert!(c.satisfies(&req, true));
    }

    #[test]
    fn select_by_name_records_extras() {
        let all = vec![candidate("foo", "1.0"), candidate("bar", "1.0")];
        let req = Requirement::parse("FOO[test]>=1").unwrap();
        let picked = select_by_name(&all, Some(&req));
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].extras.iter().collect::<Vec<_>>(), vec!["test"]);
        assert_eq!(select_by_name(&all, None).len(), 2);
    }
}
