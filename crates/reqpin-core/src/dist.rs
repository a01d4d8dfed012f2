//! Materialized package metadata.

use std::fmt;

use crate::marker::MarkerEnvironment;
use crate::name::{normalize_name, PackageName};
use crate::requirement::Requirement;
use crate::specifier::{Clause, Operator, Specifier};
use crate::version::Version;

/// Identity of the repository a distribution came from.
///
/// Two repositories over the same backing resource share an id, e.g.
/// `pypi:https://pypi.org/pypi` or `solution:/work/requirements.txt`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RepositoryId(String);

impl RepositoryId {
    pub fn new(kind: &str, location: impl fmt::Display) -> Self {
        Self(format!("{kind}:{location}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The repository kind, e.g. `pypi` or `source`.
    pub fn kind(&self) -> &str {
        self.0.split_once(':').map_or(self.0.as_str(), |(kind, _)| kind)
    }
}

impl fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A package version together with the requirements it declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistInfo {
    pub name: String,
    pub version: Version,
    pub requirements: Vec<Requirement>,
    pub origin: Option<RepositoryId>,
    /// Synthetic root (a requirements file or command line) that never
    /// appears in a solution.
    pub meta: bool,
}

impl DistInfo {
    pub fn new(name: impl Into<String>, version: Version, requirements: Vec<Requirement>) -> Self {
        Self {
            name: name.into(),
            version,
            requirements,
            origin: None,
            meta: false,
        }
    }

    /// A synthetic root carrying top-level requirements.
    pub fn root(name: impl Into<String>, requirements: Vec<Requirement>) -> Self {
        Self {
            meta: true,
            ..Self::new(name, Version::from_release([0]), requirements)
        }
    }

    pub fn with_origin(mut self, origin: RepositoryId) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn key(&self) -> PackageName {
        normalize_name(&self.name)
    }

    /// Requirements that apply for `extra` in `env`.
    ///
    /// Without an extra this is every requirement active with no extras.
    /// With one, only those the extra switches on, so an extra variant
    /// never repeats its base package's requirements.
    pub fn requires(&self, extra: Option<&str>, env: &MarkerEnvironment) -> Vec<Requirement> {
        self.requirements
            .iter()
            .filter(|req| match extra {
                None => req.is_active(env, &[]),
                Some(extra) => req.is_active(env, &[extra]) && !req.is_active(env, &[]),
            })
            .cloned()
            .collect()
    }

    /// `name==version`
    pub fn pin(&self) -> Requirement {
        let mut specifier = Specifier::new();
        specifier.insert(Clause::new(Operator::Equal, self.version.clone()));
        Requirement {
            specifier,
            ..Requirement::new(self.name.clone())
        }
    }
}

impl fmt::Display for DistInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.meta {
            f.write_str(&self.name)
        } else {
            write!(f, "{}=={}", self.name, self.version)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(s: &str) -> Requirement {
        Requirement::parse(s).unwrap()
    }

    #[test]
    fn requires_splits_by_extra() {
        let dist = DistInfo::new(
            "a",
            Version::parse("1.0").unwrap(),
            vec![
                r("b>1"),
                r("c; extra==\"test\""),
                r("d; extra==\"docs\""),
                r("e; sys_platform==\"win32\""),
            ],
        );
        let env = MarkerEnvironment::new().with("sys_platform", "linux");
        let base: Vec<String> = dist.requires(None, &env).iter().map(|r| r.to_string()).collect();
        assert_eq!(base, vec!["b>1"]);
        let test: Vec<String> = dist
            .requires(Some("test"), &env)
            .iter()
            .map(|r| r.name.clone())
            .collect();
        assert_eq!(test, vec!["c"]);
    }

    #[test]
    fn pin_and_display() {
        let dist = DistInfo::new("Foo", Version::parse("1.2").unwrap(), vec![]);
        assert_eq!(dist.pin().to_string(), "Foo==1.2");
        assert_eq!(dist.to_string(), "Foo==1.2");
        assert_eq!(DistInfo::root("requirements.in", vec![]).to_string(), "requirements.in");
    }

    #[test]
    fn repository_id() {
        let id = RepositoryId::new("memory", "fixtures");
        assert_eq!(id.as_str(), "memory:fixtures");
        assert_eq!(id.kind(), "memory");
        assert_eq!(RepositoryId::new("source", "C:/work").kind(), "source");
    }
}
