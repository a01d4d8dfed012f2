//! Version specifiers: comma separated sets of `(operator, version)` clauses.
//!
//! A specifier is a set, not an interval. Merging two specifiers is a plain
//! union of their clauses; contradictory clauses are kept and only show up
//! when no candidate version satisfies all of them.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::error::ParseError;
use crate::version::Version;

/// Comparison operator of a single clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operator {
    Equal,
    ArbitraryEqual,
    NotEqual,
    Compatible,
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,
}

impl Operator {
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Equal => "==",
            Operator::ArbitraryEqual => "===",
            Operator::NotEqual => "!=",
            Operator::Compatible => "~=",
            Operator::LessThan => "<",
            Operator::LessThanEqual => "<=",
            Operator::GreaterThan => ">",
            Operator::GreaterThanEqual => ">=",
        }
    }

    /// Parse the longest operator prefix of `text`, returning it and its length.
    pub fn parse_prefix(text: &str) -> Option<(Operator, usize)> {
        const OPERATORS: [(&str, Operator); 8] = [
            ("===", Operator::ArbitraryEqual),
            ("==", Operator::Equal),
            ("!=", Operator::NotEqual),
            ("~=", Operator::Compatible),
            ("<=", Operator::LessThanEqual),
            (">=", Operator::GreaterThanEqual),
            ("<", Operator::LessThan),
            (">", Operator::GreaterThan),
        ];
        OPERATORS
            .iter()
            .find(|(token, _)| text.starts_with(token))
            .map(|(token, op)| (*op, token.len()))
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `(operator, version)` constraint, e.g. `>=1.2` or `==2.*`.
#[derive(Debug, Clone)]
pub struct Clause {
    op: Operator,
    version: Version,
    /// Trailing `.*` on `==`/`!=` clauses.
    wildcard: bool,
}

impl Clause {
    pub fn new(op: Operator, version: Version) -> Self {
        Self {
            op,
            version,
            wildcard: false,
        }
    }

    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let trimmed = text.trim();
        let (op, len) = Operator::parse_prefix(trimmed)
            .ok_or_else(|| ParseError::new("expected a comparison operator", text, 0))?;
        let rest = trimmed[len..].trim();
        let (version_text, wildcard) = match rest.strip_suffix(".*") {
            Some(prefix) => (prefix, true),
            None => (rest, false),
        };
        if wildcard && !matches!(op, Operator::Equal | Operator::NotEqual) {
            return Err(ParseError::new(
                "wildcards are only allowed with `==` and `!=`",
                text,
                len,
            ));
        }
        let version = Version::parse(version_text).map_err(|e| {
            let position = len + e.position();
            ParseError::new(e.message, text, position)
        })?;
        if op == Operator::Compatible && version.release().len() < 2 {
            return Err(ParseError::new(
                "`~=` requires at least two release segments",
                text,
                len,
            ));
        }
        Ok(Self {
            op,
            version,
            wildcard,
        })
    }

    pub fn operator(&self) -> Operator {
        self.op
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn is_wildcard(&self) -> bool {
        self.wildcard
    }

    /// Release segments as written, for clauses whose meaning depends on
    /// them: `~=1.0` and `~=1.0.0` admit different versions even though
    /// `1.0 == 1.0.0`.
    fn literal_release(&self) -> Option<&[u64]> {
        if self.wildcard || matches!(self.op, Operator::Compatible | Operator::ArbitraryEqual) {
            Some(self.version.release())
        } else {
            None
        }
    }

    /// Whether `candidate` satisfies this clause, ignoring pre-release policy.
    pub fn matches(&self, candidate: &Version) -> bool {
        let spec = &self.version;
        match self.op {
            Operator::Equal if self.wildcard => prefix_match(spec, candidate),
            Operator::NotEqual if self.wildcard => !prefix_match(spec, candidate),
            Operator::Equal => equal_ignoring_local(spec, candidate),
            Operator::NotEqual => !equal_ignoring_local(spec, candidate),
            Operator::ArbitraryEqual => spec.to_string() == candidate.to_string(),
            Operator::Compatible => {
                let prefix = &spec.release()[..spec.release().len() - 1];
                candidate.without_local() >= *spec
                    && prefix_match(&Version::from_release(prefix.iter().copied()), candidate)
            }
            Operator::LessThanEqual => candidate.without_local() <= *spec,
            Operator::GreaterThanEqual => candidate.without_local() >= *spec,
            Operator::LessThan => {
                candidate.without_local() < *spec
                    // `<3.0` does not admit `3.0rc1`
                    && !(candidate.is_prerelease()
                        && !spec.is_prerelease()
                        && same_release(spec, candidate))
            }
            Operator::GreaterThan => {
                candidate.without_local() > *spec
                    // `>1.0` does not admit `1.0.post1`
                    && !(candidate.is_postrelease()
                        && !spec.is_postrelease()
                        && same_release(spec, candidate))
                    && !(candidate.has_local() && same_release(spec, candidate))
            }
        }
    }
}

fn equal_ignoring_local(spec: &Version, candidate: &Version) -> bool {
    if spec.has_local() {
        spec == candidate
    } else {
        *spec == candidate.without_local()
    }
}

fn same_release(a: &Version, b: &Version) -> bool {
    a.epoch() == b.epoch()
        && Version::from_release(a.release().iter().copied())
            == Version::from_release(b.release().iter().copied())
}

/// `==1.2.*` semantics: the candidate's release starts with the spec's.
fn prefix_match(spec: &Version, candidate: &Version) -> bool {
    if spec.epoch() != candidate.epoch() {
        return false;
    }
    spec.release()
        .iter()
        .enumerate()
        .all(|(i, n)| candidate.release().get(i).copied().unwrap_or(0) == *n)
}

impl Ord for Clause {
    fn cmp(&self, other: &Self) -> Ordering {
        self.version
            .cmp(&other.version)
            .then_with(|| self.op.cmp(&other.op))
            .then_with(|| self.wildcard.cmp(&other.wildcard))
            .then_with(|| self.literal_release().cmp(&other.literal_release()))
    }
}

impl PartialEq for Clause {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Clause {}

impl Hash for Clause {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.version.hash(state);
        self.op.hash(state);
        self.wildcard.hash(state);
        self.literal_release().hash(state);
    }
}

impl PartialOrd for Clause {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.op, self.version)?;
        if self.wildcard {
            f.write_str(".*")?;
        }
        Ok(())
    }
}

/// An ordered set of clauses that must all hold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Specifier {
    clauses: BTreeSet<Clause>,
}

impl Specifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let mut clauses = BTreeSet::new();
        if text.trim().is_empty() {
            return Ok(Self { clauses });
        }
        let mut offset = 0;
        for part in text.split(',') {
            let clause = Clause::parse(part).map_err(|e| {
                let position = offset + e.position();
                ParseError::new(e.message, text, position)
            })?;
            clauses.insert(clause);
            offset += part.len() + 1;
        }
        Ok(Self { clauses })
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn clauses(&self) -> impl Iterator<Item = &Clause> {
        self.clauses.iter()
    }

    pub fn insert(&mut self, clause: Clause) {
        self.clauses.insert(clause);
    }

    /// Union of both clause sets. Duplicates collapse, conflicts are kept.
    pub fn union(&self, other: &Specifier) -> Specifier {
        Specifier {
            clauses: self.clauses.union(&other.clauses).cloned().collect(),
        }
    }

    /// The version pinned by a single non-wildcard `==`/`===` clause.
    pub fn pinned_version(&self) -> Option<&Version> {
        let mut clauses = self.clauses.iter();
        match (clauses.next(), clauses.next()) {
            (Some(clause), None)
                if !clause.wildcard
                    && matches!(clause.op, Operator::Equal | Operator::ArbitraryEqual) =>
            {
                Some(&clause.version)
            }
            _ => None,
        }
    }

    /// Whether any clause names a pre-release, which opts into pre-releases.
    pub fn mentions_prerelease(&self) -> bool {
        self.clauses
            .iter()
            .any(|c| c.version.is_prerelease() && c.op != Operator::NotEqual)
    }

    /// Whether `version` satisfies every clause. Pre-releases are only
    /// admitted when `allow_prereleases` is set or a clause mentions one.
    pub fn contains(&self, version: &Version, allow_prereleases: bool) -> bool {
        if version.is_prerelease() && !allow_prereleases && !self.mentions_prerelease() {
            return false;
        }
        self.clauses.iter().all(|c| c.matches(version))
    }
}

impl FromStr for Specifier {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Specifier::parse(s)
    }
}

impl fmt::Display for Specifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.clauses.iter().map(ToString::to_string).collect();
        f.write_str(&parts.join(","))
    }
}
