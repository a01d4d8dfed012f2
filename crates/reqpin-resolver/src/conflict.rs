//! Reporting why a package could not be resolved.

use std::fmt;

use miette::Diagnostic;

use reqpin_core::Requirement;

/// One requirement that fed into the failing constraint, with the chain of
/// dependents that introduced it (root first).
#[derive(Debug, Clone)]
pub struct Contribution {
    pub requirement: Requirement,
    pub chain: Vec<String>,
}

/// A candidate that matched but could not be materialized.
#[derive(Debug, Clone)]
pub struct Rejection {
    pub candidate: String,
    pub reason: String,
}

/// No repository offered a usable candidate for a package.
#[derive(Debug, Clone)]
pub struct ResolutionConflict {
    pub package: String,
    pub constraint: Requirement,
    pub contributions: Vec<Contribution>,
    pub rejected: Vec<Rejection>,
    /// Versions that were offered but do not satisfy the constraint.
    pub available: Vec<String>,
}

impl ResolutionConflict {
    pub fn new(package: impl Into<String>, constraint: Requirement) -> Self {
        Self {
            package: package.into(),
            constraint,
            contributions: Vec::new(),
            rejected: Vec::new(),
            available: Vec::new(),
        }
    }
}

impl fmt::Display for ResolutionConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "No version of {} satisfies `{}`", self.package, self.constraint)?;
        for c in &self.contributions {
            write!(f, "\n  `{}` required by {}", c.requirement, c.chain.join(" -> "))?;
        }
        for r in &self.rejected {
            write!(f, "\n  rejected {}: {}", r.candidate, r.reason)?;
        }
        if self.available.is_empty() {
            write!(f, "\n  no candidates found")?;
        } else {
            write!(f, "\n  available: {}", self.available.join(", "))?;
        }
        Ok(())
    }
}

impl std::error::Error for ResolutionConflict {}

impl Diagnostic for ResolutionConflict {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new("reqpin::resolve::conflict"))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        if self.contributions.len() > 1 {
            Some(Box::new("the requirements above cannot all be met; relax one of them"))
        } else {
            None
        }
    }
}
