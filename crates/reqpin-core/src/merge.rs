//! Combining requirements on the same package.
//!
//! Specifier clauses and extras are unioned. Markers collapse when one
//! side is absent, when they are identical, or when one rendering contains
//! the other; otherwise they are conjoined.

use std::collections::HashMap;

use crate::error::MergeError;
use crate::marker::MarkerTree;
use crate::name::NameCache;
use crate::requirement::Requirement;

/// Memoized merge algebra, owned by one resolution run.
#[derive(Debug, Default)]
pub struct MergeCache {
    names: NameCache,
    merged: HashMap<(Requirement, Requirement), Requirement>,
}

impl MergeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn names(&mut self) -> &mut NameCache {
        &mut self.names
    }

    /// Number of memoized merge results.
    pub fn len(&self) -> usize {
        self.merged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.merged.is_empty()
    }

    pub fn merge(&mut self, a: &Requirement, b: &Requirement) -> Result<Requirement, MergeError> {
        let left = self.names.normalize(&a.name);
        let right = self.names.normalize(&b.name);
        if left != right {
            return Err(MergeError::NameMismatch {
                left: a.name.clone(),
                right: b.name.clone(),
            });
        }

        // Order the pair so that merge(a, b) and merge(b, a) share an entry
        // and produce the same spelling of the name.
        let (first, second) = if a.to_string() <= b.to_string() {
            (a, b)
        } else {
            (b, a)
        };
        let key = (first.clone(), second.clone());
        if let Some(found) = self.merged.get(&key) {
            return Ok(found.clone());
        }

        let merged = Requirement {
            name: first.name.clone(),
            extras: first.extras.union(&second.extras).cloned().collect(),
            specifier: first.specifier.union(&second.specifier),
            marker: merge_markers(first.marker.as_ref(), second.marker.as_ref()),
        };
        tracing::trace!("merged `{first}` and `{second}` into `{merged}`");
        self.merged.insert(key, merged.clone());
        Ok(merged)
    }

    /// [`merge`](Self::merge) with absence as the identity.
    pub fn merge_opt(
        &mut self,
        a: Option<&Requirement>,
        b: Option<&Requirement>,
    ) -> Result<Option<Requirement>, MergeError> {
        match (a, b) {
            (None, None) => Ok(None),
            (Some(req), None) | (None, Some(req)) => Ok(Some(req.clone())),
            (Some(a), Some(b)) => self.merge(a, b).map(Some),
        }
    }

    /// Fold any number of requirements; `None` for an empty input.
    pub fn merge_all<'a, I>(&mut self, requirements: I) -> Result<Option<Requirement>, MergeError>
    where
        I: IntoIterator<Item = &'a Requirement>,
    {
        let mut acc: Option<Requirement> = None;
        for req in requirements {
            acc = self.merge_opt(acc.as_ref(), Some(req))?;
        }
        Ok(acc)
    }
}

fn merge_markers(a: Option<&MarkerTree>, b: Option<&MarkerTree>) -> Option<MarkerTree> {
    match (a, b) {
        (None, None) => None,
        (Some(m), None) | (None, Some(m)) => Some(m.clone()),
        (Some(a), Some(b)) if a == b => Some(a.clone()),
        (Some(a), Some(b)) => {
            let (left, right) = (a.to_string(), b.to_string());
            if left.contains(&right) {
                Some(a.clone())
            } else if right.contains(&left) {
                Some(b.clone())
            } else {
                Some(a.and(b))
            }
        }
    }
}
