//! Package name normalization.
//!
//! Two names refer to the same package when they are equal after
//! lowercasing and mapping `_` to `-`. Dots are kept as written.

use std::collections::HashMap;
use std::fmt;

/// A normalized package (or extra) name, used for all identity comparisons.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageName(String);

impl PackageName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PackageName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Normalize a package or extra name.
pub fn normalize_name(name: &str) -> PackageName {
    PackageName(name.trim().to_ascii_lowercase().replace('_', "-"))
}

/// Whether `name` is a syntactically valid distribution name:
/// ASCII alphanumerics, optionally joined by `.`, `-` or `_`.
pub fn is_valid_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    match (bytes.first(), bytes.last()) {
        (Some(first), Some(last)) => {
            first.is_ascii_alphanumeric()
                && last.is_ascii_alphanumeric()
                && bytes
                    .iter()
                    .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-' | b'_'))
        }
        _ => false,
    }
}

/// Memoizing front-end for [`normalize_name`], owned by a resolution run.
#[derive(Debug, Default)]
pub struct NameCache {
    names: HashMap<String, PackageName>,
}

impl NameCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn normalize(&mut self, name: &str) -> PackageName {
        if let Some(found) = self.names.get(name) {
            return found.clone();
        }
        let normalized = normalize_name(name);
        self.names.insert(name.to_string(), normalized.clone());
        normalized
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_unifies_separators() {
        assert_eq!(normalize_name("Foo_Bar").as_str(), "foo-bar");
        assert_eq!(normalize_name("foo-bar"), normalize_name("FOO_BAR"));
        assert_eq!(normalize_name("zope.interface").as_str(), "zope.interface");
    }

    #[test]
    fn cache_returns_same_value() {
        let mut cache = NameCache::new();
        let a = cache.normalize("Django_Rest");
        let b = cache.normalize("Django_Rest");
        assert_eq!(a, b);
        assert_eq!(cache.len(), 1);
        assert_eq!(a.as_str(), "django-rest");
    }

    #[test]
    fn name_validity() {
        assert!(is_valid_name("requests"));
        assert!(is_valid_name("zope.interface"));
        assert!(is_valid_name("a"));
        assert!(!is_valid_name("-"));
        assert!(!is_valid_name("requirements/base.txt"));
        assert!(!is_valid_name("foo-"));
        assert!(!is_valid_name(""));
    }
}
