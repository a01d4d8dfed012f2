//! A single package requirement: `name[extras] specifier; marker`.

use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::error::ParseError;
use crate::marker::{MarkerEnvironment, MarkerTree};
use crate::name::{normalize_name, PackageName};
use crate::specifier::Specifier;
use crate::version::Version;

/// A named package reference with optional extras, version clauses and
/// an environment marker.
///
/// The name keeps its original spelling for display; identity always
/// goes through the normalized name. Extras are stored normalized.
#[derive(Debug, Clone)]
pub struct Requirement {
    pub name: String,
    pub extras: BTreeSet<String>,
    pub specifier: Specifier,
    pub marker: Option<MarkerTree>,
}

impl Requirement {
    /// A bare requirement on `name` with no constraints.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extras: BTreeSet::new(),
            specifier: Specifier::new(),
            marker: None,
        }
    }

    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let (body, marker) = match text.find(';') {
            Some(idx) => {
                let marker_text = &text[idx + 1..];
                let marker = MarkerTree::parse(marker_text).map_err(|e| {
                    let position = idx + 1 + e.position();
                    ParseError::new(e.message, text, position)
                })?;
                (&text[..idx], Some(marker))
            }
            None => (text, None),
        };

        let leading = body.len() - body.trim_start().len();
        let body = body.trim();
        let name_len = body
            .bytes()
            .take_while(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-' | b'_'))
            .count();
        let name = &body[..name_len];
        if !crate::name::is_valid_name(name) {
            return Err(ParseError::new("expected a package name", text, leading));
        }

        let mut rest = body[name_len..].trim_start();
        let mut extras = BTreeSet::new();
        if let Some(after) = rest.strip_prefix('[') {
            let close = after.find(']').ok_or_else(|| {
                ParseError::new("unterminated extras list", text, text.len() - rest.len())
            })?;
            for extra in after[..close].split(',').map(str::trim).filter(|e| !e.is_empty()) {
                if !crate::name::is_valid_name(extra) {
                    return Err(ParseError::new(
                        format!("invalid extra name `{extra}`"),
                        text,
                        text.len() - rest.len(),
                    ));
                }
                extras.insert(normalize_name(extra).to_string());
            }
            rest = after[close + 1..].trim_start();
        }

        if rest.starts_with('@') {
            return Err(ParseError::new(
                "direct URL requirements are not supported",
                text,
                text.len() - rest.len(),
            ));
        }

        let spec_offset = text.len() - rest.len();
        let spec_text = match rest.strip_prefix('(') {
            Some(inner) => inner.strip_suffix(')').ok_or_else(|| {
                ParseError::new("unterminated parenthesized specifier", text, spec_offset)
            })?,
            None => rest,
        };
        let specifier = Specifier::parse(spec_text).map_err(|e| {
            let position = spec_offset + e.position();
            ParseError::new(e.message, text, position)
        })?;

        Ok(Self {
            name: name.to_string(),
            extras,
            specifier,
            marker,
        })
    }

    /// Normalized package name.
    pub fn key(&self) -> PackageName {
        normalize_name(&self.name)
    }

    /// A single `==`/`===` clause without a wildcard.
    pub fn is_pinned(&self) -> bool {
        self.specifier.pinned_version().is_some()
    }

    pub fn pinned_version(&self) -> Option<&Version> {
        self.specifier.pinned_version()
    }

    /// Whether the requirement applies in `env` with the given extras
    /// active. Requirements without a marker always apply.
    pub fn is_active(&self, env: &MarkerEnvironment, extras: &[&str]) -> bool {
        match &self.marker {
            None => true,
            Some(marker) => marker.evaluate_any(env, extras),
        }
    }

    pub fn with_extras<I, S>(mut self, extras: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extras = extras
            .into_iter()
            .map(|e| normalize_name(e.as_ref()).to_string())
            .collect();
        self
    }

    pub fn without_extras(&self) -> Self {
        Self {
            extras: BTreeSet::new(),
            ..self.clone()
        }
    }

    pub fn with_marker(mut self, marker: Option<MarkerTree>) -> Self {
        self.marker = marker;
        self
    }

    /// Conjoin `extra=="<extra>"` onto the marker, unless the marker
    /// already references `extra`.
    pub fn with_extra_marker(mut self, extra: &str) -> Self {
        let extra_marker = MarkerTree::extra(extra);
        self.marker = match self.marker.take() {
            None => Some(extra_marker),
            Some(marker) if marker.references_extra() => Some(marker),
            Some(marker) => Some(marker.and(&extra_marker)),
        };
        self
    }
}

impl PartialEq for Requirement {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
            && self.extras == other.extras
            && self.specifier == other.specifier
            && self.marker == other.marker
    }
}

impl Eq for Requirement {}

impl Hash for Requirement {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
        self.extras.hash(state);
        self.specifier.hash(state);
        self.marker.hash(state);
    }
}

impl FromStr for Requirement {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Requirement::parse(s)
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.extras.is_empty() {
            let extras: Vec<&str> = self.extras.iter().map(String::as_str).collect();
            write!(f, "[{}]", extras.join(","))?;
        }
        write!(f, "{}", self.specifier)?;
        if let Some(marker) = &self.marker {
            write!(f, "; {marker}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(s: &str) -> Requirement {
        Requirement::parse(s).unwrap()
    }

    #[test]
    fn parses_all_parts() {
        let req = r("Foo_Bar[Test, docs] >=1.0, <2 ; python_version < '3.8'");
        assert_eq!(req.name, "Foo_Bar");
        assert_eq!(req.key().as_str(), "foo-bar");
        assert_eq!(
            req.extras.iter().cloned().collect::<Vec<_>>(),
            vec!["docs".to_string(), "test".to_string()]
        );
        assert_eq!(req.specifier.to_string(), ">=1.0,<2");
        assert_eq!(
            req.to_string(),
            "Foo_Bar[docs,test]>=1.0,<2; python_version<\"3.8\""
        );
    }

    #[test]
    fn parenthesized_specifier() {
        assert_eq!(r("six (>=1.10)").to_string(), "six>=1.10");
    }

    #[test]
    fn render_then_parse_is_identity() {
        for text in [
            "a",
            "a==1.0",
            "a[x]>1,!=1.5; extra==\"y\"",
            "pylint>1,<2; platform_system==\"Windows\" and python_version<\"3.0\"",
            "zope.interface~=5.1; sys_platform not in \"win32 cygwin\"",
        ] {
            let req = r(text);
            assert_eq!(r(&req.to_string()), req, "{text}");
        }
    }

    #[test]
    fn equality_uses_normalized_name() {
        assert_eq!(r("Foo_Bar>1"), r("foo-bar>1"));
        assert_ne!(r("foo>1"), r("foo>2"));
    }

    #[test]
    fn pinned() {
        assert!(r("a==1.2.3").is_pinned());
        assert!(!r("a==1.*").is_pinned());
        assert!(!r("a>=1").is_pinned());
        assert!(!r("a==1,!=2").is_pinned());
    }

    #[test]
    fn marker_filtering() {
        let env = MarkerEnvironment::new();
        let req = r("b; extra==\"a\"");
        assert!(req.is_active(&env, &["a"]));
        assert!(!req.is_active(&env, &[]));
        assert!(!req.is_active(&env, &["b"]));
        assert!(r("b").is_active(&env, &[]));
    }

    #[test]
    fn extra_marker_injection() {
        let req = r("b>1").with_extra_marker("Test");
        assert_eq!(req.to_string(), "b>1; extra==\"test\"");
        let req = r("b; python_version<\"3\"").with_extra_marker("x");
        assert_eq!(req.to_string(), "b; extra==\"x\" and python_version<\"3\"");
        let already = r("b; extra==\"x\"").with_extra_marker("x");
        assert_eq!(already.to_string(), "b; extra==\"x\"");
    }

    #[test]
    fn rejects_bad_input() {
        assert!(Requirement::parse("").is_err());
        assert!(Requirement::parse(">=1").is_err());
        assert!(Requirement::parse("a[x").is_err());
        assert!(Requirement::parse("a >> 1").is_err());
        assert!(Requirement::parse("a @ https://example.com/a.whl").is_err());
        assert!(Requirement::parse("a; bogus == '1'").is_err());
    }
}
