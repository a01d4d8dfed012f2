//! Package version parsing and comparison.
//!
//! Versions follow the public version scheme used by Python packaging:
//! `[N!]N(.N)*[{a|b|rc}N][.postN][.devN][+local]`. Ordering rules:
//! - the epoch compares first, then the release segments numerically, with
//!   trailing zeros ignored (`1.0 == 1.0.0`)
//! - `dev` < `a` < `b` < `rc` < release < `post`
//! - a local label sorts after the same public version without one

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::error::ParseError;

/// A parsed, totally ordered package version.
#[derive(Debug, Clone)]
pub struct Version {
    epoch: u64,
    release: Vec<u64>,
    pre: Option<(PreKind, u64)>,
    post: Option<u64>,
    dev: Option<u64>,
    local: Vec<LocalSegment>,
}

/// Pre-release phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PreKind {
    Alpha,
    Beta,
    Rc,
}

impl PreKind {
    fn as_str(self) -> &'static str {
        match self {
            PreKind::Alpha => "a",
            PreKind::Beta => "b",
            PreKind::Rc => "rc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum LocalSegment {
    Number(u64),
    Text(String),
}

impl Ord for LocalSegment {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (LocalSegment::Number(a), LocalSegment::Number(b)) => a.cmp(b),
            (LocalSegment::Text(a), LocalSegment::Text(b)) => a.cmp(b),
            (LocalSegment::Number(_), LocalSegment::Text(_)) => Ordering::Greater,
            (LocalSegment::Text(_), LocalSegment::Number(_)) => Ordering::Less,
        }
    }
}

impl PartialOrd for LocalSegment {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for LocalSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocalSegment::Number(n) => write!(f, "{n}"),
            LocalSegment::Text(s) => f.write_str(s),
        }
    }
}

impl Version {
    /// Parse a version string, accepting the usual spelling variants
    /// (`1.0-alpha.1`, `v2`, `1.0.post-1`, `1.0-1`).
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        Parser::new(text).parse()
    }

    /// Build a plain release version from its numeric segments.
    pub fn from_release(release: impl IntoIterator<Item = u64>) -> Self {
        let release: Vec<u64> = release.into_iter().collect();
        Self {
            epoch: 0,
            release: if release.is_empty() { vec![0] } else { release },
            pre: None,
            post: None,
            dev: None,
            local: Vec::new(),
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn release(&self) -> &[u64] {
        &self.release
    }

    pub fn pre(&self) -> Option<(PreKind, u64)> {
        self.pre
    }

    pub fn post(&self) -> Option<u64> {
        self.post
    }

    pub fn dev(&self) -> Option<u64> {
        self.dev
    }

    pub fn has_local(&self) -> bool {
        !self.local.is_empty()
    }

    /// Pre-releases and development releases.
    pub fn is_prerelease(&self) -> bool {
        self.pre.is_some() || self.dev.is_some()
    }

    pub fn is_postrelease(&self) -> bool {
        self.post.is_some()
    }

    /// The same version with any local label removed.
    pub fn without_local(&self) -> Self {
        Self {
            local: Vec::new(),
            ..self.clone()
        }
    }

    /// Release segments with trailing zeros dropped, for comparison.
    fn trimmed_release(&self) -> &[u64] {
        let mut end = self.release.len();
        while end > 1 && self.release[end - 1] == 0 {
            end -= 1;
        }
        &self.release[..end]
    }

    /// Position in the `dev < pre < final < post` sequence for the
    /// part after the release segments.
    fn pre_key(&self) -> (u8, Option<(PreKind, u64)>) {
        match (self.pre, self.post, self.dev) {
            // `1.0.dev1` sorts before `1.0a1`
            (None, None, Some(_)) => (0, None),
            (Some(pre), _, _) => (1, Some(pre)),
            (None, _, _) => (2, None),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.epoch != 0 {
            write!(f, "{}!", self.epoch)?;
        }
        let release: Vec<String> = self.release.iter().map(u64::to_string).collect();
        f.write_str(&release.join("."))?;
        if let Some((kind, n)) = self.pre {
            write!(f, "{}{n}", kind.as_str())?;
        }
        if let Some(post) = self.post {
            write!(f, ".post{post}")?;
        }
        if let Some(dev) = self.dev {
            write!(f, ".dev{dev}")?;
        }
        if !self.local.is_empty() {
            let local: Vec<String> = self.local.iter().map(ToString::to_string).collect();
            write!(f, "+{}", local.join("."))?;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s)
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| compare_release(self.trimmed_release(), other.trimmed_release()))
            .then_with(|| self.pre_key().cmp(&other.pre_key()))
            // no post release sorts before any post release
            .then_with(|| self.post.cmp(&other.post))
            // no dev release sorts after any dev release
            .then_with(|| match (self.dev, other.dev) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => a.cmp(&b),
            })
            .then_with(|| self.local.cmp(&other.local))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.epoch.hash(state);
        self.trimmed_release().hash(state);
        self.pre.hash(state);
        self.post.hash(state);
        self.dev.hash(state);
        self.local.hash(state);
    }
}

fn compare_release(a: &[u64], b: &[u64]) -> Ordering {
    let len = a.len().max(b.len());
    for i in 0..len {
        let ord = a.get(i).unwrap_or(&0).cmp(b.get(i).unwrap_or(&0));
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Cursor-based parser over the lowercased input.
struct Parser<'a> {
    input: &'a str,
    text: String,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            text: input.trim().to_ascii_lowercase(),
            pos: 0,
        }
    }

    fn error(&self, message: &str) -> ParseError {
        ParseError::new(message, self.input, self.pos)
    }

    fn rest(&self) -> &str {
        &self.text[self.pos..]
    }

    fn peek(&self) -> Option<u8> {
        self.text.as_bytes().get(self.pos).copied()
    }

    fn number(&mut self) -> Option<u64> {
        let digits = self
            .rest()
            .bytes()
            .take_while(|b| b.is_ascii_digit())
            .count();
        if digits == 0 {
            return None;
        }
        let value = self.rest()[..digits].parse().ok()?;
        self.pos += digits;
        Some(value)
    }

    fn separator(&mut self) -> bool {
        if matches!(self.peek(), Some(b'.' | b'-' | b'_')) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Try to consume one of `words` after an optional separator. Restores
    /// the position when nothing matches.
    fn keyword(&mut self, words: &[&str]) -> Option<usize> {
        let start = self.pos;
        self.separator();
        for (i, word) in words.iter().enumerate() {
            if self.rest().starts_with(word) {
                self.pos += word.len();
                return Some(i);
            }
        }
        self.pos = start;
        None
    }

    /// Optional number after an optional separator, defaulting to zero.
    fn implicit_number(&mut self) -> u64 {
        let start = self.pos;
        self.separator();
        match self.number() {
            Some(n) => n,
            None => {
                self.pos = start;
                0
            }
        }
    }

    fn parse(mut self) -> Result<Version, ParseError> {
        if self.text.is_empty() {
            return Err(self.error("empty version"));
        }
        if self.peek() == Some(b'v') {
            self.pos += 1;
        }

        let mut epoch = 0;
        let mut release = Vec::new();
        let first = self.number().ok_or_else(|| self.error("expected a number"))?;
        if self.peek() == Some(b'!') {
            self.pos += 1;
            epoch = first;
            release.push(self.number().ok_or_else(|| self.error("expected a number"))?);
        } else {
            release.push(first);
        }
        while self.peek() == Some(b'.')
            && self.text.as_bytes().get(self.pos + 1).is_some_and(u8::is_ascii_digit)
        {
            self.pos += 1;
            if let Some(n) = self.number() {
                release.push(n);
            }
        }

        let pre = self
            .keyword(&["alpha", "beta", "preview", "pre", "rc", "a", "b", "c"])
            .map(|i| {
                let kind = match i {
                    0 | 5 => PreKind::Alpha,
                    1 | 6 => PreKind::Beta,
                    _ => PreKind::Rc,
                };
                (kind, self.implicit_number())
            });

        let mut post = self
            .keyword(&["post", "rev", "r"])
            .map(|_| self.implicit_number());
        if post.is_none() && self.peek() == Some(b'-') {
            let start = self.pos;
            self.pos += 1;
            post = self.number();
            if post.is_none() {
                self.pos = start;
            }
        }

        let dev = self.keyword(&["dev"]).map(|_| self.implicit_number());

        let mut local = Vec::new();
        if self.peek() == Some(b'+') {
            self.pos += 1;
            for part in self.rest().split(['.', '-', '_']) {
                if part.is_empty() || !part.bytes().all(|b| b.is_ascii_alphanumeric()) {
                    return Err(self.error("invalid local version label"));
                }
                local.push(match part.parse::<u64>() {
                    Ok(n) => LocalSegment::Number(n),
                    Err(_) => LocalSegment::Text(part.to_string()),
                });
            }
            self.pos = self.text.len();
        }

        if self.pos != self.text.len() {
            return Err(self.error("unexpected trailing characters in version"));
        }

        Ok(Version {
            epoch,
            release,
            pre,
            post,
            dev,
            local,
        })
    }
}
