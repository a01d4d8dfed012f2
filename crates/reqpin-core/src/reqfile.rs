//! Requirements files (`requirements.in` and friends).
//!
//! One requirement per line. `-r`/`--requirement` includes another file
//! and `-c`/`--constraint` pulls in constraints, both relative to the
//! including file. Other option lines and `#` comments are skipped.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use miette::Diagnostic;
use thiserror::Error;

use reqpin_util::fs::relative_to_file;

use crate::dist::DistInfo;
use crate::error::{MergeError, ParseError};
use crate::merge::MergeCache;
use crate::name::PackageName;
use crate::requirement::Requirement;

#[derive(Debug, Error, Diagnostic)]
pub enum ReqfileError {
    #[error("failed to read {}", path.display())]
    #[diagnostic(code(reqpin::reqfile::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}:{line}: {source}", path.display())]
    #[diagnostic(code(reqpin::reqfile::parse))]
    Parse {
        path: PathBuf,
        line: usize,
        #[source]
        source: ParseError,
    },

    #[error("{} includes itself", path.display())]
    #[diagnostic(code(reqpin::reqfile::cycle))]
    IncludeCycle { path: PathBuf },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Merge(#[from] MergeError),
}

/// The requirements and constraints read from one input file, with
/// includes expanded.
#[derive(Debug, Clone)]
pub struct RequirementsFile {
    pub path: PathBuf,
    pub requirements: Vec<Requirement>,
    pub constraints: Vec<Requirement>,
}

enum Directive<'a> {
    Include(&'a str),
    Constraint(&'a str),
    Requirement(&'a str),
    Skip,
}

impl RequirementsFile {
    pub fn load(path: &Path) -> Result<Self, ReqfileError> {
        let mut cache = MergeCache::new();
        let mut reader = Reader {
            cache: &mut cache,
            stack: HashSet::new(),
            requirements: IndexMap::new(),
            constraints: IndexMap::new(),
        };
        reader.read(path, false)?;
        Ok(Self {
            path: path.to_path_buf(),
            requirements: reader.requirements.into_values().collect(),
            constraints: reader.constraints.into_values().collect(),
        })
    }

    /// Parse requirements given directly as text (e.g. stdin). Includes
    /// resolve relative to `path`.
    pub fn parse(text: &str, path: &Path) -> Result<Self, ReqfileError> {
        let mut cache = MergeCache::new();
        let mut reader = Reader {
            cache: &mut cache,
            stack: HashSet::new(),
            requirements: IndexMap::new(),
            constraints: IndexMap::new(),
        };
        reader.read_text(text, path, false)?;
        Ok(Self {
            path: path.to_path_buf(),
            requirements: reader.requirements.into_values().collect(),
            constraints: reader.constraints.into_values().collect(),
        })
    }

    /// Display name used as the root of a resolution.
    pub fn name(&self) -> String {
        self.path.display().to_string()
    }

    /// A synthetic root distribution carrying this file's requirements.
    pub fn to_dist(&self) -> DistInfo {
        DistInfo::root(self.name(), self.requirements.clone())
    }
}

struct Reader<'c> {
    cache: &'c mut MergeCache,
    stack: HashSet<PathBuf>,
    requirements: IndexMap<PackageName, Requirement>,
    constraints: IndexMap<PackageName, Requirement>,
}

impl Reader<'_> {
    fn read(&mut self, path: &Path, as_constraints: bool) -> Result<(), ReqfileError> {
        let text = std::fs::read_to_string(path).map_err(|source| ReqfileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.read_text(&text, path, as_constraints)
    }

    fn read_text(&mut self, text: &str, path: &Path, as_constraints: bool) -> Result<(), ReqfileError> {
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        if !self.stack.insert(canonical.clone()) {
            return Err(ReqfileError::IncludeCycle {
                path: path.to_path_buf(),
            });
        }
        tracing::debug!("reading requirements from {}", path.display());

        for (idx, raw) in text.lines().enumerate() {
            match classify(raw) {
                Directive::Include(target) => {
                    self.read(&relative_to_file(path, target), as_constraints)?;
                }
                Directive::Constraint(target) => {
                    self.read(&relative_to_file(path, target), true)?;
                }
                Directive::Requirement(text) => {
                    let req = Requirement::parse(text).map_err(|source| ReqfileError::Parse {
                        path: path.to_path_buf(),
                        line: idx + 1,
                        source,
                    })?;
                    let key = self.cache.names().normalize(&req.name);
                    let target = if as_constraints {
                        &mut self.constraints
                    } else {
                        &mut self.requirements
                    };
                    let merged = self.cache.merge_opt(target.get(&key), Some(&req))?;
                    if let Some(merged) = merged {
                        target.insert(key, merged);
                    }
                }
                Directive::Skip => {}
            }
        }

        self.stack.remove(&canonical);
        Ok(())
    }
}

fn classify(raw: &str) -> Directive<'_> {
    let line = strip_comment(raw).trim();
    if line.is_empty() {
        return Directive::Skip;
    }
    if let Some(target) = option_value(line, &["-r", "--requirement"]) {
        return Directive::Include(target);
    }
    if let Some(target) = option_value(line, &["-c", "--constraint"]) {
        return Directive::Constraint(target);
    }
    if line.starts_with('-') {
        tracing::debug!("ignoring option line `{line}`");
        return Directive::Skip;
    }
    Directive::Requirement(line)
}

/// Drop a whole-line `#` comment or a trailing ` #` comment.
fn strip_comment(line: &str) -> &str {
    if line.trim_start().starts_with('#') {
        return "";
    }
    match line.find(" #").or_else(|| line.find("\t#")) {
        Some(idx) => &line[..idx],
        None => line,
    }
}

/// Value of `-x value`, `-xvalue`, `--long value` or `--long=value`.
fn option_value<'a>(line: &'a str, names: &[&str]) -> Option<&'a str> {
    for name in names {
        let Some(rest) = line.strip_prefix(name) else {
            continue;
        };
        let value = if name.starts_with("--") {
            match rest.strip_prefix('=') {
                Some(value) => value,
                None if rest.starts_with(char::is_whitespace) => rest,
                None => continue,
            }
        } else {
            rest
        };
        let value = value.trim();
        if !value.is_empty() {
            return Some(value);
        }
    }
    None
}
