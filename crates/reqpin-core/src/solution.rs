//! Reading and writing solution files.
//!
//! Each line pins one package and records which packages asked for it:
//!
//! ```text
//! foo[test]==1.2.3  # [incomplete] bar (>=1.0), baz, requirements.in
//! ```

use std::collections::{BTreeSet, HashMap};

use miette::Diagnostic;
use thiserror::Error;

use crate::dist::{DistInfo, RepositoryId};
use crate::dists::{DistSource, DistributionGraph, NodeId};
use crate::error::{MergeError, ParseError};
use crate::merge::MergeCache;
use crate::name::{is_valid_name, PackageName};
use crate::requirement::Requirement;
use crate::specifier::Specifier;

/// Flag marking metadata that may be refined by a later resolution.
pub const INCOMPLETE_FLAG: &str = "incomplete";

const ROOT_SUFFIXES: &[&str] = &[".txt", ".in", ".out", ".cfg", ".toml", ".py"];

#[derive(Debug, Error, Diagnostic)]
pub enum SolutionError {
    #[error("line {line}: {source}")]
    #[diagnostic(code(reqpin::solution::parse))]
    Parse {
        line: usize,
        #[source]
        source: ParseError,
    },

    #[error("line {line} has no source annotation: `{text}`")]
    #[diagnostic(
        code(reqpin::solution::unannotated),
        help("solution files must record why each package is included; recompile against an index to add annotations")
    )]
    Unannotated { line: usize, text: String },

    #[error("line {line}: `{requirement}` is not pinned to a single version")]
    #[diagnostic(code(reqpin::solution::not_pinned))]
    NotPinned { line: usize, requirement: String },

    #[error("line {line}: {name} is pinned to {version}, which does not satisfy `{constraint}` from {dependent}")]
    #[diagnostic(code(reqpin::solution::inconsistent))]
    Inconsistent {
        line: usize,
        name: String,
        version: String,
        constraint: String,
        dependent: String,
    },

    #[error("line {line}: {name} is already pinned on line {first}")]
    #[diagnostic(code(reqpin::solution::duplicate))]
    Duplicate {
        line: usize,
        first: usize,
        name: String,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Merge(#[from] MergeError),
}

/// Who asked for a package on a solution line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRef {
    /// Another package (optionally one of its extras) and the constraint
    /// it declared.
    Package {
        requirement: Requirement,
        constraint: Specifier,
    },
    /// A requirements file or other top-level input, e.g. `-`.
    Root { name: String, constraint: Specifier },
}

/// One parsed, non-blank solution line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolutionLine {
    pub requirement: Requirement,
    /// Bracketed flags; unknown ones are kept but have no effect.
    pub flags: Vec<String>,
    pub sources: Vec<SourceRef>,
}

impl SolutionLine {
    pub fn is_incomplete(&self) -> bool {
        self.flags.iter().any(|f| f == INCOMPLETE_FLAG)
    }
}

/// Parse one line; `Ok(None)` for blank and comment-only lines.
pub fn parse_solution_line(line: &str, lineno: usize) -> Result<Option<SolutionLine>, SolutionError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    let unannotated = || SolutionError::Unannotated {
        line: lineno,
        text: trimmed.to_string(),
    };
    let (req_part, annotation) = trimmed.rsplit_once('#').ok_or_else(unannotated)?;
    let requirement = Requirement::parse(req_part.trim()).map_err(|source| SolutionError::Parse {
        line: lineno,
        source,
    })?;

    let mut annotation = annotation.trim();
    let mut flags = Vec::new();
    if let Some(rest) = annotation.strip_prefix('[') {
        if let Some((inner, after)) = rest.split_once(']') {
            flags = inner
                .split(',')
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .map(String::from)
                .collect();
            annotation = after.trim();
        }
    }
    if annotation.is_empty() {
        return Err(unannotated());
    }

    let sources = annotation
        .split(", ")
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| parse_source(entry, lineno))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(SolutionLine {
        requirement,
        flags,
        sources,
    }))
}

fn parse_source(entry: &str, lineno: usize) -> Result<SourceRef, SolutionError> {
    let (name, constraint) = match entry.split_once(" (") {
        Some((name, rest)) => (name.trim(), rest.trim_end().trim_end_matches(')')),
        None => (entry, ""),
    };
    let parse_err = |source| SolutionError::Parse {
        line: lineno,
        source,
    };
    if !is_package_reference(name) {
        return Ok(SourceRef::Root {
            name: name.to_string(),
            constraint: Specifier::parse(constraint).map_err(parse_err)?,
        });
    }
    Ok(SourceRef::Package {
        requirement: Requirement::parse(name).map_err(parse_err)?,
        constraint: Specifier::parse(constraint).map_err(parse_err)?,
    })
}

/// `name` or `name[extra]`, and not something that looks like a file.
fn is_package_reference(entry: &str) -> bool {
    if entry == "-" || entry.contains('/') || entry.contains('\\') {
        return false;
    }
    if ROOT_SUFFIXES.iter().any(|suffix| entry.ends_with(suffix)) {
        return false;
    }
    let base = match entry.split_once('[') {
        Some((base, extra)) => {
            if !extra.strip_suffix(']').is_some_and(is_valid_name) {
                return false;
            }
            base
        }
        None => entry,
    };
    is_valid_name(base)
}

/// Build a finalized graph from solution text.
pub fn load_solution(
    text: &str,
    origin: Option<&RepositoryId>,
    cache: &mut MergeCache,
) -> Result<DistributionGraph, SolutionError> {
    let mut graph = DistributionGraph::default();
    let mut pinned: HashMap<PackageName, usize> = HashMap::new();
    for (idx, line) in text.lines().enumerate() {
        let lineno = idx + 1;
        let Some(parsed) = parse_solution_line(line, lineno)? else {
            continue;
        };
        let name = cache.names().normalize(&parsed.requirement.name);
        if let Some(&first) = pinned.get(&name) {
            return Err(SolutionError::Duplicate {
                line: lineno,
                first,
                name: parsed.requirement.name,
            });
        }
        pinned.insert(name, lineno);
        add_line(&mut graph, parsed, lineno, origin, cache)?;
    }
    graph.finalize();
    tracing::debug!("loaded solution with {} nodes", graph.len());
    Ok(graph)
}

fn add_line(
    graph: &mut DistributionGraph,
    line: SolutionLine,
    lineno: usize,
    origin: Option<&RepositoryId>,
    cache: &mut MergeCache,
) -> Result<(), SolutionError> {
    let incomplete = line.is_incomplete();
    let req = line.requirement;
    let version = req
        .pinned_version()
        .cloned()
        .ok_or_else(|| SolutionError::NotPinned {
            line: lineno,
            requirement: req.to_string(),
        })?;

    let mut metadata = DistInfo::new(req.name.clone(), version.clone(), Vec::new());
    if let Some(origin) = origin {
        metadata = metadata.with_origin(origin.clone());
    }
    let reason = Requirement {
        specifier: Specifier::new(),
        marker: None,
        ..req.clone()
    };
    let id = graph.add_dist(DistSource::Metadata(metadata), None, Some(reason), cache)?;
    let base = graph.base_of(id);
    graph.node_mut(base).marker = req.marker.clone();
    if incomplete {
        graph.node_mut(base).complete = false;
    }

    for source in line.sources {
        let (dependent, constraint): (NodeId, Specifier) = match source {
            SourceRef::Package {
                requirement,
                constraint,
            } => {
                let name = requirement.name.clone();
                let id = graph.add_dist(DistSource::Name(name), None, Some(requirement), cache)?;
                (id, constraint)
            }
            SourceRef::Root { name, constraint } => {
                let root = DistInfo::root(name, Vec::new());
                let id = graph.add_dist(DistSource::Metadata(root), None, None, cache)?;
                (id, constraint)
            }
        };

        if !constraint.contains(&version, true) {
            return Err(SolutionError::Inconsistent {
                line: lineno,
                name: req.name.clone(),
                version: version.to_string(),
                constraint: constraint.to_string(),
                dependent: graph.node(dependent).source_name(),
            });
        }

        let edge = Requirement {
            name: req.name.clone(),
            extras: req.extras.clone(),
            specifier: constraint,
            marker: None,
        };
        graph.add_dist(DistSource::Name(req.name.clone()), Some(dependent), Some(edge), cache)?;
    }
    Ok(())
}

/// Render every resolved, non-synthetic package, ordered by normalized
/// name, with its sources deduplicated and sorted.
pub fn render_solution(graph: &DistributionGraph) -> String {
    let mut bases: Vec<NodeId> = graph
        .nodes()
        .filter(|(_, node)| node.key.extra.is_none() && node.is_resolved() && !node.is_meta())
        .map(|(idx, _)| idx)
        .collect();
    bases.sort_by(|a, b| graph.node(*a).key.name.cmp(&graph.node(*b).key.name));

    let mut output = String::new();
    for base in bases {
        output.push_str(&render_line(graph, base));
        output.push('\n');
    }
    output
}

fn render_line(graph: &DistributionGraph, base: NodeId) -> String {
    let node = graph.node(base);
    let variants = graph.variants_of(base);

    let mut sources = BTreeSet::new();
    for id in std::iter::once(base).chain(variants.iter().copied()) {
        let target = &graph.node(id).key.name;
        for (dep, req) in graph.dependents_of(id) {
            let dependent = graph.node(dep);
            if &dependent.key.name == target {
                continue;
            }
            let mut entry = dependent.source_name();
            if !req.specifier.is_empty() {
                entry.push_str(&format!(" ({})", req.specifier));
            }
            sources.insert(entry);
        }
    }

    let extras: Vec<String> = variants
        .iter()
        .filter_map(|&v| graph.node(v).key.extra.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let (name, version) = match &node.metadata {
        Some(meta) => (meta.name.as_str(), meta.version.to_string()),
        None => (node.req_name.as_str(), String::new()),
    };

    let mut line = name.to_string();
    if !extras.is_empty() {
        line.push_str(&format!("[{}]", extras.join(",")));
    }
    line.push_str(&format!("=={version}"));
    if let Some(marker) = &node.marker {
        line.push_str(&format!("; {marker}"));
    }
    line.push_str("  #");
    if !node.complete {
        line.push_str(&format!(" [{INCOMPLETE_FLAG}]"));
    }
    if !sources.is_empty() {
        let sources: Vec<String> = sources.into_iter().collect();
        line.push(' ');
        line.push_str(&sources.join(", "));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags_and_sources() {
        let line = parse_solution_line("foo[x]==1.0  # [incomplete, shiny] bar[y] (>=1.0), -", 1)
            .unwrap()
            .unwrap();
        assert_eq!(line.requirement.to_string(), "foo[x]==1.0");
        assert!(line.is_incomplete());
        assert_eq!(line.flags, vec!["incomplete", "shiny"]);
        assert_eq!(line.sources.len(), 2);
        match &line.sources[0] {
            SourceRef::Package {
                requirement,
                constraint,
            } => {
                assert_eq!(requirement.to_string(), "bar[y]");
                assert_eq!(constraint.to_string(), ">=1.0");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            line.sources[1],
            SourceRef::Root {
                name: "-".to_string(),
                constraint: Specifier::new(),
            }
        );
    }

    #[test]
    fn skips_blank_and_comment_lines() {
        assert!(parse_solution_line("", 1).unwrap().is_none());
        assert!(parse_solution_line("   # generated", 1).unwrap().is_none());
    }

    #[test]
    fn rejects_unannotated() {
        for text in ["foo==1.0", "foo==1.0  #", "foo==1.0  # [incomplete]"] {
            assert!(
                matches!(
                    parse_solution_line(text, 3),
                    Err(SolutionError::Unannotated { line: 3, .. })
                ),
                "{text}"
            );
        }
    }

    #[test]
    fn file_like_entries_are_roots() {
        assert!(!is_package_reference("requirements.in"));
        assert!(!is_package_reference("reqs/base.txt"));
        assert!(!is_package_reference("-"));
        assert!(is_package_reference("zope.interface"));
        assert!(is_package_reference("bar[test]"));
    }
}
