//! The resolution loop.
//!
//! Greedy and non-backtracking: the first open node (in insertion order) is
//! resolved against the repositories in registration order, taking the
//! first candidate that satisfies its merged constraint. A later
//! requirement that excludes a chosen version invalidates that choice and
//! the node is resolved again, at most `max_invalidations` times.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use miette::Diagnostic;
use thiserror::Error;

use reqpin_core::solution::render_solution;
use reqpin_core::{
    DistInfo, DistSource, DistributionGraph, MarkerEnvironment, MergeCache, MergeError, NodeId,
    PackageName, Requirement,
};
use reqpin_repos::source::SOURCE_KIND;
use reqpin_repos::{MultiRepository, Repository};

use crate::conflict::{Contribution, Rejection, ResolutionConflict};

#[derive(Debug, Error, Diagnostic)]
pub enum ResolveError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Conflict(ResolutionConflict),

    #[error("{package} was invalidated {count} times; giving up")]
    #[diagnostic(
        code(reqpin::resolve::invalidation_limit),
        help("the requirements on {package} keep changing as other packages resolve; pin it explicitly")
    )]
    InvalidationLimit { package: String, count: usize },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Merge(#[from] MergeError),
}

/// Requirements that limit versions without adding packages, named after
/// the input they came from.
#[derive(Debug, Clone)]
pub struct ConstraintSet {
    pub name: String,
    pub requirements: Vec<Requirement>,
}

impl ConstraintSet {
    pub fn new(name: impl Into<String>, requirements: Vec<Requirement>) -> Self {
        Self {
            name: name.into(),
            requirements,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolverOptions {
    /// How often one package may be invalidated before resolution fails.
    pub max_invalidations: usize,
    pub allow_prereleases: bool,
    /// Applied when choosing a version. Once resolved, each set is recorded
    /// as a dependent of the packages it constrained.
    pub constraints: Vec<ConstraintSet>,
    /// Extras requested for every project taken from a source tree.
    pub source_extras: Vec<String>,
    pub environment: MarkerEnvironment,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            max_invalidations: 3,
            allow_prereleases: false,
            constraints: Vec::new(),
            source_extras: Vec::new(),
            environment: MarkerEnvironment::default(),
        }
    }
}

/// A complete resolution.
pub struct Resolution {
    pub graph: DistributionGraph,
    /// The synthetic root nodes, one per input.
    pub roots: Vec<NodeId>,
}

impl Resolution {
    /// Solution file text for this resolution.
    pub fn to_solution(&self) -> String {
        render_solution(&self.graph)
    }

    /// `name[extras]==version` for every resolved package, ordered by
    /// normalized name.
    pub fn pinned(&self) -> Vec<Requirement> {
        let mut bases: Vec<(NodeId, &PackageName)> = self
            .graph
            .nodes()
            .filter(|(_, node)| node.key.extra.is_none() && node.is_resolved() && !node.is_meta())
            .map(|(id, node)| (id, &node.key.name))
            .collect();
        bases.sort_by(|a, b| a.1.cmp(b.1));

        bases
            .into_iter()
            .filter_map(|(id, _)| {
                let dist = self.graph.node(id).metadata.as_ref()?;
                let extras: BTreeSet<String> = self
                    .graph
                    .variants_of(id)
                    .into_iter()
                    .filter_map(|v| self.graph.node(v).key.extra.clone())
                    .collect();
                Some(dist.pin().with_extras(extras))
            })
            .collect()
    }

    /// Reverse-dependency tree for one package, empty if it is not part of
    /// the resolution.
    pub fn why(&self, name: &str) -> String {
        self.graph.print_inverted_tree(name)
    }
}

/// Drives a resolution over a set of repositories.
///
/// The repositories are closed when the resolver is finished or dropped,
/// whether or not resolution succeeded.
pub struct Resolver {
    repos: MultiRepository,
    options: ResolverOptions,
    cache: MergeCache,
    constraints: IndexMap<PackageName, Requirement>,
}

enum Selection {
    Found { dist: DistInfo, complete: bool },
    Missing { rejected: Vec<Rejection>, available: Vec<String> },
}

impl Resolver {
    pub fn new(repos: MultiRepository, options: ResolverOptions) -> Self {
        Self {
            repos,
            options,
            cache: MergeCache::new(),
            constraints: IndexMap::new(),
        }
    }

    pub fn repositories(&self) -> &MultiRepository {
        &self.repos
    }

    /// Resolve the requirements of every root. Roots are usually synthetic
    /// distributions built from requirements files.
    pub fn resolve(&mut self, roots: Vec<DistInfo>) -> Result<Resolution, ResolveError> {
        self.collect_constraints()?;

        let mut graph = DistributionGraph::new(self.options.environment.clone());
        let mut root_ids = Vec::new();
        for root in roots {
            tracing::debug!("adding root {root}");
            let id = graph.add_dist(DistSource::Metadata(root), None, None, &mut self.cache)?;
            root_ids.push(id);
        }

        while let Some(id) = graph.open_nodes().into_iter().next() {
            self.resolve_node(&mut graph, id)?;
        }
        self.record_constraints(&mut graph)?;

        tracing::info!("resolved {} nodes", graph.len());
        Ok(Resolution {
            graph,
            roots: root_ids,
        })
    }

    /// Close every repository now instead of on drop.
    pub fn finish(mut self) {
        self.repos.close();
    }

    fn collect_constraints(&mut self) -> Result<(), ResolveError> {
        self.constraints.clear();
        let all = self.options.constraints.iter().flat_map(|set| &set.requirements);
        for constraint in all {
            if !constraint.is_active(&self.options.environment, &[]) {
                tracing::debug!("constraint `{constraint}` does not apply here");
                continue;
            }
            let key = constraint.key();
            let merged = self
                .cache
                .merge_opt(self.constraints.get(&key), Some(&constraint.without_extras()))?;
            if let Some(merged) = merged {
                self.constraints.insert(key, merged);
            }
        }
        Ok(())
    }

    /// Connect every constraint set to the resolved packages it applies
    /// to, so it shows up in their provenance.
    fn record_constraints(&mut self, graph: &mut DistributionGraph) -> Result<(), ResolveError> {
        for set in &self.options.constraints {
            let applicable: Vec<Requirement> = set
                .requirements
                .iter()
                .filter(|req| req.is_active(&self.options.environment, &[]))
                .filter(|req| {
                    graph
                        .get(&req.name, None)
                        .is_some_and(|id| graph.node(id).is_resolved() && !graph.node(id).is_meta())
                })
                .map(Requirement::without_extras)
                .collect();
            if applicable.is_empty() {
                continue;
            }

            let anchor = match graph.get(&set.name, None) {
                Some(id) if graph.node(id).is_meta() => id,
                _ => graph.add_dist(
                    DistSource::Metadata(DistInfo::root(set.name.clone(), Vec::new())),
                    None,
                    None,
                    &mut self.cache,
                )?,
            };
            for req in applicable {
                tracing::debug!("{} constrains `{req}`", set.name);
                let name = req.name.clone();
                graph.add_dist(DistSource::Name(name), Some(anchor), Some(req), &mut self.cache)?;
            }
        }
        Ok(())
    }

    fn resolve_node(&mut self, graph: &mut DistributionGraph, id: NodeId) -> Result<(), ResolveError> {
        let name = graph.node(id).key.name.clone();
        let count = graph.invalidations(&name);
        if count > self.options.max_invalidations {
            return Err(ResolveError::InvalidationLimit {
                package: graph.node(id).req_name.clone(),
                count,
            });
        }

        let mut constraint = graph.build_constraints(id, &mut self.cache)?;
        if let Some(user) = self.constraints.get(&name) {
            constraint = self.cache.merge(&constraint, user)?;
        }
        tracing::debug!("resolving {} for `{constraint}`", graph.node(id).key);

        match select(&mut self.repos, &constraint, self.options.allow_prereleases) {
            Selection::Found { dist, complete } => {
                tracing::info!("selected {dist}");
                let (dependent, mut reason) = match graph.dependents_of(id).first() {
                    Some((dependent, req)) => (Some(*dependent), (*req).clone()),
                    None => (None, Requirement::new(dist.name.clone())),
                };
                if dependent.is_some() && !self.options.source_extras.is_empty() && is_from_source(&dist) {
                    let extras: Vec<String> = reason
                        .extras
                        .iter()
                        .chain(&self.options.source_extras)
                        .cloned()
                        .collect();
                    reason = reason.with_extras(extras);
                }
                graph.add_dist(DistSource::Metadata(dist), dependent, Some(reason), &mut self.cache)?;
                if graph.contains(id) {
                    graph.node_mut(id).complete = complete;
                }
                Ok(())
            }
            Selection::Missing { rejected, available } => Err(ResolveError::Conflict(
                self.conflict(graph, id, constraint, rejected, available),
            )),
        }
    }

    fn conflict(
        &self,
        graph: &DistributionGraph,
        id: NodeId,
        constraint: Requirement,
        rejected: Vec<Rejection>,
        available: Vec<String>,
    ) -> ResolutionConflict {
        let node = graph.node(id);
        let mut conflict = ResolutionConflict::new(node.req_name.clone(), constraint);

        let mut sources = vec![id];
        sources.extend(graph.variants_of(id));
        for target in sources {
            for (dependent, req) in graph.dependents_of(target) {
                if graph.node(dependent).key.name == node.key.name {
                    continue;
                }
                let chain = graph
                    .reverse_chain(dependent)
                    .into_iter()
                    .map(|n| graph.node(n).to_string())
                    .collect();
                conflict.contributions.push(Contribution {
                    requirement: req.clone(),
                    chain,
                });
            }
        }
        for set in &self.options.constraints {
            for req in &set.requirements {
                if req.key() == node.key.name && req.is_active(&self.options.environment, &[]) {
                    conflict.contributions.push(Contribution {
                        requirement: req.without_extras(),
                        chain: vec![set.name.clone()],
                    });
                }
            }
        }
        conflict.rejected = rejected;
        conflict.available = available;
        conflict
    }
}

impl Drop for Resolver {
    fn drop(&mut self) {
        self.repos.close();
    }
}

fn is_from_source(dist: &DistInfo) -> bool {
    dist.origin
        .as_ref()
        .is_some_and(|origin| origin.kind() == SOURCE_KIND)
}

/// Walk the repositories in order and materialize the first satisfying
/// candidate. Incomplete metadata is kept as a fallback in case no
/// candidate with complete metadata turns up.
fn select(repos: &mut MultiRepository, constraint: &Requirement, allow_prereleases: bool) -> Selection {
    let mut rejected = Vec::new();
    let mut available = Vec::new();
    let mut fallback = None;

    for repo in repos.members_mut() {
        let allow_pre = allow_prereleases || repo.allows_prereleases();
        let candidates = match repo.get_candidates(Some(constraint)) {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::warn!("{}: {e}", repo.identity());
                rejected.push(Rejection {
                    candidate: repo.identity().to_string(),
                    reason: e.to_string(),
                });
                continue;
            }
        };

        for candidate in candidates {
            if !candidate.satisfies(constraint, allow_pre) {
                let version = candidate.version.to_string();
                if !available.contains(&version) {
                    available.push(version);
                }
                continue;
            }
            match repo.resolve_candidate(&candidate) {
                Ok((dist, true)) => return Selection::Found { dist, complete: true },
                Ok((dist, false)) => {
                    tracing::debug!("{candidate} has incomplete metadata, looking further");
                    fallback.get_or_insert(dist);
                }
                Err(e) => {
                    tracing::debug!("rejected {candidate}: {e}");
                    rejected.push(Rejection {
                        candidate: candidate.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }
    }

    match fallback {
        Some(dist) => Selection::Found { dist, complete: false },
        None => Selection::Missing { rejected, available },
    }
}
