//! The distribution graph built up while resolving.
//!
//! Nodes are `(package, extra)` pairs; edges point from a dependent to its
//! dependency and carry the requirement that justifies them. An extra
//! variant `foo[x]` always depends on its base node `foo`, and shares the
//! base node's metadata.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

use indexmap::IndexMap;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::{Dfs, EdgeRef};
use petgraph::Direction;

use crate::dist::DistInfo;
use crate::error::MergeError;
use crate::marker::{MarkerEnvironment, MarkerTree};
use crate::merge::MergeCache;
use crate::name::PackageName;
use crate::requirement::Requirement;

pub type NodeId = NodeIndex;

/// Identity of a node: normalized package name plus optional extra.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey {
    pub name: PackageName,
    pub extra: Option<String>,
}

impl NodeKey {
    pub fn new(name: PackageName, extra: Option<String>) -> Self {
        Self { name, extra }
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.extra {
            Some(extra) => write!(f, "{}[{extra}]", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// A package (or one of its extras) in the graph.
#[derive(Debug, Clone)]
pub struct Node {
    pub key: NodeKey,
    /// Package name as first written.
    pub req_name: String,
    pub metadata: Option<DistInfo>,
    /// False when the metadata came from a source that may have guessed.
    pub complete: bool,
    /// Marker the pin was recorded under, kept so a loaded solution
    /// renders the same requirement it was read from.
    pub marker: Option<MarkerTree>,
}

impl Node {
    pub fn is_resolved(&self) -> bool {
        self.metadata.is_some()
    }

    pub fn is_meta(&self) -> bool {
        self.metadata.as_ref().is_some_and(|m| m.meta)
    }

    /// Display name used in provenance lists: the metadata spelling with
    /// the extra appended.
    pub fn source_name(&self) -> String {
        let name = self
            .metadata
            .as_ref()
            .map(|m| m.name.as_str())
            .unwrap_or(&self.req_name);
        match &self.key.extra {
            Some(extra) => format!("{name}[{extra}]"),
            None => name.to_string(),
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.metadata {
            Some(meta) if meta.meta => f.write_str(&meta.name),
            Some(meta) => write!(f, "{}=={}", self.source_name(), meta.version),
            None => write!(f, "{} [UNSOLVED]", self.key),
        }
    }
}

/// What to add: full metadata, or only a name that creates a placeholder.
#[derive(Debug, Clone)]
pub enum DistSource {
    Metadata(DistInfo),
    Name(String),
}

impl DistSource {
    fn name(&self) -> &str {
        match self {
            DistSource::Metadata(info) => &info.name,
            DistSource::Name(name) => name,
        }
    }
}

/// Graph of packages and the requirements between them.
#[derive(Debug)]
pub struct DistributionGraph {
    graph: StableDiGraph<Node, Requirement>,
    /// Lookup from node identity to index, in insertion order.
    index: IndexMap<NodeKey, NodeIndex>,
    /// Nodes added without a dependent; everything else must be reachable
    /// from one of them.
    anchors: HashSet<NodeIndex>,
    invalidations: HashMap<NodeKey, usize>,
    /// Set when metadata was replaced and orphans may be left behind.
    needs_prune: bool,
    env: MarkerEnvironment,
}

impl DistributionGraph {
    pub fn new(env: MarkerEnvironment) -> Self {
        Self {
            graph: StableDiGraph::new(),
            index: IndexMap::new(),
            anchors: HashSet::new(),
            invalidations: HashMap::new(),
            needs_prune: false,
            env,
        }
    }

    pub fn environment(&self) -> &MarkerEnvironment {
        &self.env
    }

    /// Add a distribution or placeholder, optionally as a dependency of
    /// `dependent` justified by `reason`.
    ///
    /// Returns the node `reason` addresses (the base node when `reason`
    /// names several extras). If the addition invalidated a resolved node,
    /// nodes orphaned by that are pruned before returning, which may
    /// include the returned node.
    pub fn add_dist(
        &mut self,
        source: DistSource,
        dependent: Option<NodeId>,
        reason: Option<Requirement>,
        cache: &mut MergeCache,
    ) -> Result<NodeId, MergeError> {
        let mut stale = Vec::new();
        let id = self.insert(source, dependent, reason, cache, &mut stale)?;
        for node in stale {
            if self.graph.contains_node(node) && self.graph[node].is_resolved() {
                self.invalidate(node);
            }
        }
        if std::mem::take(&mut self.needs_prune) {
            self.prune();
        }
        Ok(id)
    }

    fn insert(
        &mut self,
        source: DistSource,
        dependent: Option<NodeId>,
        reason: Option<Requirement>,
        cache: &mut MergeCache,
        stale: &mut Vec<NodeId>,
    ) -> Result<NodeId, MergeError> {
        if let Some(reason) = reason.as_ref().filter(|r| r.extras.len() > 1) {
            let mut last = None;
            for extra in &reason.extras {
                let single = reason.clone().with_extras([extra]);
                last = Some(self.insert(source.clone(), dependent, Some(single), cache, stale)?);
            }
            if let Some(id) = last {
                return Ok(self.base_of(id));
            }
        }

        let req_name = source.name().to_string();
        let extra = reason.as_ref().and_then(|r| r.extras.iter().next().cloned());
        let key = NodeKey::new(cache.names().normalize(&req_name), extra.clone());
        let node = self.get_or_create(key, &req_name);
        if dependent.is_none() {
            self.anchors.insert(node);
        }

        let base = if extra.is_some() {
            self.add_base(node, reason.as_ref(), &req_name, cache, stale)?
        } else {
            node
        };

        match source {
            DistSource::Metadata(metadata) => {
                let replaced = self.graph[base]
                    .metadata
                    .as_ref()
                    .filter(|old| !old.meta && old.version != metadata.version)
                    .map(|old| old.version.clone());
                if let Some(old) = replaced {
                    tracing::warn!(
                        "replacing {}=={old} with version {}",
                        self.graph[base].source_name(),
                        metadata.version
                    );
                    self.discard(base);
                    self.needs_prune = true;
                }
                for variant in self.variants_of(base) {
                    self.attach(variant, metadata.clone(), cache, stale)?;
                }
                self.attach(base, metadata, cache, stale)?;
            }
            DistSource::Name(_) => {
                if node != base && !self.graph[node].is_resolved() {
                    if let Some(metadata) = self.graph[base].metadata.clone() {
                        self.attach(node, metadata, cache, stale)?;
                    }
                }
            }
        }

        if let (Some(metadata), Some(reason)) = (&self.graph[base].metadata, &reason) {
            if !metadata.meta && !reason.specifier.contains(&metadata.version, true) {
                tracing::warn!(
                    "{} no longer satisfies `{reason}`, discarding its metadata",
                    self.graph[base]
                );
                stale.push(base);
            }
        }

        if let Some(dependent) = dependent {
            let requirement = reason.unwrap_or_else(|| {
                Requirement::new(req_name.clone()).with_extras(extra.iter())
            });
            self.connect(dependent, node, requirement, cache)?;
        }

        Ok(node)
    }

    fn add_base(
        &mut self,
        variant: NodeId,
        reason: Option<&Requirement>,
        req_name: &str,
        cache: &mut MergeCache,
        stale: &mut Vec<NodeId>,
    ) -> Result<NodeId, MergeError> {
        let base_reason = match reason {
            Some(reason) => reason.without_extras(),
            None => Requirement::new(req_name),
        };
        self.insert(
            DistSource::Name(req_name.to_string()),
            Some(variant),
            Some(base_reason),
            cache,
            stale,
        )
    }

    fn attach(
        &mut self,
        id: NodeId,
        metadata: DistInfo,
        cache: &mut MergeCache,
        stale: &mut Vec<NodeId>,
    ) -> Result<(), MergeError> {
        let extra = self.graph[id].key.extra.clone();
        let requirements = metadata.requires(extra.as_deref(), &self.env);
        tracing::debug!("attaching {metadata} to {}", self.graph[id].key);
        let node = &mut self.graph[id];
        node.metadata = Some(metadata);
        node.complete = true;
        for req in requirements {
            self.insert(
                DistSource::Name(req.name.clone()),
                Some(id),
                Some(req),
                cache,
                stale,
            )?;
        }
        Ok(())
    }

    fn connect(
        &mut self,
        from: NodeId,
        to: NodeId,
        requirement: Requirement,
        cache: &mut MergeCache,
    ) -> Result<(), MergeError> {
        match self.graph.find_edge(from, to) {
            Some(edge) => {
                let merged = cache.merge(&self.graph[edge], &requirement)?;
                self.graph[edge] = merged;
            }
            None => {
                self.graph.add_edge(from, to, requirement);
            }
        }
        Ok(())
    }

    fn get_or_create(&mut self, key: NodeKey, req_name: &str) -> NodeId {
        if let Some(&idx) = self.index.get(&key) {
            return idx;
        }
        let idx = self.graph.add_node(Node {
            key: key.clone(),
            req_name: req_name.to_string(),
            metadata: None,
            complete: true,
            marker: None,
        });
        self.index.insert(key, idx);
        idx
    }

    /// The node without an extra for the same package.
    pub fn base_of(&self, id: NodeId) -> NodeId {
        let key = &self.graph[id].key;
        if key.extra.is_none() {
            return id;
        }
        self.index
            .get(&NodeKey::new(key.name.clone(), None))
            .copied()
            .unwrap_or(id)
    }

    /// Extra variants of a base node, in insertion order.
    pub fn variants_of(&self, base: NodeId) -> Vec<NodeId> {
        let name = &self.graph[base].key.name;
        let mut variants: Vec<NodeId> = self
            .graph
            .edges_directed(base, Direction::Incoming)
            .map(|e| e.source())
            .filter(|&src| {
                let key = &self.graph[src].key;
                key.extra.is_some() && &key.name == name
            })
            .collect();
        self.sort_by_insertion(&mut variants);
        variants
    }

    fn is_variant_edge(&self, edge: EdgeIndex) -> bool {
        self.graph
            .edge_endpoints(edge)
            .is_some_and(|(from, to)| self.graph[from].key.name == self.graph[to].key.name)
    }

    /// Drop the metadata of a node, its base and all extra variants, along
    /// with the dependencies that metadata introduced, then prune whatever
    /// became unreachable.
    pub fn invalidate(&mut self, id: NodeId) {
        self.discard(id);
        self.prune();
    }

    /// The unpruned part of [`Self::invalidate`]. Counts as an invalidation.
    fn discard(&mut self, id: NodeId) {
        let base = self.base_of(id);
        let mut targets = vec![base];
        targets.extend(self.variants_of(base));

        for target in targets {
            let outgoing: Vec<EdgeIndex> = self
                .graph
                .edges_directed(target, Direction::Outgoing)
                .map(|e| e.id())
                .filter(|&e| !self.is_variant_edge(e))
                .collect();
            for edge in outgoing {
                self.graph.remove_edge(edge);
            }
            let node = &mut self.graph[target];
            node.metadata = None;
            node.complete = true;
        }

        let key = self.graph[base].key.clone();
        let count = self.invalidations.entry(key.clone()).or_insert(0);
        *count += 1;
        tracing::info!("invalidated {key} ({count} time(s))");
    }

    /// How many times the package's metadata has been invalidated.
    pub fn invalidations(&self, name: &PackageName) -> usize {
        self.invalidations
            .get(&NodeKey::new(name.clone(), None))
            .copied()
            .unwrap_or(0)
    }

    /// Remove every node that cannot be reached from an anchor.
    fn prune(&mut self) {
        let mut reachable = HashSet::new();
        let mut anchors: Vec<NodeIndex> = self.anchors.iter().copied().collect();
        self.sort_by_insertion(&mut anchors);
        if let Some(&first) = anchors.first() {
            let mut dfs = Dfs::new(&self.graph, first);
            for anchor in anchors {
                dfs.move_to(anchor);
                while let Some(nx) = dfs.next(&self.graph) {
                    reachable.insert(nx);
                }
            }
        }
        let orphans: Vec<NodeIndex> = self
            .index
            .values()
            .copied()
            .filter(|idx| !reachable.contains(idx))
            .collect();
        for orphan in orphans {
            tracing::debug!("pruning orphaned node {}", self.graph[orphan].key);
            self.remove_node(orphan);
        }
    }

    /// Remove a node and all of its edges.
    pub fn remove_node(&mut self, id: NodeId) -> Option<Node> {
        let node = self.graph.remove_node(id)?;
        self.index.shift_remove(&node.key);
        self.anchors.remove(&id);
        Some(node)
    }

    /// The effective constraint for a node: all incoming requirements
    /// merged, or the bare name (with its extra) when nothing points at it.
    pub fn build_constraints(
        &self,
        id: NodeId,
        cache: &mut MergeCache,
    ) -> Result<Requirement, MergeError> {
        let incoming: Vec<&Requirement> =
            self.dependents_of(id).into_iter().map(|(_, req)| req).collect();
        match cache.merge_all(incoming)? {
            Some(req) => Ok(req),
            None => {
                let node = &self.graph[id];
                Ok(Requirement::new(node.req_name.clone()).with_extras(node.key.extra.iter()))
            }
        }
    }

    /// Append each node's outgoing requirements to its metadata and drop
    /// every node that never received metadata.
    ///
    /// Requirements coming from an extra variant get `extra=="<extra>"`
    /// added to their marker. All nodes of a package end up sharing one
    /// requirement list.
    pub fn finalize(&mut self) {
        let mut collected: IndexMap<PackageName, Vec<Requirement>> = IndexMap::new();
        for &idx in self.index.values() {
            let node = &self.graph[idx];
            if !node.is_resolved() {
                continue;
            }
            let list = collected.entry(node.key.name.clone()).or_default();
            for (target, req) in self.dependencies_of(idx) {
                let target = &self.graph[target];
                if !target.is_resolved() || target.key.name == node.key.name {
                    continue;
                }
                let req = match &node.key.extra {
                    Some(extra) => req.clone().with_extra_marker(extra),
                    None => req.clone(),
                };
                if !list.contains(&req) {
                    list.push(req);
                }
            }
        }

        let unresolved: Vec<NodeIndex> = self
            .index
            .values()
            .copied()
            .filter(|&idx| !self.graph[idx].is_resolved())
            .collect();

        let ids: Vec<NodeIndex> = self.index.values().copied().collect();
        for idx in ids {
            let node = &mut self.graph[idx];
            if let (Some(metadata), Some(extra)) =
                (node.metadata.as_mut(), collected.get(&node.key.name))
            {
                for req in extra {
                    if !metadata.requirements.contains(req) {
                        metadata.requirements.push(req.clone());
                    }
                }
            }
        }

        for idx in unresolved {
            self.remove_node(idx);
        }
    }

    /// Look up a node by package name and extra.
    pub fn get(&self, name: &str, extra: Option<&str>) -> Option<NodeId> {
        let key = NodeKey::new(
            crate::name::normalize_name(name),
            extra.map(|e| crate::name::normalize_name(e).to_string()),
        );
        self.index.get(&key).copied()
    }

    /// Node data for an id. Panics if the node has been removed.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.graph[id]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.graph[id]
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.graph.contains_node(id)
    }

    /// All nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> + '_ {
        self.index.values().map(move |&idx| (idx, &self.graph[idx]))
    }

    /// Base nodes still waiting for metadata, in insertion order. Extra
    /// variants follow their base and are never listed.
    pub fn open_nodes(&self) -> Vec<NodeId> {
        self.nodes()
            .filter(|(_, node)| node.key.extra.is_none() && !node.is_resolved())
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Who depends on this node, with the requirement each one declared.
    pub fn dependents_of(&self, id: NodeId) -> Vec<(NodeId, &Requirement)> {
        let mut deps: Vec<(NodeId, &Requirement)> = self
            .graph
            .edges_directed(id, Direction::Incoming)
            .map(|e| (e.source(), e.weight()))
            .collect();
        deps.sort_by_key(|(idx, _)| self.position(*idx));
        deps
    }

    /// Direct dependencies of a node.
    pub fn dependencies_of(&self, id: NodeId) -> Vec<(NodeId, &Requirement)> {
        let mut deps: Vec<(NodeId, &Requirement)> = self
            .graph
            .edges_directed(id, Direction::Outgoing)
            .map(|e| (e.target(), e.weight()))
            .collect();
        deps.sort_by_key(|(idx, _)| self.position(*idx));
        deps
    }

    fn position(&self, id: NodeId) -> usize {
        self.index
            .get_index_of(&self.graph[id].key)
            .unwrap_or(usize::MAX)
    }

    fn sort_by_insertion(&self, ids: &mut [NodeId]) {
        ids.sort_by_key(|&idx| self.position(idx));
    }

    /// Shortest chain of dependents leading to `id`, starting at a node
    /// nothing depends on and ending with `id` itself.
    pub fn reverse_chain(&self, id: NodeId) -> Vec<NodeId> {
        let mut previous: HashMap<NodeId, NodeId> = HashMap::new();
        let mut queue = VecDeque::from([id]);
        let mut seen = HashSet::from([id]);
        let mut end = id;
        while let Some(current) = queue.pop_front() {
            let dependents = self.dependents_of(current);
            if dependents.is_empty() {
                end = current;
                break;
            }
            for (dep, _) in dependents {
                if seen.insert(dep) {
                    previous.insert(dep, current);
                    queue.push_back(dep);
                }
            }
        }
        let mut chain = vec![end];
        let mut current = end;
        while let Some(&next) = previous.get(&current) {
            chain.push(next);
            current = next;
        }
        chain
    }

    /// Reverse-dependency tree for one package, each line showing the
    /// dependent and the requirement it declared.
    pub fn print_inverted_tree(&self, name: &str) -> String {
        let mut output = String::new();
        let Some(idx) = self.get(name, None) else {
            return output;
        };

        output.push_str(&format!("{}\n", self.graph[idx]));

        let mut visited = HashSet::new();
        visited.insert(idx);

        let dependents = self.dependents_of(idx);
        let count = dependents.len();
        for (i, (dep_idx, req)) in dependents.iter().enumerate() {
            let is_last = i == count - 1;
            self.print_inverted_subtree(&mut output, *dep_idx, req, "", is_last, &mut visited);
        }

        output
    }

    fn print_inverted_subtree(
        &self,
        output: &mut String,
        idx: NodeIndex,
        req: &Requirement,
        prefix: &str,
        is_last: bool,
        visited: &mut HashSet<NodeIndex>,
    ) {
        let connector = if is_last { "└── " } else { "├── " };
        let node = &self.graph[idx];
        output.push_str(&format!("{prefix}{connector}{node} (requires {req})\n"));

        if !visited.insert(idx) {
            return;
        }

        let child_prefix = format!("{prefix}{}", if is_last { "    " } else { "│   " });
        let dependents = self.dependents_of(idx);
        let count = dependents.len();
        for (i, (dep_idx, dep_req)) in dependents.iter().enumerate() {
            let is_last = i == count - 1;
            self.print_inverted_subtree(output, *dep_idx, dep_req, &child_prefix, is_last, visited);
        }

        visited.remove(&idx);
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

impl Default for DistributionGraph {
    fn default() -> Self {
        Self::new(MarkerEnvironment::default())
    }
}
