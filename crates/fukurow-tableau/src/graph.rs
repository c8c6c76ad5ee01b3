//! 完全グラフ (Completion Graph)

use crate::dependency::DependencySet;
use fukurow_kb::{Concept, Literal, RBox, Role};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Index of a node in the graph arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKind {
    Individual,
    Literal,
}

/// A recorded fact: its dependencies and the branch depth it was added at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fact {
    pub ds: DependencySet,
    pub added_at: usize,
}

/// Role edge; always stored with a named role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub from: NodeId,
    pub role: Role,
    pub to: NodeId,
    pub fact: Fact,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeLink {
    pub target: NodeId,
    pub ds: DependencySet,
    pub added_at: usize,
}

/// Marks a node closed by a cached satisfiability result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheMark {
    pub added_at: usize,
    pub type_count: usize,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,

    /// `None` for blockable anonymous nodes, `Some(0)` for named individuals,
    /// deeper levels for nominals introduced by guessing
    pub nominal_level: Option<u32>,

    /// Value of an asserted literal
    pub value: Option<Literal>,

    /// Predecessor that generated this node
    pub parent: Option<NodeId>,
    pub depth: usize,

    /// Branch depth this node was created at
    pub created_at: usize,

    pub types: BTreeMap<Concept, Fact>,
    pub out_edges: Vec<Edge>,
    pub in_edges: Vec<Edge>,
    pub differents: BTreeMap<NodeId, Fact>,

    pub merged_into: Option<MergeLink>,
    pub pruned: Option<Fact>,
    pub cache_mark: Option<CacheMark>,
}

impl Node {
    pub fn is_nominal(&self) -> bool {
        self.nominal_level.is_some()
    }

    pub fn is_literal(&self) -> bool {
        self.kind == NodeKind::Literal
    }

    /// Anonymous individuals are the only nodes that may be blocked
    pub fn is_blockable(&self) -> bool {
        self.kind == NodeKind::Individual && self.nominal_level.is_none()
    }

    pub fn is_live(&self) -> bool {
        self.merged_into.is_none() && self.pruned.is_none()
    }

    pub fn has_type(&self, concept: &Concept) -> bool {
        matches!(concept, Concept::Top) || self.types.contains_key(concept)
    }

    pub fn type_ds(&self, concept: &Concept) -> Option<&DependencySet> {
        self.types.get(concept).map(|fact| &fact.ds)
    }

    /// Types with their dependencies, cloned for iteration while mutating
    pub fn type_list(&self) -> Vec<(Concept, DependencySet)> {
        self.types
            .iter()
            .map(|(concept, fact)| (concept.clone(), fact.ds.clone()))
            .collect()
    }

    /// Drop everything recorded at branch depth `depth` or later
    fn retain_before(&mut self, depth: usize) {
        self.types.retain(|_, fact| fact.added_at < depth);
        self.out_edges.retain(|edge| edge.fact.added_at < depth);
        self.in_edges.retain(|edge| edge.fact.added_at < depth);
        self.differents.retain(|_, fact| fact.added_at < depth);
        if matches!(&self.merged_into, Some(link) if link.added_at >= depth) {
            self.merged_into = None;
        }
        if matches!(&self.pruned, Some(fact) if fact.added_at >= depth) {
            self.pruned = None;
        }
        if matches!(&self.cache_mark, Some(mark) if mark.added_at >= depth) {
            self.cache_mark = None;
        }
    }
}

/// Arena of nodes; individuals and literals connected by role edges
#[derive(Debug, Clone, Default)]
pub struct CompletionGraph {
    nodes: Vec<Node>,

    /// Named individuals and asserted literal values
    names: BTreeMap<String, NodeId>,

    /// Set by every mutation, cleared by the strategy at the start of a pass
    pub(crate) changed: bool,

    /// Monotone mutation counter
    pub(crate) modifications: u64,
}

impl CompletionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn add_node(
        &mut self,
        name: Option<String>,
        kind: NodeKind,
        nominal_level: Option<u32>,
        parent: Option<NodeId>,
        created_at: usize,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        let depth = parent.map(|p| self.nodes[p.0].depth + 1).unwrap_or(0);
        let display = match &name {
            Some(name) => name.clone(),
            None => format!("_:{}", id),
        };
        if let Some(name) = name {
            self.names.insert(name, id);
        }
        self.nodes.push(Node {
            id,
            name: display,
            kind,
            nominal_level,
            value: None,
            parent,
            depth,
            created_at,
            types: BTreeMap::new(),
            out_edges: Vec::new(),
            in_edges: Vec::new(),
            differents: BTreeMap::new(),
            merged_into: None,
            pruned: None,
            cache_mark: None,
        });
        self.touch();
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// Node registered under a name (named individual or literal key)
    pub fn lookup(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }

    /// Representative of a node following merge links, with the merge dependencies
    pub fn find(&self, id: NodeId) -> (NodeId, DependencySet) {
        let mut current = id;
        let mut ds = DependencySet::independent();
        let mut hops = 0;
        while let Some(link) = &self.nodes[current.0].merged_into {
            ds = ds.union(&link.ds);
            current = link.target;
            hops += 1;
            if hops > self.nodes.len() {
                break;
            }
        }
        (current, ds)
    }

    /// Is the merge chain of every node acyclic and inside the arena
    pub fn check_aliases(&self) -> Result<(), String> {
        for node in &self.nodes {
            let mut current = node.id;
            let mut hops = 0;
            while let Some(link) = &self.nodes[current.0].merged_into {
                if link.target.0 >= self.nodes.len() {
                    return Err(format!("{} merged into missing node {}", current, link.target));
                }
                current = link.target;
                hops += 1;
                if hops > self.nodes.len() {
                    return Err(format!("merge chain of {} is cyclic", node.id));
                }
            }
        }
        Ok(())
    }

    pub fn is_live(&self, id: NodeId) -> bool {
        self.nodes[id.0].is_live()
    }

    pub fn live_nodes(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|node| node.is_live())
            .map(|node| node.id)
            .collect()
    }

    pub(crate) fn touch(&mut self) {
        self.changed = true;
        self.modifications += 1;
    }

    pub fn has_edge(&self, from: NodeId, role: &Role, to: NodeId) -> bool {
        self.nodes[from.0]
            .out_edges
            .iter()
            .any(|edge| edge.to == to && &edge.role == role)
    }

    pub(crate) fn insert_edge(&mut self, edge: Edge) {
        self.nodes[edge.to.0].in_edges.push(edge.clone());
        self.nodes[edge.from.0].out_edges.push(edge);
        self.touch();
    }

    /// Live neighbours reachable through `role` (including sub roles and the
    /// inverse direction), one entry per neighbour in id order
    pub fn neighbors(&self, id: NodeId, role: &Role, rbox: &RBox) -> Vec<(NodeId, DependencySet)> {
        let node = &self.nodes[id.0];
        let mut found: BTreeMap<NodeId, DependencySet> = BTreeMap::new();
        for edge in &node.out_edges {
            if self.is_live(edge.to) && rbox.is_sub_role(&edge.role, role) {
                found.entry(edge.to).or_insert_with(|| edge.fact.ds.clone());
            }
        }
        for edge in &node.in_edges {
            if self.is_live(edge.from) && rbox.is_sub_role(&edge.role.inverse(), role) {
                found.entry(edge.from).or_insert_with(|| edge.fact.ds.clone());
            }
        }
        found.into_iter().collect()
    }

    /// Role expressions on live edges leading from `from` to `to`
    pub fn roles_between(&self, from: NodeId, to: NodeId) -> BTreeSet<Role> {
        let mut roles = BTreeSet::new();
        for edge in &self.nodes[from.0].out_edges {
            if edge.to == to {
                roles.insert(edge.role.clone());
            }
        }
        for edge in &self.nodes[from.0].in_edges {
            if edge.from == to {
                roles.insert(edge.role.inverse());
            }
        }
        roles
    }

    /// Live nodes adjacent to `id` in either direction
    pub fn adjacent(&self, id: NodeId) -> BTreeSet<NodeId> {
        let node = &self.nodes[id.0];
        node.out_edges
            .iter()
            .map(|edge| edge.to)
            .chain(node.in_edges.iter().map(|edge| edge.from))
            .filter(|other| *other != id && self.is_live(*other))
            .collect()
    }

    /// Discard every fact recorded at `depth` or later on the given nodes
    pub(crate) fn retain_before<I: IntoIterator<Item = NodeId>>(&mut self, nodes: I, depth: usize) {
        for id in nodes {
            if let Some(node) = self.nodes.get_mut(id.0) {
                node.retain_before(depth);
            }
        }
    }

    /// Discard nodes created after the arena held `len` nodes
    pub(crate) fn truncate(&mut self, len: usize) {
        if len >= self.nodes.len() {
            return;
        }
        for node in &self.nodes[len..] {
            if self.names.get(&node.name) == Some(&node.id) {
                self.names.remove(&node.name);
            }
        }
        self.nodes.truncate(len);
    }

    /// Identity-free structural view of the live part of the graph
    pub fn snapshot(&self) -> GraphSnapshot {
        let mut snapshot = GraphSnapshot {
            node_count: self.nodes.len(),
            ..Default::default()
        };
        for node in self.nodes.iter().filter(|node| node.is_live()) {
            let types = node
                .types
                .iter()
                .map(|(concept, fact)| (concept.clone(), fact.ds.branches().collect()))
                .collect();
            snapshot.nodes.insert(node.name.clone(), types);
            for edge in &node.out_edges {
                if self.is_live(edge.to) {
                    snapshot.edges.insert((
                        node.name.clone(),
                        edge.role.clone(),
                        self.nodes[edge.to.0].name.clone(),
                    ));
                }
            }
            for other in node.differents.keys() {
                if self.is_live(*other) {
                    snapshot
                        .differents
                        .insert((node.name.clone(), self.nodes[other.0].name.clone()));
                }
            }
        }
        snapshot
    }
}

/// Structural view of a completion graph for equality checks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphSnapshot {
    pub node_count: usize,
    /// Live node name → types with the branches they depend on
    pub nodes: BTreeMap<String, BTreeMap<Concept, Vec<usize>>>,
    pub edges: BTreeSet<(String, Role, String)>,
    pub differents: BTreeSet<(String, String)>,
}
