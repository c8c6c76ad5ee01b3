//! 推論セッション: 完全グラフ・分岐スタック・矛盾の所有者

use crate::blocking::{self, Blocking};
use crate::branch::{Branch, BranchKind, BranchSnapshot};
use crate::cache::SatCache;
use crate::clash::{Clash, ClashKind};
use crate::config::{RestoreMode, TableauConfig};
use crate::dependency::DependencySet;
use crate::graph::{CacheMark, CompletionGraph, Edge, Fact, MergeLink, NodeId, NodeKind};
use crate::rules::{self, RuleKind};
use crate::timers::{self, Timers};
use crate::{Result, TableauError};
use fukurow_kb::{
    validate, Axiom, AxiomId, Concept, DataRange, Expressivity, KbError, KnowledgeBase, Literal,
    RBox, Role, TBox, UnsupportedPolicy,
};
use serde::Serialize;
use std::collections::{BTreeSet, VecDeque};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// A validated knowledge base with its derived indexes
///
/// Read-only during reasoning; any number of sessions may borrow it.
#[derive(Debug, Clone)]
pub struct PreparedKb {
    pub kb: KnowledgeBase,
    pub rbox: RBox,
    pub tbox: TBox,
    pub expressivity: Expressivity,
    /// Axioms switched off under `UnsupportedPolicy::Ignore`
    pub disabled: Vec<AxiomId>,
}

impl PreparedKb {
    pub fn prepare(mut kb: KnowledgeBase, policy: UnsupportedPolicy) -> Result<Self> {
        let disabled = validate(&mut kb, policy).map_err(|error| match error {
            KbError::UnsupportedFeature(reason) => TableauError::UnsupportedFeature(reason),
            other => TableauError::Kb(other),
        })?;
        if !disabled.is_empty() {
            warn!(count = disabled.len(), "Unsupported axioms disabled");
        }
        let rbox = RBox::build(&kb);
        let tbox = TBox::build(&kb);
        let expressivity = Expressivity::analyze(&kb, &rbox, &tbox);
        debug!(expressivity = %expressivity, axioms = kb.len(), "Knowledge base prepared");
        Ok(Self {
            kb,
            rbox,
            tbox,
            expressivity,
            disabled,
        })
    }
}

/// Counters reported with every completion result
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CompletionStats {
    pub nodes_created: usize,
    pub branches: usize,
    pub backtracks: usize,
    pub merges: usize,
    pub restores: usize,
    pub cache_hits: usize,
}

/// One consistency check: the completion graph, the branch stack and the clash slot
pub struct Session<'a> {
    prepared: &'a PreparedKb,
    pub(crate) config: &'a TableauConfig,
    pub(crate) expressivity: Expressivity,
    pub(crate) graph: CompletionGraph,
    pub(crate) branches: Vec<Branch>,
    pub(crate) clash: Option<Clash>,
    pub(crate) blocking: Box<dyn Blocking>,
    pub(crate) rules: Vec<RuleKind>,
    pub(crate) cache: Option<&'a mut SatCache>,
    pub(crate) stats: CompletionStats,
    pub(crate) timers: Timers,
    merging: bool,
    merge_queue: VecDeque<(NodeId, NodeId, DependencySet)>,
    /// Nodes touched at each branch depth, kept for local restore
    effects: Vec<BTreeSet<NodeId>>,
}

impl<'a> Session<'a> {
    pub fn new(prepared: &'a PreparedKb, config: &'a TableauConfig) -> Self {
        Self::with_expressivity(prepared, config, prepared.expressivity)
    }

    /// Session whose rules and blocking cover `expressivity`
    pub fn with_expressivity(
        prepared: &'a PreparedKb,
        config: &'a TableauConfig,
        expressivity: Expressivity,
    ) -> Self {
        let mut timers = Timers::new();
        timers.set_limit(timers::COMPLETE, config.timeout_ms.map(Duration::from_millis));
        Self {
            prepared,
            config,
            expressivity,
            graph: CompletionGraph::new(),
            branches: Vec::new(),
            clash: None,
            blocking: blocking::for_expressivity(&expressivity),
            rules: rules::configure(&expressivity),
            cache: None,
            stats: CompletionStats::default(),
            timers,
            merging: false,
            merge_queue: VecDeque::new(),
            effects: Vec::new(),
        }
    }

    pub fn with_cache(mut self, cache: &'a mut SatCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub(crate) fn kb(&self) -> &'a KnowledgeBase {
        &self.prepared.kb
    }

    pub(crate) fn rbox(&self) -> &'a RBox {
        &self.prepared.rbox
    }

    pub(crate) fn tbox(&self) -> &'a TBox {
        &self.prepared.tbox
    }

    pub fn graph(&self) -> &CompletionGraph {
        &self.graph
    }

    pub fn into_graph(self) -> CompletionGraph {
        self.graph
    }

    pub fn clash(&self) -> Option<&Clash> {
        self.clash.as_ref()
    }

    pub fn is_clashed(&self) -> bool {
        self.clash.is_some()
    }

    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    /// Number of branches on the stack; every new fact is stamped with it
    pub fn branch_depth(&self) -> usize {
        self.branches.len()
    }

    pub fn stats(&self) -> CompletionStats {
        self.stats
    }

    pub fn timers(&self) -> &Timers {
        &self.timers
    }

    pub fn blocking(&self) -> &dyn Blocking {
        self.blocking.as_ref()
    }

    pub fn rules(&self) -> &[RuleKind] {
        &self.rules
    }

    pub fn check_timer(&self) -> Result<()> {
        self.timers.check(timers::COMPLETE)
    }

    pub(crate) fn axiom_ds(&self, id: AxiomId) -> DependencySet {
        if self.config.explanations {
            DependencySet::axiom(id)
        } else {
            DependencySet::independent()
        }
    }

    fn record(&mut self, node: NodeId) {
        if self.config.restore_mode != RestoreMode::Local {
            return;
        }
        let depth = self.branches.len();
        if self.effects.len() <= depth {
            self.effects.resize_with(depth + 1, BTreeSet::new);
        }
        self.effects[depth].insert(node);
    }

    /// Live representative of a node, with the merge dependencies folded into `ds`
    pub fn resolve(&self, node: NodeId, ds: DependencySet) -> Option<(NodeId, DependencySet)> {
        let (rep, merge_ds) = self.graph.find(node);
        if !self.graph.is_live(rep) {
            return None;
        }
        Some((rep, ds.union(&merge_ds)))
    }

    // ---- node creation -------------------------------------------------

    /// Node of a named individual, created on first use
    pub fn individual(&mut self, name: &str) -> NodeId {
        if let Some(id) = self.graph.lookup(name) {
            return self.graph.find(id).0;
        }
        let depth = self.branches.len();
        let id = self
            .graph
            .add_node(Some(name.to_string()), NodeKind::Individual, Some(0), None, depth);
        self.stats.nodes_created += 1;
        self.record(id);
        self.add_type(id, Concept::nominal(name), DependencySet::independent());
        self.seed(id);
        id
    }

    /// Node holding an asserted literal value, shared by equal values
    pub fn literal(&mut self, literal: &Literal) -> NodeId {
        let key = literal.to_string();
        if let Some(id) = self.graph.lookup(&key) {
            return self.graph.find(id).0;
        }
        let depth = self.branches.len();
        let id = self.graph.add_node(Some(key), NodeKind::Literal, Some(0), None, depth);
        self.graph.node_mut(id).value = Some(literal.clone());
        self.stats.nodes_created += 1;
        self.record(id);
        id
    }

    /// Fresh anonymous root labelled with `concept`
    pub fn add_root(&mut self, concept: &Concept) -> NodeId {
        let depth = self.branches.len();
        let id = self.graph.add_node(None, NodeKind::Individual, None, None, depth);
        self.stats.nodes_created += 1;
        self.record(id);
        self.seed(id);
        self.add_type(id, concept.nnf(), DependencySet::independent());
        id
    }

    /// New anonymous successor of `parent` along `role`
    pub(crate) fn add_successor(
        &mut self,
        parent: NodeId,
        role: &Role,
        kind: NodeKind,
        ds: &DependencySet,
    ) -> NodeId {
        let depth = self.branches.len();
        let id = self.graph.add_node(None, kind, None, Some(parent), depth);
        self.stats.nodes_created += 1;
        self.record(id);
        if kind == NodeKind::Individual {
            self.seed(id);
        }
        self.add_edge(parent, role, id, ds.clone());
        id
    }

    /// New nominal neighbour introduced by guessing
    pub(crate) fn add_guessed_nominal(&mut self, from: NodeId, role: &Role, ds: &DependencySet) -> NodeId {
        let level = self.graph.node(from).nominal_level.unwrap_or(0) + 1;
        let depth = self.branches.len();
        let id = self.graph.add_node(None, NodeKind::Individual, Some(level), None, depth);
        self.stats.nodes_created += 1;
        self.record(id);
        self.seed(id);
        self.add_edge(from, role, id, ds.clone());
        id
    }

    /// Concepts and edges every individual carries
    fn seed(&mut self, node: NodeId) {
        let tbox = self.tbox();
        for (concept, id) in tbox.universal() {
            let ds = self.axiom_ds(*id);
            self.add_type(node, concept.clone(), ds);
        }
        let reflexive: Vec<(Role, AxiomId)> = self.rbox().reflexive_roles().collect();
        for (role, id) in reflexive {
            let ds = self.axiom_ds(id);
            self.add_edge(node, &role, node, ds);
        }
    }

    /// Seed the graph with the ABox of the knowledge base
    pub fn initialize(&mut self) -> Result<()> {
        let kb = self.kb();
        let names: Vec<NodeId> = kb.individuals.iter().map(|name| self.individual(name)).collect();

        if self.config.unique_name_assumption {
            for (i, a) in names.iter().enumerate() {
                for b in &names[i + 1..] {
                    self.add_different(*a, *b, DependencySet::independent());
                }
            }
        }

        for (id, axiom) in kb.axioms() {
            let ds = self.axiom_ds(id);
            match axiom {
                Axiom::ClassAssertion(concept, a) => {
                    let x = self.individual(a);
                    self.add_type(x, concept.nnf(), ds);
                }
                Axiom::ObjectPropertyAssertion(role, a, b) => {
                    let x = self.individual(a);
                    let y = self.individual(b);
                    self.add_edge(x, role, y, ds);
                }
                Axiom::NegativeObjectPropertyAssertion(role, a, b) => {
                    let x = self.individual(a);
                    let restriction =
                        Concept::for_all(role.clone(), Concept::not(Concept::nominal(b.as_str())));
                    self.add_type(x, restriction, ds);
                }
                Axiom::DataPropertyAssertion(property, a, value) => {
                    let x = self.individual(a);
                    let y = self.literal(value);
                    self.add_edge(x, &Role::named(property.as_str()), y, ds);
                }
                Axiom::SameIndividual(individuals) => {
                    for pair in individuals.windows(2) {
                        let x = self.individual(&pair[0]);
                        let y = self.individual(&pair[1]);
                        self.merge(x, y, ds.clone());
                    }
                }
                Axiom::DifferentIndividuals(individuals) => {
                    for (i, a) in individuals.iter().enumerate() {
                        for b in &individuals[i + 1..] {
                            let x = self.individual(a);
                            let y = self.individual(b);
                            self.add_different(x, y, ds.clone());
                        }
                    }
                }
                _ => {}
            }
        }

        self.graph.touch();
        debug!(
            nodes = self.graph.len(),
            clashed = self.is_clashed(),
            "ABox initialised"
        );
        Ok(())
    }

    // ---- types ---------------------------------------------------------

    /// Add a concept to a node label
    ///
    /// No-op when the graph is clashed or the node already carries the type.
    /// Conjunctions, universal and self restrictions take effect immediately.
    pub fn add_type(&mut self, node: NodeId, concept: Concept, ds: DependencySet) {
        if self.clash.is_some() {
            return;
        }
        let Some((node, ds)) = self.resolve(node, ds) else {
            return;
        };
        if concept == Concept::Top || self.graph.node(node).types.contains_key(&concept) {
            return;
        }

        trace!(node = %node, concept = %concept, ds = %ds, "add type");
        let added_at = self.branches.len();
        self.graph.node_mut(node).types.insert(
            concept.clone(),
            Fact {
                ds: ds.clone(),
                added_at,
            },
        );
        self.graph.touch();
        self.record(node);

        if concept == Concept::Bottom {
            self.set_clash(Clash::atomic(node, ds, "⊥ in label"));
            return;
        }
        let complement = self.graph.node(node).type_ds(&concept.negate()).cloned();
        if let Some(other) = complement {
            let message = format!("{} and its complement", concept);
            self.set_clash(Clash::atomic(node, ds.union(&other), message));
            return;
        }

        match &concept {
            Concept::And(conjuncts) => {
                for conjunct in conjuncts {
                    self.add_type(node, conjunct.clone(), ds.clone());
                }
            }
            Concept::ForAll(role, filler) => self.apply_all_values(node, role, filler, &ds),
            Concept::HasSelf(role) => self.add_edge(node, role, node, ds),
            Concept::Not(inner) => match inner.as_ref() {
                Concept::HasSelf(role) => self.check_self_loops(node, role, &ds),
                Concept::Data(range) => self.check_literal_value(node, range, false, &ds),
                _ => {}
            },
            Concept::Data(range) => self.check_literal_value(node, range, true, &ds),
            _ => {}
        }
    }

    /// ∀R.C: push C to every R-neighbour, and ∀T.C along transitive sub roles T
    pub(crate) fn apply_all_values(
        &mut self,
        node: NodeId,
        role: &Role,
        filler: &Concept,
        ds: &DependencySet,
    ) {
        let rbox = self.rbox();
        for (neighbor, edge_ds) in self.graph.neighbors(node, role, rbox) {
            self.add_type(neighbor, filler.clone(), ds.union(&edge_ds));
        }
        for transitive in rbox.transitive_sub_roles(role) {
            for (neighbor, edge_ds) in self.graph.neighbors(node, &transitive, rbox) {
                let restriction = Concept::for_all(transitive.clone(), filler.clone());
                self.add_type(neighbor, restriction, ds.union(&edge_ds));
            }
        }
    }

    pub(crate) fn check_self_loops(&mut self, node: NodeId, role: &Role, ds: &DependencySet) {
        let rbox = self.rbox();
        let conflict = self
            .graph
            .node(node)
            .out_edges
            .iter()
            .find(|edge| {
                edge.to == node
                    && (rbox.is_sub_role(&edge.role, role) || rbox.is_sub_role(&edge.role.inverse(), role))
            })
            .map(|edge| edge.fact.ds.clone());
        if let Some(edge_ds) = conflict {
            let ds = ds.union(&edge_ds);
            self.set_clash(Clash::atomic(node, ds, format!("self loop on {} denied", role)));
        }
    }

    fn check_literal_value(&mut self, node: NodeId, range: &DataRange, positive: bool, ds: &DependencySet) {
        let Some(value) = self.graph.node(node).value.clone() else {
            return;
        };
        if range.contains(&value) != positive {
            let message = format!("{} {} {}", value, if positive { "outside" } else { "inside" }, range);
            self.set_clash(Clash::new(ClashKind::EmptyDataRange, node, ds.clone(), message));
        }
    }

    // ---- edges ---------------------------------------------------------

    /// Add an edge and apply its consequences on both ends
    ///
    /// Inverse roles are stored as the reversed named edge.
    pub fn add_edge(&mut self, from: NodeId, role: &Role, to: NodeId, ds: DependencySet) {
        if self.clash.is_some() {
            return;
        }
        let Some((from, ds)) = self.resolve(from, ds) else {
            return;
        };
        let Some((to, ds)) = self.resolve(to, ds) else {
            return;
        };
        let (subject, named, object) = match role {
            Role::Named(_) => (from, role.clone(), to),
            Role::Inverse(name) => (to, Role::Named(name.clone()), from),
        };
        if self.graph.has_edge(subject, &named, object) {
            return;
        }

        trace!(from = %subject, role = %named, to = %object, ds = %ds, "add edge");
        let added_at = self.branches.len();
        self.graph.insert_edge(Edge {
            from: subject,
            role: named.clone(),
            to: object,
            fact: Fact {
                ds: ds.clone(),
                added_at,
            },
        });
        self.record(subject);
        self.record(object);

        self.apply_edge_rules(subject, &named, object, &ds);
    }

    fn apply_edge_rules(&mut self, subject: NodeId, role: &Role, object: NodeId, ds: &DependencySet) {
        let rbox = self.rbox();
        let supers = rbox.super_roles(role);

        for sup in &supers {
            for (concept, id) in rbox.domains(sup) {
                let ds = ds.union(&self.axiom_ds(*id));
                self.add_type(subject, concept.clone(), ds);
            }
            for (concept, id) in rbox.ranges(sup) {
                let ds = ds.union(&self.axiom_ds(*id));
                self.add_type(object, concept.clone(), ds);
            }
        }

        if subject == object {
            let irreflexive: Vec<(Role, AxiomId)> = rbox.irreflexive_roles().collect();
            for (irreflexive_role, id) in irreflexive {
                if rbox.is_sub_role(role, &irreflexive_role)
                    || rbox.is_sub_role(&role.inverse(), &irreflexive_role)
                {
                    let ds = ds.union(&self.axiom_ds(id));
                    let message = format!("{} is irreflexive", irreflexive_role);
                    self.set_clash(Clash::atomic(subject, ds, message));
                    return;
                }
            }
            let denied: Vec<(Role, DependencySet)> = self
                .graph
                .node(subject)
                .types
                .iter()
                .filter_map(|(concept, fact)| match concept {
                    Concept::Not(inner) => match inner.as_ref() {
                        Concept::HasSelf(denied) => Some((denied.clone(), fact.ds.clone())),
                        _ => None,
                    },
                    _ => None,
                })
                .collect();
            for (denied, type_ds) in denied {
                if rbox.is_sub_role(role, &denied) || rbox.is_sub_role(&role.inverse(), &denied) {
                    let message = format!("self loop on {} denied", denied);
                    self.set_clash(Clash::atomic(subject, ds.union(&type_ds), message));
                    return;
                }
            }
        }

        for sup in &supers {
            for (disjoint, id) in rbox.disjoint_roles(sup) {
                let conflict = self
                    .graph
                    .neighbors(subject, disjoint, rbox)
                    .into_iter()
                    .find(|(neighbor, _)| *neighbor == object);
                if let Some((_, edge_ds)) = conflict {
                    let ds = ds.union(&edge_ds).union(&self.axiom_ds(*id));
                    let message = format!("{} and {} are disjoint", sup, disjoint);
                    self.set_clash(Clash::new(ClashKind::DisjointProperties, subject, ds, message));
                    return;
                }
            }
        }

        self.apply_functionality(subject, role);
        self.apply_functionality(object, &role.inverse());

        self.propagate_all_values(subject, role, object, ds);
        self.propagate_all_values(object, &role.inverse(), subject, ds);
    }

    /// Merge all neighbours of `node` along functional super roles of `role`
    pub(crate) fn apply_functionality(&mut self, node: NodeId, role: &Role) {
        let rbox = self.rbox();
        for sup in rbox.super_roles(role) {
            let Some(id) = rbox.functional(&sup) else {
                continue;
            };
            let Some((node, _)) = self.resolve(node, DependencySet::independent()) else {
                return;
            };
            let neighbors = self.graph.neighbors(node, &sup, rbox);
            let Some(((first, first_ds), rest)) = neighbors.split_first() else {
                continue;
            };
            for (other, other_ds) in rest {
                let ds = first_ds.union(other_ds).union(&self.axiom_ds(id));
                self.merge(*other, *first, ds);
            }
        }
    }

    /// Push ∀-restrictions of `from` across a new edge to `to`
    fn propagate_all_values(&mut self, from: NodeId, role: &Role, to: NodeId, edge_ds: &DependencySet) {
        let rbox = self.rbox();
        let restrictions: Vec<(Role, Concept, DependencySet)> = self
            .graph
            .node(from)
            .types
            .iter()
            .filter_map(|(concept, fact)| match concept {
                Concept::ForAll(r, filler) => Some((r.clone(), filler.as_ref().clone(), fact.ds.clone())),
                _ => None,
            })
            .collect();

        for (restricted, filler, type_ds) in restrictions {
            let ds = type_ds.union(edge_ds);
            if rbox.is_sub_role(role, &restricted) {
                self.add_type(to, filler.clone(), ds.clone());
            }
            for transitive in rbox.transitive_sub_roles(&restricted) {
                if rbox.is_sub_role(role, &transitive) {
                    self.add_type(to, Concept::for_all(transitive, filler.clone()), ds.clone());
                }
            }
        }
    }

    // ---- differents ----------------------------------------------------

    pub fn add_different(&mut self, a: NodeId, b: NodeId, ds: DependencySet) {
        if self.clash.is_some() {
            return;
        }
        let Some((a, ds)) = self.resolve(a, ds) else {
            return;
        };
        let Some((b, ds)) = self.resolve(b, ds) else {
            return;
        };
        if a == b {
            self.set_clash(Clash::new(ClashKind::Nominal, a, ds, "node different from itself"));
            return;
        }
        if self.graph.node(a).differents.contains_key(&b) {
            return;
        }
        let added_at = self.branches.len();
        let fact = Fact { ds, added_at };
        self.graph.node_mut(a).differents.insert(b, fact.clone());
        self.graph.node_mut(b).differents.insert(a, fact);
        self.graph.touch();
        self.record(a);
        self.record(b);
    }

    /// Dependencies under which two live nodes are known to be different
    pub fn different_ds(&self, a: NodeId, b: NodeId) -> Option<DependencySet> {
        if let Some(fact) = self.graph.node(a).differents.get(&b) {
            return Some(fact.ds.clone());
        }
        match (&self.graph.node(a).value, &self.graph.node(b).value) {
            (Some(x), Some(y)) if x != y => Some(DependencySet::independent()),
            _ => None,
        }
    }

    // ---- merge and prune -----------------------------------------------

    /// Merge two nodes in the preferred direction: into nominals and asserted
    /// values first, then into the older node
    pub fn merge(&mut self, a: NodeId, b: NodeId, ds: DependencySet) {
        let rank = |id: NodeId| {
            let node = self.graph.node(self.graph.find(id).0);
            (node.nominal_level.is_none(), node.nominal_level.unwrap_or(0), node.id)
        };
        if rank(a) <= rank(b) {
            self.merge_to(b, a, ds);
        } else {
            self.merge_to(a, b, ds);
        }
    }

    /// Merge `y` into `z`
    ///
    /// Merges never nest: a merge requested while another is running is
    /// queued and performed once the running one has finished.
    pub fn merge_to(&mut self, y: NodeId, z: NodeId, ds: DependencySet) {
        if self.clash.is_some() {
            return;
        }
        let Some((y, ds)) = self.resolve(y, ds) else {
            return;
        };
        let Some((z, ds)) = self.resolve(z, ds) else {
            return;
        };
        if y == z {
            return;
        }
        if let Some(different) = self.different_ds(y, z) {
            let message = format!("{} and {} are different", self.graph.node(y).name, self.graph.node(z).name);
            self.set_clash(Clash::new(ClashKind::Nominal, y, ds.union(&different), message));
            return;
        }
        if self.merging {
            self.merge_queue.push_back((y, z, ds));
            return;
        }

        self.merging = true;
        self.stats.merges += 1;
        debug!(from = %y, into = %z, ds = %ds, "merge");
        self.merge_into(y, z, &ds);
        self.merging = false;
        self.merge_all();
    }

    /// Drain merges queued while another merge was running
    pub fn merge_all(&mut self) {
        while let Some((y, z, ds)) = self.merge_queue.pop_front() {
            if self.clash.is_some() {
                self.merge_queue.clear();
                return;
            }
            self.merge(y, z, ds);
        }
    }

    fn is_generated_child(&self, node: NodeId, parent: NodeId) -> bool {
        let node = self.graph.node(node);
        node.parent == Some(parent) && node.nominal_level.is_none()
    }

    fn merge_into(&mut self, y: NodeId, z: NodeId, ds: &DependencySet) {
        let added_at = self.branches.len();
        self.graph.node_mut(y).merged_into = Some(MergeLink {
            target: z,
            ds: ds.clone(),
            added_at,
        });
        self.graph.touch();
        self.record(y);
        self.record(z);

        let types = self.graph.node(y).type_list();
        for (concept, type_ds) in types {
            self.add_type(z, concept, type_ds.union(ds));
        }

        let out_edges = self.graph.node(y).out_edges.clone();
        for edge in out_edges {
            let edge_ds = edge.fact.ds.union(ds);
            if edge.to == y {
                self.add_edge(z, &edge.role, z, edge_ds);
            } else if !self.is_generated_child(edge.to, y) {
                self.add_edge(z, &edge.role, edge.to, edge_ds);
            }
        }
        let in_edges = self.graph.node(y).in_edges.clone();
        for edge in in_edges {
            if edge.from != y && !self.is_generated_child(edge.from, y) {
                self.add_edge(edge.from, &edge.role, z, edge.fact.ds.union(ds));
            }
        }

        let differents: Vec<(NodeId, DependencySet)> = self
            .graph
            .node(y)
            .differents
            .iter()
            .map(|(other, fact)| (*other, fact.ds.clone()))
            .collect();
        for (other, different_ds) in differents {
            self.add_different(z, other, different_ds.union(ds));
        }

        self.prune(y, ds);
    }

    /// Mark a node pruned, together with the anonymous subtree it generated
    pub fn prune(&mut self, node: NodeId, ds: &DependencySet) {
        if self.graph.node(node).pruned.is_some() {
            return;
        }
        let added_at = self.branches.len();
        self.graph.node_mut(node).pruned = Some(Fact {
            ds: ds.clone(),
            added_at,
        });
        self.graph.touch();
        self.record(node);

        let children: Vec<NodeId> = self
            .graph
            .adjacent(node)
            .into_iter()
            .filter(|child| self.is_generated_child(*child, node))
            .collect();
        for child in children {
            self.prune(child, ds);
        }
    }

    // ---- clash ---------------------------------------------------------

    /// Record a clash, keeping an existing one unless the new one jumps further back
    pub fn set_clash(&mut self, clash: Clash) {
        match &self.clash {
            Some(existing) if existing.ds.max() <= clash.ds.max() => {
                trace!(clash = %clash, "keeping earlier clash");
            }
            _ => {
                debug!(clash = %clash, "clash");
                self.clash = Some(clash);
            }
        }
    }

    // ---- branches ------------------------------------------------------

    fn branch_mut(&mut self, index: usize) -> Result<&mut Branch> {
        let depth = self.branches.len();
        self.branches
            .get_mut(index.wrapping_sub(1))
            .filter(|branch| branch.index == index)
            .ok_or_else(|| {
                TableauError::Internal(format!("branch {} not on a stack of depth {}", index, depth))
            })
    }

    /// Push a choice point and apply its first alternative
    pub fn create_branch(&mut self, node: NodeId, kind: BranchKind, term_ds: DependencySet) -> Result<()> {
        self.check_timer()?;
        let index = self.branches.len() + 1;
        let branch = Branch::new(
            index,
            node,
            kind,
            term_ds,
            BranchSnapshot {
                node_count: self.graph.len(),
            },
        );
        debug!(
            index,
            kind = branch.kind.label(),
            node = %node,
            alternatives = branch.try_count,
            "new branch"
        );
        self.branches.push(branch);
        self.stats.branches += 1;
        self.try_branch(index)
    }

    /// Apply the current alternative of a branch, moving on to the next one
    /// while alternatives fail on their own
    pub(crate) fn try_branch(&mut self, index: usize) -> Result<()> {
        loop {
            let branch = self.branch_mut(index)?.clone();
            if branch.is_exhausted() {
                let ds = branch.failure_ds().without(index);
                let message = format!("all {} alternatives of branch {} failed", branch.kind.label(), index);
                self.set_clash(Clash::unexplained(branch.node, ds, message));
                return Ok(());
            }

            let i = branch.try_next;
            trace!(index, alternative = i, of = branch.try_count, "try alternative");
            if self.config.semantic_branching {
                for j in 0..i {
                    if let (Some(negated), Some(ds)) = (branch.kind.negated_alternative(j), branch.failed_ds(j)) {
                        self.add_type(branch.node, negated, ds);
                    }
                }
            }
            self.apply_alternative(&branch, i)?;

            let clash = match &self.clash {
                Some(clash) if clash.ds.contains(index) => clash.clone(),
                _ => return Ok(()),
            };
            self.clash = None;
            self.branch_mut(index)?.fail_current(&clash.ds);
            self.stats.backtracks += 1;
            self.restore_to(index, clash.node)?;
        }
    }

    fn apply_alternative(&mut self, branch: &Branch, i: usize) -> Result<()> {
        let ds = branch.alternative_ds(i);
        let missing = || TableauError::Internal(format!("branch {} has no alternative {}", branch.index, i));
        match &branch.kind {
            BranchKind::Disjunction { disjuncts } => {
                let disjunct = disjuncts.get(i).ok_or_else(missing)?;
                self.add_type(branch.node, disjunct.clone(), ds);
            }
            BranchKind::Choose { concept } => {
                let chosen = if i == 0 { concept.clone() } else { concept.negate() };
                self.add_type(branch.node, chosen, ds);
            }
            BranchKind::MaxMerge { pairs, .. } => {
                let (a, b) = *pairs.get(i).ok_or_else(missing)?;
                self.merge(a, b, ds);
            }
            BranchKind::Guess { role, filler, .. } => {
                rules::guess_nominals(self, branch.node, role, filler, i as u32 + 1, &ds);
            }
        }
        Ok(())
    }

    /// Dependency-directed backtracking
    ///
    /// Jumps to the latest branch the clash depends on and tries its next
    /// alternative; exhausted branches raise a clash that jumps further back.
    /// Returns `false` when no branch is left to revise.
    pub fn backtrack(&mut self) -> Result<bool> {
        while let Some(clash) = self.clash.take() {
            self.check_timer()?;
            let last = clash.ds.max();
            if last == 0 {
                debug!(clash = %clash, "clash independent of all branches");
                self.clash = Some(clash);
                return Ok(false);
            }
            if last > self.branches.len() {
                return Err(TableauError::Internal(format!(
                    "clash depends on branch {} but the stack has depth {}",
                    last,
                    self.branches.len()
                )));
            }

            self.stats.backtracks += 1;
            debug!(target = last, depth = self.branches.len(), clash = %clash, "backtrack");
            self.branch_mut(last)?.fail_current(&clash.ds);
            self.restore_to(last, clash.node)?;
            self.try_branch(last)?;
        }
        Ok(true)
    }

    // ---- restore -------------------------------------------------------

    fn restore_to(&mut self, index: usize, node: NodeId) -> Result<()> {
        match self.config.restore_mode {
            RestoreMode::Global => self.restore(index),
            RestoreMode::Local => self.restore_local(node, index),
        }
    }

    fn snapshot_of(&self, index: usize) -> Result<BranchSnapshot> {
        self.branches
            .get(index.wrapping_sub(1))
            .map(|branch| branch.snapshot)
            .ok_or_else(|| TableauError::Internal(format!("cannot restore missing branch {}", index)))
    }

    /// Roll the graph back to the creation point of branch `index`, walking
    /// every node
    pub fn restore(&mut self, index: usize) -> Result<()> {
        let snapshot = self.snapshot_of(index)?;
        trace!(branch = index, mode = "global", "restore");
        let nodes: Vec<NodeId> = (0..snapshot.node_count.min(self.graph.len())).map(NodeId).collect();
        self.graph.retain_before(nodes, index);
        self.finish_restore(index, snapshot);
        Ok(())
    }

    /// Roll back like [`Session::restore`], walking only `node` and the nodes
    /// touched since branch `index` was created
    ///
    /// Falls back to a global restore when effects are not tracked.
    pub fn restore_local(&mut self, node: NodeId, index: usize) -> Result<()> {
        if self.config.restore_mode != RestoreMode::Local {
            return self.restore(index);
        }
        let snapshot = self.snapshot_of(index)?;
        trace!(branch = index, node = %node, mode = "local", "restore");
        let mut touched: BTreeSet<NodeId> = self
            .effects
            .iter()
            .skip(index)
            .flatten()
            .copied()
            .collect();
        touched.insert(node);
        touched.retain(|id| id.0 < snapshot.node_count);
        self.graph.retain_before(touched, index);
        self.finish_restore(index, snapshot);
        Ok(())
    }

    fn finish_restore(&mut self, index: usize, snapshot: BranchSnapshot) {
        self.graph.truncate(snapshot.node_count);
        self.branches.truncate(index);
        self.effects.truncate(index);
        self.clash = None;
        self.merge_queue.clear();
        self.merging = false;
        self.stats.restores += 1;
        self.graph.touch();
    }

    // ---- blocking and cache --------------------------------------------

    pub fn is_directly_blocked(&self, node: NodeId) -> bool {
        self.blocking.is_directly_blocked(&self.graph, node)
    }

    pub fn is_indirectly_blocked(&self, node: NodeId) -> bool {
        blocking::is_indirectly_blocked(self.blocking.as_ref(), &self.graph, node)
    }

    pub fn is_blocked(&self, node: NodeId) -> bool {
        blocking::is_blocked(self.blocking.as_ref(), &self.graph, node)
    }

    /// Close a node on a cached satisfiable result
    pub(crate) fn mark_cached(&mut self, node: NodeId) {
        let mark = CacheMark {
            added_at: self.branches.len(),
            type_count: self.graph.node(node).types.len(),
        };
        self.graph.node_mut(node).cache_mark = Some(mark);
        self.record(node);
    }

    /// A cache mark holds while the label has not grown since it was set
    pub fn is_cache_closed(&self, node: NodeId) -> bool {
        let node = self.graph.node(node);
        node.cache_mark
            .map(|mark| mark.type_count == node.types.len())
            .unwrap_or(false)
    }

    /// Conjunction of a node label, the key used by the satisfiability cache
    pub fn label_concept(&self, node: NodeId) -> Concept {
        Concept::conjunction(self.graph.node(node).types.keys().cloned())
    }

    /// Union of the dependencies of every type in a label
    pub fn label_ds(&self, node: NodeId) -> DependencySet {
        self.graph
            .node(node)
            .types
            .values()
            .fold(DependencySet::independent(), |acc, fact| acc.union(&fact.ds))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prepared(axioms: Vec<Axiom>) -> PreparedKb {
        let mut kb = KnowledgeBase::new();
        for axiom in axioms {
            kb.add_axiom(axiom);
        }
        PreparedKb::prepare(kb, UnsupportedPolicy::Fail).unwrap()
    }

    fn a() -> Concept {
        Concept::atomic("A")
    }

    fn b() -> Concept {
        Concept::atomic("B")
    }

    #[test]
    fn test_add_type_detects_complement() {
        let prepared = prepared(vec![]);
        let config = TableauConfig::default();
        let mut session = Session::new(&prepared, &config);
        let x = session.individual("x");

        session.add_type(x, a(), DependencySet::independent());
        session.add_type(x, Concept::not(a()), DependencySet::independent());

        let clash = session.clash().unwrap();
        assert_eq!(clash.kind, ClashKind::Atomic);
        assert_eq!(clash.node, x);
    }

    #[test]
    fn test_add_type_is_noop_when_clashed() {
        let prepared = prepared(vec![]);
        let config = TableauConfig::default();
        let mut session = Session::new(&prepared, &config);
        let x = session.individual("x");

        session.add_type(x, Concept::Bottom, DependencySet::independent());
        session.add_type(x, b(), DependencySet::independent());
        assert!(!session.graph().node(x).has_type(&b()));
    }

    #[test]
    fn test_conjunction_and_universal_are_eager() {
        let prepared = prepared(vec![]);
        let config = TableauConfig::default();
        let mut session = Session::new(&prepared, &config);
        let x = session.individual("x");
        let y = session.individual("y");
        let r = Role::named("r");

        session.add_edge(x, &r, y, DependencySet::independent());
        session.add_type(
            x,
            Concept::and(vec![a(), Concept::for_all(r.clone(), b())]),
            DependencySet::independent(),
        );

        assert!(session.graph().node(x).has_type(&a()));
        assert!(session.graph().node(y).has_type(&b()));

        // universal restrictions also cross edges added later
        let z = session.individual("z");
        session.add_edge(x, &r, z, DependencySet::independent());
        assert!(session.graph().node(z).has_type(&b()));
    }

    #[test]
    fn test_inverse_edge_is_stored_reversed() {
        let prepared = prepared(vec![]);
        let config = TableauConfig::default();
        let mut session = Session::new(&prepared, &config);
        let x = session.individual("x");
        let y = session.individual("y");

        session.add_edge(x, &Role::named("r").inverse(), y, DependencySet::independent());
        assert!(session.graph().has_edge(y, &Role::named("r"), x));
        assert!(!session.graph().has_edge(x, &Role::named("r"), y));
    }

    #[test]
    fn test_domain_and_range() {
        let prepared = prepared(vec![
            Axiom::PropertyDomain(Role::named("teaches"), Concept::atomic("Teacher")),
            Axiom::PropertyRange(Role::named("teaches"), Concept::atomic("Course")),
        ]);
        let config = TableauConfig::default();
        let mut session = Session::new(&prepared, &config);
        let x = session.individual("x");
        let y = session.individual("y");

        session.add_edge(x, &Role::named("teaches"), y, DependencySet::independent());
        assert!(session.graph().node(x).has_type(&Concept::atomic("Teacher")));
        assert!(session.graph().node(y).has_type(&Concept::atomic("Course")));
    }

    #[test]
    fn test_functional_role_merges_successors() {
        let prepared = prepared(vec![Axiom::FunctionalProperty(Role::named("hasMother"))]);
        let config = TableauConfig::default();
        let mut session = Session::new(&prepared, &config);
        let x = session.individual("x");
        let m1 = session.individual("m1");
        let m2 = session.individual("m2");
        session.add_type(m2, a(), DependencySet::independent());

        session.add_edge(x, &Role::named("hasMother"), m1, DependencySet::independent());
        session.add_edge(x, &Role::named("hasMother"), m2, DependencySet::independent());

        let (rep1, _) = session.graph().find(m1);
        let (rep2, _) = session.graph().find(m2);
        assert_eq!(rep1, rep2);
        assert!(session.graph().node(rep1).has_type(&a()));
        assert!(!session.is_clashed());
    }

    #[test]
    fn test_merge_of_different_nodes_clashes() {
        let prepared = prepared(vec![]);
        let config = TableauConfig::default();
        let mut session = Session::new(&prepared, &config);
        let x = session.individual("x");
        let y = session.individual("y");

        session.add_different(x, y, DependencySet::independent());
        session.merge_to(x, y, DependencySet::independent());
        assert_eq!(session.clash().map(|c| c.kind), Some(ClashKind::Nominal));
    }

    #[test]
    fn test_merge_is_idempotent() {
        let prepared = prepared(vec![]);
        let config = TableauConfig::default();
        let mut session = Session::new(&prepared, &config);
        let x = session.individual("x");
        let y = session.individual("y");
        let z = session.individual("z");
        session.add_edge(x, &Role::named("r"), y, DependencySet::independent());

        session.merge_to(y, z, DependencySet::independent());
        let once = session.graph().snapshot();
        session.merge_to(y, z, DependencySet::independent());
        assert_eq!(session.graph().snapshot(), once);
        assert!(session.graph().has_edge(x, &Role::named("r"), z));
        assert_eq!(session.stats().merges, 1);
    }

    #[test]
    fn test_disjoint_properties_clash() {
        let prepared = prepared(vec![Axiom::DisjointProperties(vec![
            Role::named("likes"),
            Role::named("hates"),
        ])]);
        let config = TableauConfig::default();
        let mut session = Session::new(&prepared, &config);
        let x = session.individual("x");
        let y = session.individual("y");

        session.add_edge(x, &Role::named("likes"), y, DependencySet::independent());
        session.add_edge(x, &Role::named("hates"), y, DependencySet::independent());
        assert_eq!(
            session.clash().map(|c| c.kind),
            Some(ClashKind::DisjointProperties)
        );
    }

    #[test]
    fn test_restore_discards_branch_facts() {
        let prepared = prepared(vec![]);
        let config = TableauConfig::default().with_restore_mode(RestoreMode::Global);
        let mut session = Session::new(&prepared, &config);
        let x = session.individual("x");
        let before = session.graph().snapshot();

        session
            .create_branch(
                x,
                BranchKind::Disjunction {
                    disjuncts: vec![a(), b()],
                },
                DependencySet::independent(),
            )
            .unwrap();
        assert!(session.graph().node(x).has_type(&a()));
        session.add_successor(x, &Role::named("r"), NodeKind::Individual, &DependencySet::branch(1));

        session.restore(1).unwrap();
        assert_eq!(session.graph().snapshot(), before);
        assert_eq!(session.branch_depth(), 1);
    }

    #[test]
    fn test_backtrack_tries_next_disjunct() {
        let prepared = prepared(vec![]);
        let config = TableauConfig::default();
        let mut session = Session::new(&prepared, &config);
        let x = session.individual("x");
        session.add_type(x, Concept::not(a()), DependencySet::independent());

        session
            .create_branch(
                x,
                BranchKind::Disjunction {
                    disjuncts: vec![a(), b()],
                },
                DependencySet::independent(),
            )
            .unwrap();

        // A failed immediately, B holds with ¬A recorded by semantic branching
        assert!(!session.is_clashed());
        assert!(session.graph().node(x).has_type(&b()));
        assert_eq!(session.branches()[0].try_next, 1);
        assert!(session.graph().node(x).type_ds(&b()).unwrap().is_independent());
    }

    #[test]
    fn test_backtrack_reports_inconsistency() {
        let prepared = prepared(vec![]);
        let config = TableauConfig::default();
        let mut session = Session::new(&prepared, &config);
        let x = session.individual("x");
        session.add_type(x, Concept::not(a()), DependencySet::independent());
        session.add_type(x, Concept::not(b()), DependencySet::independent());

        session
            .create_branch(
                x,
                BranchKind::Disjunction {
                    disjuncts: vec![a(), b()],
                },
                DependencySet::independent(),
            )
            .unwrap();

        assert!(session.is_clashed());
        assert!(!session.backtrack().unwrap());
        assert_eq!(session.clash().unwrap().ds.max(), 0);
    }

    #[test]
    fn test_internal_error_on_dangling_branch() {
        let prepared = prepared(vec![]);
        let config = TableauConfig::default();
        let mut session = Session::new(&prepared, &config);
        let x = session.individual("x");
        session.set_clash(Clash::atomic(x, DependencySet::branch(4), "test"));

        assert!(matches!(session.backtrack(), Err(TableauError::Internal(_))));
    }
}
