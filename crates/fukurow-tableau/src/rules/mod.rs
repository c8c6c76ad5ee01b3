//! 完全化規則
//!
//! 規則は優先度順に並び、各規則は 1 ノードに対して適用されます。
//! 決定的な規則 (連言・全称・自己ループ) は型の追加時に即座に処理されます。

mod cardinality;
mod data;
mod existential;
mod nominal;

use crate::branch::BranchKind;
use crate::dependency::DependencySet;
use crate::graph::NodeId;
use crate::session::Session;
use crate::Result;
use fukurow_kb::{Concept, Expressivity, Role};
use serde::Serialize;
use std::fmt;
use tracing::trace;

pub(crate) use existential::guess_nominals;

/// Expansion rules in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// {a} ∈ L(x): merge x with the node of a
    Nominal,
    /// ≤n R.C on a nominal with a blockable R-neighbour: guess its nominal neighbours
    Guess,
    /// ≤n R.C: decide C or ¬C on every R-neighbour
    Choose,
    /// ≤n R.C: merge neighbours beyond n
    Max,
    /// ∃R.Self and ¬∃R.Self
    SelfRestriction,
    /// Consistency of data ranges on literal nodes
    DataSatisfiability,
    /// Number restrictions on data properties
    DataCardinality,
    /// ∃R.C: create an R-successor
    Some,
    /// ≥n R.C: create n pairwise different R-successors
    Min,
    /// ∀R.C, including the transitive ∀ rule
    AllValues,
    /// Lazy unfolding of TBox definitions
    Unfolding,
    /// C1 ⊔ ... ⊔ Cn
    Disjunction,
}

impl RuleKind {
    pub fn name(&self) -> &'static str {
        match self {
            RuleKind::Nominal => "nominal",
            RuleKind::Guess => "guess",
            RuleKind::Choose => "choose",
            RuleKind::Max => "max",
            RuleKind::SelfRestriction => "self",
            RuleKind::DataSatisfiability => "data-satisfiability",
            RuleKind::DataCardinality => "data-cardinality",
            RuleKind::Some => "some",
            RuleKind::Min => "min",
            RuleKind::AllValues => "all-values",
            RuleKind::Unfolding => "unfolding",
            RuleKind::Disjunction => "disjunction",
        }
    }

    /// Rules that create nodes; these stop at directly blocked nodes
    pub fn is_generating(&self) -> bool {
        matches!(self, RuleKind::Some | RuleKind::Min | RuleKind::DataCardinality)
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The rules needed for a language, in priority order
pub fn configure(expressivity: &Expressivity) -> Vec<RuleKind> {
    let mut rules = Vec::new();
    let counting = expressivity.cardinality || expressivity.functionality;

    if expressivity.nominals {
        rules.push(RuleKind::Nominal);
        if expressivity.inverses && counting {
            rules.push(RuleKind::Guess);
        }
    }
    if expressivity.qualified_cardinality {
        rules.push(RuleKind::Choose);
    }
    if counting {
        rules.push(RuleKind::Max);
    }
    if expressivity.self_restriction {
        rules.push(RuleKind::SelfRestriction);
    }
    if expressivity.datatypes {
        rules.push(RuleKind::DataSatisfiability);
    }
    if expressivity.data_cardinality {
        rules.push(RuleKind::DataCardinality);
    }
    rules.push(RuleKind::Some);
    if expressivity.cardinality {
        rules.push(RuleKind::Min);
    }
    if expressivity.transitivity {
        rules.push(RuleKind::AllValues);
    }
    rules.push(RuleKind::Unfolding);
    rules.push(RuleKind::Disjunction);
    rules
}

/// Blocking status of a node at the time rules are applied to it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStatus {
    Unblocked,
    /// Blocked by an ancestor: generating rules stop
    Direct,
    /// An ancestor is blocked: no rule applies
    Indirect,
}

impl BlockStatus {
    pub fn of(session: &Session<'_>, node: NodeId) -> Self {
        if session.is_indirectly_blocked(node) {
            BlockStatus::Indirect
        } else if session.is_directly_blocked(node) {
            BlockStatus::Direct
        } else {
            BlockStatus::Unblocked
        }
    }
}

/// Apply one rule to one node
///
/// Returns `true` when the graph is clashed afterwards.
pub fn apply(session: &mut Session<'_>, rule: RuleKind, node: NodeId) -> Result<bool> {
    if !session.graph.is_live(node) {
        return Ok(session.is_clashed());
    }
    let status = BlockStatus::of(session, node);
    apply_with_status(session, rule, node, status)
}

/// Apply one rule with a blocking status computed by the caller
pub fn apply_with_status(
    session: &mut Session<'_>,
    rule: RuleKind,
    node: NodeId,
    status: BlockStatus,
) -> Result<bool> {
    if session.is_clashed() {
        return Ok(true);
    }
    if !session.graph.is_live(node) || status == BlockStatus::Indirect {
        return Ok(false);
    }
    if rule.is_generating() && status == BlockStatus::Direct {
        trace!(node = %node, rule = %rule, "blocked");
        return Ok(false);
    }

    match rule {
        RuleKind::Nominal => nominal::apply_nominal(session, node),
        RuleKind::Guess => existential::apply_guess(session, node)?,
        RuleKind::Choose => cardinality::apply_choose(session, node)?,
        RuleKind::Max => cardinality::apply_max(session, node, false)?,
        RuleKind::SelfRestriction => apply_self_restriction(session, node),
        RuleKind::DataSatisfiability => data::apply_data_satisfiability(session, node),
        RuleKind::DataCardinality => data::apply_data_cardinality(session, node)?,
        RuleKind::Some => existential::apply_some(session, node),
        RuleKind::Min => existential::apply_min(session, node, false),
        RuleKind::AllValues => apply_all_values(session, node),
        RuleKind::Unfolding => apply_unfolding(session, node),
        RuleKind::Disjunction => apply_disjunction(session, node)?,
    }
    Ok(session.is_clashed())
}

/// Expansion of `node` has to stop
fn halted(session: &Session<'_>, node: NodeId) -> bool {
    session.is_clashed() || !session.graph.is_live(node)
}

/// Data property restriction: the role is declared a data property or the
/// filler is a data range
pub(crate) fn is_data_restriction(session: &Session<'_>, role: &Role, filler: &Concept) -> bool {
    session.rbox().is_data_role(role)
        || match filler {
            Concept::Data(_) => true,
            Concept::Not(inner) => matches!(inner.as_ref(), Concept::Data(_)),
            _ => false,
        }
}

/// R-neighbours carrying C, with the dependencies of the edge and of C
pub(crate) fn qualified_neighbors(
    session: &Session<'_>,
    node: NodeId,
    role: &Role,
    filler: &Concept,
) -> Vec<(NodeId, DependencySet)> {
    session
        .graph
        .neighbors(node, role, session.rbox())
        .into_iter()
        .filter_map(|(neighbor, edge_ds)| {
            if *filler == Concept::Top {
                return Some((neighbor, edge_ds));
            }
            session
                .graph
                .node(neighbor)
                .type_ds(filler)
                .map(|type_ds| (neighbor, edge_ds.union(type_ds)))
        })
        .collect()
}

fn apply_unfolding(session: &mut Session<'_>, node: NodeId) {
    let tbox = session.tbox();
    for (concept, ds) in session.graph.node(node).type_list() {
        for (unfolded, id) in tbox.unfold(&concept) {
            let ds = ds.union(&session.axiom_ds(*id));
            session.add_type(node, unfolded.clone(), ds);
            if halted(session, node) {
                return;
            }
        }
    }
}

fn apply_disjunction(session: &mut Session<'_>, node: NodeId) -> Result<()> {
    for (concept, ds) in session.graph.node(node).type_list() {
        let Concept::Or(disjuncts) = concept else {
            continue;
        };
        let label = session.graph.node(node);
        if disjuncts.iter().any(|disjunct| label.has_type(disjunct)) {
            continue;
        }
        session.create_branch(node, BranchKind::Disjunction { disjuncts }, ds)?;
        return Ok(());
    }
    Ok(())
}

fn apply_all_values(session: &mut Session<'_>, node: NodeId) {
    for (concept, ds) in session.graph.node(node).type_list() {
        if let Concept::ForAll(role, filler) = &concept {
            session.apply_all_values(node, role, filler, &ds);
            if halted(session, node) {
                return;
            }
        }
    }
}

fn apply_self_restriction(session: &mut Session<'_>, node: NodeId) {
    for (concept, ds) in session.graph.node(node).type_list() {
        match &concept {
            Concept::HasSelf(role) => session.add_edge(node, role, node, ds),
            Concept::Not(inner) => {
                if let Concept::HasSelf(role) = inner.as_ref() {
                    session.check_self_loops(node, role, &ds);
                }
            }
            _ => {}
        }
        if halted(session, node) {
            return;
        }
    }
}
