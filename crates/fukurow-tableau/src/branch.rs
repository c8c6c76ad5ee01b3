//! 分岐 (非決定的選択点)

use crate::dependency::DependencySet;
use crate::graph::NodeId;
use fukurow_kb::{Concept, Role};

/// What a branch chooses between
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchKind {
    /// One disjunct of C1 ⊔ ... ⊔ Cn
    Disjunction { disjuncts: Vec<Concept> },

    /// C or ¬C on a neighbour of a maximum restriction
    Choose { concept: Concept },

    /// Which pair of neighbours to merge for ≤n R.C
    MaxMerge {
        role: Role,
        filler: Concept,
        pairs: Vec<(NodeId, NodeId)>,
    },

    /// How many nominal R-neighbours satisfy C, for m = 1..=n
    Guess { role: Role, filler: Concept, max: u32 },
}

impl BranchKind {
    pub fn alternatives(&self) -> usize {
        match self {
            BranchKind::Disjunction { disjuncts } => disjuncts.len(),
            BranchKind::Choose { .. } => 2,
            BranchKind::MaxMerge { pairs, .. } => pairs.len(),
            BranchKind::Guess { max, .. } => *max as usize,
        }
    }

    /// Concept whose negation holds once alternative `i` has failed
    pub fn negated_alternative(&self, i: usize) -> Option<Concept> {
        match self {
            BranchKind::Disjunction { disjuncts } => disjuncts.get(i).map(Concept::negate),
            BranchKind::Choose { concept } => match i {
                0 => Some(concept.negate()),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BranchKind::Disjunction { .. } => "disjunction",
            BranchKind::Choose { .. } => "choose",
            BranchKind::MaxMerge { .. } => "max-merge",
            BranchKind::Guess { .. } => "guess",
        }
    }
}

/// State needed to roll the graph back to the branch's creation point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchSnapshot {
    pub node_count: usize,
}

/// A choice point on the branch stack
#[derive(Debug, Clone)]
pub struct Branch {
    /// 1-based position in the stack
    pub index: usize,
    pub node: NodeId,
    pub kind: BranchKind,

    /// Dependencies of the fact that forced the choice
    pub term_ds: DependencySet,

    pub try_count: usize,
    /// Alternative currently applied (or next to apply)
    pub try_next: usize,

    /// Clash dependencies of failed alternatives, without this branch
    pub prev_ds: Vec<Option<DependencySet>>,

    pub snapshot: BranchSnapshot,
}

impl Branch {
    pub fn new(
        index: usize,
        node: NodeId,
        kind: BranchKind,
        term_ds: DependencySet,
        snapshot: BranchSnapshot,
    ) -> Self {
        let try_count = kind.alternatives();
        Self {
            index,
            node,
            kind,
            term_ds,
            try_count,
            try_next: 0,
            prev_ds: vec![None; try_count],
            snapshot,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.try_next >= self.try_count
    }

    /// Record the clash that ended the current alternative and advance
    pub fn fail_current(&mut self, clash_ds: &DependencySet) {
        if let Some(slot) = self.prev_ds.get_mut(self.try_next) {
            *slot = Some(clash_ds.without(self.index));
        }
        self.try_next += 1;
    }

    /// Union of the failure dependencies recorded so far
    pub fn failure_ds(&self) -> DependencySet {
        self.prev_ds
            .iter()
            .flatten()
            .fold(self.term_ds.clone(), |acc, ds| acc.union(ds))
    }

    /// Dependencies of the facts added by alternative `i`
    ///
    /// The last alternative no longer depends on the branch itself: it holds
    /// whenever the choice had to be made and all earlier alternatives failed.
    pub fn alternative_ds(&self, i: usize) -> DependencySet {
        if i + 1 == self.try_count {
            self.failure_ds().without(self.index)
        } else {
            self.term_ds.with_branch(self.index)
        }
    }

    /// Dependencies of ¬(alternative j) after it failed
    pub fn failed_ds(&self, j: usize) -> Option<DependencySet> {
        self.prev_ds
            .get(j)
            .cloned()
            .flatten()
            .map(|ds| ds.union(&self.term_ds))
    }
}
