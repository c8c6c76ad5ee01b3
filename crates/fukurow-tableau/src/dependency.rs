//! 依存集合 (Dependency Set)

use fukurow_kb::AxiomId;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Branches (and optionally axioms) a fact depends on
///
/// Immutable: every operation returns a new set, and unchanged halves are
/// shared between sets. The empty set is [`DependencySet::independent`]; facts
/// carrying it survive every backtrack.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct DependencySet {
    branches: Arc<BTreeSet<usize>>,
    explain: Arc<BTreeSet<AxiomId>>,
}

impl DependencySet {
    pub fn independent() -> Self {
        Self::default()
    }

    /// Depends on a single branch
    pub fn branch(index: usize) -> Self {
        Self {
            branches: Arc::new(BTreeSet::from([index])),
            explain: Arc::default(),
        }
    }

    /// Independent of branches, justified by one axiom
    pub fn axiom(id: AxiomId) -> Self {
        Self {
            branches: Arc::default(),
            explain: Arc::new(BTreeSet::from([id])),
        }
    }

    pub fn union(&self, other: &DependencySet) -> DependencySet {
        DependencySet {
            branches: merge_shared(&self.branches, &other.branches),
            explain: merge_shared(&self.explain, &other.explain),
        }
    }

    /// This set plus one more branch
    pub fn with_branch(&self, index: usize) -> DependencySet {
        if self.branches.contains(&index) {
            return self.clone();
        }
        let mut branches = (*self.branches).clone();
        branches.insert(index);
        DependencySet {
            branches: Arc::new(branches),
            explain: Arc::clone(&self.explain),
        }
    }

    /// This set without one branch
    pub fn without(&self, index: usize) -> DependencySet {
        if !self.branches.contains(&index) {
            return self.clone();
        }
        let mut branches = (*self.branches).clone();
        branches.remove(&index);
        DependencySet {
            branches: Arc::new(branches),
            explain: Arc::clone(&self.explain),
        }
    }

    /// Highest branch referenced, 0 when independent
    pub fn max(&self) -> usize {
        self.branches.iter().next_back().copied().unwrap_or(0)
    }

    pub fn contains(&self, index: usize) -> bool {
        self.branches.contains(&index)
    }

    pub fn is_independent(&self) -> bool {
        self.branches.is_empty()
    }

    pub fn branches(&self) -> impl Iterator<Item = usize> + '_ {
        self.branches.iter().copied()
    }

    /// Originating axioms, recorded only when explanations are enabled
    pub fn explain(&self) -> impl Iterator<Item = AxiomId> + '_ {
        self.explain.iter().copied()
    }

    pub fn explains(&self, id: AxiomId) -> bool {
        self.explain.contains(&id)
    }
}

fn merge_shared<T: Ord + Clone>(a: &Arc<BTreeSet<T>>, b: &Arc<BTreeSet<T>>) -> Arc<BTreeSet<T>> {
    if Arc::ptr_eq(a, b) || b.is_subset(a) {
        return Arc::clone(a);
    }
    if a.is_subset(b) {
        return Arc::clone(b);
    }
    Arc::new(a.union(b).cloned().collect())
}

impl fmt::Debug for DependencySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DS{:?}", self.branches)?;
        if !self.explain.is_empty() {
            write!(f, "{:?}", self.explain)?;
        }
        Ok(())
    }
}

impl fmt::Display for DependencySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let branches: Vec<String> = self.branches.iter().map(|b| b.to_string()).collect();
        write!(f, "{{{}}}", branches.join(", "))
    }
}
