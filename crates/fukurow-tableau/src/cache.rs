//! 充足可能性キャッシュ

use fukurow_kb::{Concept, Expressivity};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachedSat {
    Unknown,
    Sat,
    Unsat,
}

/// Memo of satisfiability results keyed by concept (a node label is keyed
/// by the conjunction of its types)
#[derive(Debug, Clone, Default)]
pub struct SatCache {
    entries: HashMap<Concept, bool>,
}

impl SatCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, concept: &Concept) -> CachedSat {
        match concept {
            Concept::Top => CachedSat::Sat,
            Concept::Bottom => CachedSat::Unsat,
            _ => match self.entries.get(concept) {
                Some(true) => CachedSat::Sat,
                Some(false) => CachedSat::Unsat,
                None => CachedSat::Unknown,
            },
        }
    }

    pub fn put(&mut self, concept: Concept, satisfiable: bool) {
        self.entries.insert(concept, satisfiable);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Whether cached results are valid independent of a node's context
///
/// With nominals a label can be constrained through named individuals, and
/// with inverse roles through its predecessor; either makes reuse unsound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSafety {
    safe: bool,
}

impl CacheSafety {
    pub fn for_expressivity(expressivity: &Expressivity) -> Self {
        Self {
            safe: !expressivity.nominals && !expressivity.inverses,
        }
    }

    pub fn is_safe(&self) -> bool {
        self.safe
    }
}
