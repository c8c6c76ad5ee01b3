//! 矛盾 (Clash)

use crate::dependency::DependencySet;
use crate::graph::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClashKind {
    /// C and ¬C (or ⊥) in one label
    Atomic,
    /// An edge labelled with two disjoint roles
    DisjointProperties,
    /// More neighbours than a maximum restriction allows and none can be merged
    MaxCardinality,
    /// Merging nodes known to be different
    Nominal,
    /// A literal with no admissible value
    EmptyDataRange,
    /// Every alternative of a branch failed
    Unexplained,
}

impl fmt::Display for ClashKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClashKind::Atomic => "atomic",
            ClashKind::DisjointProperties => "disjoint-properties",
            ClashKind::MaxCardinality => "max-cardinality",
            ClashKind::Nominal => "nominal",
            ClashKind::EmptyDataRange => "empty-data-range",
            ClashKind::Unexplained => "unexplained",
        };
        write!(f, "{}", name)
    }
}

/// A contradiction found in the completion graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clash {
    pub kind: ClashKind,
    pub node: NodeId,
    pub ds: DependencySet,
    pub message: String,
}

impl Clash {
    pub fn new(kind: ClashKind, node: NodeId, ds: DependencySet, message: impl Into<String>) -> Self {
        Self {
            kind,
            node,
            ds,
            message: message.into(),
        }
    }

    pub fn atomic(node: NodeId, ds: DependencySet, message: impl Into<String>) -> Self {
        Self::new(ClashKind::Atomic, node, ds, message)
    }

    pub fn unexplained(node: NodeId, ds: DependencySet, message: impl Into<String>) -> Self {
        Self::new(ClashKind::Unexplained, node, ds, message)
    }
}

impl fmt::Display for Clash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} clash at {} {}: {}", self.kind, self.node, self.ds, self.message)
    }
}
