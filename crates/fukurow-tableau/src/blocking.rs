//! ブロッキング

use crate::graph::{CompletionGraph, NodeId};
use fukurow_kb::Expressivity;
use std::collections::BTreeSet;
use std::fmt;

/// Decides whether expansion of a node can be frozen
pub trait Blocking: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether blocking status may flip when labels of ancestors change
    fn is_dynamic(&self) -> bool;

    /// Is `node` blocked by one of its own ancestors
    fn is_directly_blocked(&self, graph: &CompletionGraph, node: NodeId) -> bool;
}

/// Blockable ancestors of `node`, nearest first
///
/// The chain stops at the first nominal, literal or root node.
pub fn ancestors(graph: &CompletionGraph, node: NodeId) -> Vec<NodeId> {
    let mut result = Vec::new();
    let mut seen = BTreeSet::from([node]);
    let mut current = node;
    while let Some(parent) = graph.node(current).parent {
        let (parent, _) = graph.find(parent);
        if !graph.node(parent).is_blockable() || !seen.insert(parent) {
            break;
        }
        result.push(parent);
        current = parent;
    }
    result
}

/// Some ancestor of `node` is directly blocked
pub fn is_indirectly_blocked(blocking: &dyn Blocking, graph: &CompletionGraph, node: NodeId) -> bool {
    ancestors(graph, node)
        .into_iter()
        .any(|ancestor| blocking.is_directly_blocked(graph, ancestor))
}

pub fn is_blocked(blocking: &dyn Blocking, graph: &CompletionGraph, node: NodeId) -> bool {
    blocking.is_directly_blocked(graph, node) || is_indirectly_blocked(blocking, graph, node)
}

fn label_subset(graph: &CompletionGraph, node: NodeId, blocker: NodeId) -> bool {
    let blocker = &graph.node(blocker).types;
    graph.node(node).types.keys().all(|concept| blocker.contains_key(concept))
}

fn label_equal(graph: &CompletionGraph, node: NodeId, blocker: NodeId) -> bool {
    graph
        .node(node)
        .types
        .keys()
        .eq(graph.node(blocker).types.keys())
}

/// L(x) ⊆ L(y); sound without inverse roles
#[derive(Debug, Clone, Copy, Default)]
pub struct SubsetBlocking;

impl Blocking for SubsetBlocking {
    fn name(&self) -> &'static str {
        "subset"
    }

    fn is_dynamic(&self) -> bool {
        false
    }

    fn is_directly_blocked(&self, graph: &CompletionGraph, node: NodeId) -> bool {
        graph.node(node).is_blockable()
            && ancestors(graph, node)
                .into_iter()
                .any(|ancestor| label_subset(graph, node, ancestor))
    }
}

/// L(x) = L(y); used with inverse roles and no number restrictions
#[derive(Debug, Clone, Copy, Default)]
pub struct EqualityBlocking;

impl Blocking for EqualityBlocking {
    fn name(&self) -> &'static str {
        "equality"
    }

    fn is_dynamic(&self) -> bool {
        true
    }

    fn is_directly_blocked(&self, graph: &CompletionGraph, node: NodeId) -> bool {
        graph.node(node).is_blockable()
            && ancestors(graph, node)
                .into_iter()
                .any(|ancestor| label_equal(graph, node, ancestor))
    }
}

/// Pairwise blocking: x and its predecessor match an ancestor y and its
/// predecessor, including the roles on the connecting edges
#[derive(Debug, Clone, Copy, Default)]
pub struct DoubleBlocking;

impl DoubleBlocking {
    fn parent(graph: &CompletionGraph, node: NodeId) -> Option<NodeId> {
        graph.node(node).parent.map(|parent| graph.find(parent).0)
    }
}

impl Blocking for DoubleBlocking {
    fn name(&self) -> &'static str {
        "double"
    }

    fn is_dynamic(&self) -> bool {
        true
    }

    fn is_directly_blocked(&self, graph: &CompletionGraph, node: NodeId) -> bool {
        if !graph.node(node).is_blockable() {
            return false;
        }
        let Some(parent) = Self::parent(graph, node) else {
            return false;
        };
        if !graph.node(parent).is_blockable() {
            return false;
        }
        let incoming = graph.roles_between(parent, node);

        ancestors(graph, node).into_iter().skip(1).any(|ancestor| {
            let Some(ancestor_parent) = Self::parent(graph, ancestor) else {
                return false;
            };
            graph.node(ancestor_parent).is_blockable()
                && label_equal(graph, node, ancestor)
                && label_equal(graph, parent, ancestor_parent)
                && graph.roles_between(ancestor_parent, ancestor) == incoming
        })
    }
}

/// Choose the blocking method for the language features in use
pub fn for_expressivity(expressivity: &Expressivity) -> Box<dyn Blocking> {
    if expressivity.inverses && expressivity.has_number_restrictions() {
        Box::new(DoubleBlocking)
    } else if expressivity.inverses {
        Box::new(EqualityBlocking)
    } else {
        Box::new(SubsetBlocking)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependency::DependencySet;
    use crate::graph::{Edge, Fact, NodeKind};
    use fukurow_kb::{Concept, Role};

    fn fact() -> Fact {
        Fact {
            ds: DependencySet::independent(),
            added_at: 0,
        }
    }

    /// a → x1 → x2 → x3 along r, with the given labels on x1..x3
    fn chain(labels: &[&[&str]]) -> (CompletionGraph, Vec<NodeId>) {
        let mut graph = CompletionGraph::new();
        let a = graph.add_node(Some("a".into()), NodeKind::Individual, Some(0), None, 0);
        let mut nodes = vec![a];
        for label in labels {
            let parent = *nodes.last().unwrap();
            let x = graph.add_node(None, NodeKind::Individual, None, Some(parent), 0);
            graph.insert_edge(Edge {
                from: parent,
                role: Role::named("r"),
                to: x,
                fact: fact(),
            });
            for name in *label {
                graph.node_mut(x).types.insert(Concept::atomic(*name), fact());
            }
            nodes.push(x);
        }
        (graph, nodes)
    }

    #[test]
    fn test_subset_blocking() {
        let (graph, nodes) = chain(&[&["A", "B"], &["A"]]);
        assert!(!SubsetBlocking.is_directly_blocked(&graph, nodes[1]));
        assert!(SubsetBlocking.is_directly_blocked(&graph, nodes[2]));
        assert!(!EqualityBlocking.is_directly_blocked(&graph, nodes[2]));
    }

    #[test]
    fn test_nominals_never_block() {
        let (mut graph, nodes) = chain(&[&["A"]]);
        graph.node_mut(nodes[0]).types.insert(Concept::atomic("A"), fact());
        assert!(!SubsetBlocking.is_directly_blocked(&graph, nodes[1]));
        assert!(ancestors(&graph, nodes[1]).is_empty());
    }

    #[test]
    fn test_indirect_blocking() {
        let (graph, nodes) = chain(&[&["A"], &["A"], &["B"]]);
        assert!(SubsetBlocking.is_directly_blocked(&graph, nodes[2]));
        assert!(!SubsetBlocking.is_directly_blocked(&graph, nodes[3]));
        assert!(is_indirectly_blocked(&SubsetBlocking, &graph, nodes[3]));
        assert!(is_blocked(&SubsetBlocking, &graph, nodes[3]));
    }

    #[test]
    fn test_double_blocking_needs_matching_pairs() {
        let (graph, nodes) = chain(&[&["A"], &["A"], &["A"], &["A"]]);
        // the only candidate pairs still involve the named root
        assert!(!DoubleBlocking.is_directly_blocked(&graph, nodes[2]));
        assert!(!DoubleBlocking.is_directly_blocked(&graph, nodes[3]));
        // (x3, x4) matches (x1, x2)
        assert!(DoubleBlocking.is_directly_blocked(&graph, nodes[4]));
    }

    #[test]
    fn test_blocking_selection() {
        let mut expressivity = Expressivity::default();
        assert_eq!(for_expressivity(&expressivity).name(), "subset");
        expressivity.inverses = true;
        assert_eq!(for_expressivity(&expressivity).name(), "equality");
        expressivity.functionality = true;
        assert_eq!(for_expressivity(&expressivity).name(), "double");
    }
}
