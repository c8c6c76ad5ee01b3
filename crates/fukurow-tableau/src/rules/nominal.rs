//! 名前規則: {a} を持つノードを a のノードへ併合

use super::halted;
use crate::graph::NodeId;
use crate::session::Session;
use fukurow_kb::Concept;
use tracing::trace;

pub(super) fn apply_nominal(session: &mut Session<'_>, node: NodeId) {
    for (concept, ds) in session.graph.node(node).type_list() {
        let Concept::Nominal(individual) = &concept else {
            continue;
        };
        let target = session.individual(individual);
        if target == node {
            continue;
        }
        trace!(node = %node, individual = %individual, "nominal: merge");
        session.merge(node, target, ds);
        if halted(session, node) {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TableauConfig;
    use crate::dependency::DependencySet;
    use crate::session::PreparedKb;
    use fukurow_kb::{KnowledgeBase, Role, UnsupportedPolicy};

    #[test]
    fn test_anonymous_node_merges_into_individual() {
        let prepared = PreparedKb::prepare(KnowledgeBase::new(), UnsupportedPolicy::Fail).unwrap();
        let config = TableauConfig::default();
        let mut session = Session::new(&prepared, &config);
        let r = Role::named("r");
        let a = session.individual("a");
        let x = session.add_root(&Concept::exists(r.clone(), Concept::atomic("B")));
        let y = session.add_successor(x, &r, crate::graph::NodeKind::Individual, &DependencySet::independent());
        session.add_type(y, Concept::nominal("a"), DependencySet::independent());
        session.add_type(y, Concept::atomic("B"), DependencySet::independent());

        apply_nominal(&mut session, y);
        assert!(!session.graph().is_live(y));
        assert_eq!(session.graph().find(y).0, a);
        assert!(session.graph().has_edge(x, &r, a));
        assert!(session.graph().node(a).has_type(&Concept::atomic("B")));
    }
}
