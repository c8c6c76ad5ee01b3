//! 最大数制約: ≤n の併合規則と選択規則

use super::{halted, is_data_restriction, qualified_neighbors};
use crate::branch::BranchKind;
use crate::clash::{Clash, ClashKind};
use crate::dependency::DependencySet;
use crate::graph::NodeId;
use crate::session::Session;
use crate::Result;
use fukurow_kb::Concept;
use itertools::Itertools;
use tracing::trace;

/// ≤n R.C on object roles, or on data roles when `data` is set
///
/// With n = 1 every qualifying neighbour is merged into one, which fails as
/// soon as two of them are known different. Otherwise a branch picks the
/// pair to merge.
pub(super) fn apply_max(session: &mut Session<'_>, node: NodeId, data: bool) -> Result<()> {
    for (concept, ds) in session.graph.node(node).type_list() {
        let Concept::AtMost(n, role, filler) = &concept else {
            continue;
        };
        if is_data_restriction(session, role, filler) != data {
            continue;
        }
        let candidates = qualified_neighbors(session, node, role, filler);
        if candidates.len() <= *n as usize {
            continue;
        }
        let term_ds = candidates
            .iter()
            .fold(ds.clone(), |acc, (_, neighbor_ds)| acc.union(neighbor_ds));

        let mut pairs = Vec::new();
        let mut different_ds = DependencySet::independent();
        let mut any_different = false;
        for ((a, _), (b, _)) in candidates.iter().tuple_combinations() {
            match session.different_ds(*a, *b) {
                Some(ds) => {
                    any_different = true;
                    different_ds = different_ds.union(&ds);
                }
                None => pairs.push((*a, *b)),
            }
        }

        if pairs.is_empty() || (*n == 1 && any_different) {
            let message = format!("more than {} {}-neighbours with {}", n, role, filler);
            session.set_clash(Clash::new(
                ClashKind::MaxCardinality,
                node,
                term_ds.union(&different_ds),
                message,
            ));
            return Ok(());
        }

        if *n == 1 {
            trace!(node = %node, role = %role, count = candidates.len(), "max: merge all");
            let (head, _) = candidates[0];
            for (other, _) in &candidates[1..] {
                session.merge(*other, head, term_ds.clone());
                if halted(session, node) {
                    return Ok(());
                }
            }
            continue;
        }

        let kind = BranchKind::MaxMerge {
            role: role.clone(),
            filler: filler.as_ref().clone(),
            pairs,
        };
        session.create_branch(node, kind, term_ds)?;
        return Ok(());
    }
    Ok(())
}

/// ≤n R.C with C ≠ ⊤: every R-neighbour must be decided on C before merging
pub(super) fn apply_choose(session: &mut Session<'_>, node: NodeId) -> Result<()> {
    for (concept, ds) in session.graph.node(node).type_list() {
        let Concept::AtMost(_, role, filler) = &concept else {
            continue;
        };
        if filler.as_ref() == &Concept::Top {
            continue;
        }
        let complement = filler.negate();
        let undecided = session
            .graph
            .neighbors(node, role, session.rbox())
            .into_iter()
            .find(|(neighbor, _)| {
                let label = session.graph.node(*neighbor);
                !label.has_type(filler) && !label.has_type(&complement)
            });
        if let Some((neighbor, edge_ds)) = undecided {
            let kind = BranchKind::Choose {
                concept: filler.as_ref().clone(),
            };
            session.create_branch(neighbor, kind, ds.union(&edge_ds))?;
            return Ok(());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TableauConfig;
    use crate::session::PreparedKb;
    use fukurow_kb::{KnowledgeBase, Role, UnsupportedPolicy};

    fn empty() -> PreparedKb {
        PreparedKb::prepare(KnowledgeBase::new(), UnsupportedPolicy::Fail).unwrap()
    }

    #[test]
    fn test_at_most_one_merges() {
        let prepared = empty();
        let config = TableauConfig::default();
        let mut session = Session::new(&prepared, &config);
        let r = Role::named("r");
        let x = session.individual("x");
        let y = session.individual("y");
        let z = session.individual("z");
        session.add_edge(x, &r, y, DependencySet::independent());
        session.add_edge(x, &r, z, DependencySet::independent());
        session.add_type(x, Concept::at_most(1, r.clone(), Concept::Top), DependencySet::independent());

        apply_max(&mut session, x, false).unwrap();
        assert!(!session.is_clashed());
        assert_eq!(session.graph().find(z).0, session.graph().find(y).0);
    }

    #[test]
    fn test_at_most_clash_on_distinct_neighbours() {
        let prepared = empty();
        let config = TableauConfig::default();
        let mut session = Session::new(&prepared, &config);
        let r = Role::named("r");
        let x = session.individual("x");
        let y = session.individual("y");
        let z = session.individual("z");
        session.add_edge(x, &r, y, DependencySet::independent());
        session.add_edge(x, &r, z, DependencySet::independent());
        session.add_different(y, z, DependencySet::independent());
        session.add_type(x, Concept::at_most(1, r.clone(), Concept::Top), DependencySet::independent());

        apply_max(&mut session, x, false).unwrap();
        assert_eq!(session.clash().map(|c| c.kind), Some(ClashKind::MaxCardinality));
    }

    #[test]
    fn test_at_most_two_branches_over_pairs() {
        let prepared = empty();
        let config = TableauConfig::default();
        let mut session = Session::new(&prepared, &config);
        let r = Role::named("r");
        let x = session.individual("x");
        for name in ["a", "b", "c"] {
            let y = session.individual(name);
            session.add_edge(x, &r, y, DependencySet::independent());
        }
        session.add_type(x, Concept::at_most(2, r.clone(), Concept::Top), DependencySet::independent());

        apply_max(&mut session, x, false).unwrap();
        assert_eq!(session.branch_depth(), 1);
        match &session.branches()[0].kind {
            BranchKind::MaxMerge { pairs, .. } => assert_eq!(pairs.len(), 3),
            other => panic!("unexpected branch {:?}", other),
        }
        assert_eq!(session.graph().neighbors(x, &r, session.rbox()).len(), 2);
    }

    #[test]
    fn test_choose_decides_neighbour() {
        let prepared = empty();
        let config = TableauConfig::default();
        let mut session = Session::new(&prepared, &config);
        let r = Role::named("r");
        let x = session.individual("x");
        let y = session.individual("y");
        session.add_edge(x, &r, y, DependencySet::independent());
        session.add_type(
            x,
            Concept::at_most(1, r.clone(), Concept::atomic("A")),
            DependencySet::independent(),
        );

        apply_choose(&mut session, x).unwrap();
        assert!(session.graph().node(y).has_type(&Concept::atomic("A")));
        assert_eq!(session.branches()[0].node, y);
    }
}
