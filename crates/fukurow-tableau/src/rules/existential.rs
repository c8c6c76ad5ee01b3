//! 生成規則: ∃, ≥n, 名前推測

use super::{halted, is_data_restriction, qualified_neighbors};
use crate::branch::BranchKind;
use crate::dependency::DependencySet;
use crate::graph::{NodeId, NodeKind};
use crate::session::Session;
use crate::Result;
use fukurow_kb::{Concept, Role};
use itertools::Itertools;
use tracing::trace;

/// Some subset of `candidates` with `n` members is pairwise different
///
/// Candidates with fewer than `n - 1` different neighbours are peeled off
/// first; the remaining clique search stops as soon as a branch cannot
/// reach `n` members.
pub(crate) fn has_distinct(session: &Session<'_>, candidates: &[NodeId], n: usize) -> bool {
    if n <= 1 {
        return candidates.len() >= n;
    }
    if candidates.len() < n {
        return false;
    }

    let mut adjacent: Vec<Vec<bool>> = vec![vec![false; candidates.len()]; candidates.len()];
    for (i, j) in (0..candidates.len()).tuple_combinations() {
        if session.different_ds(candidates[i], candidates[j]).is_some() {
            adjacent[i][j] = true;
            adjacent[j][i] = true;
        }
    }

    let mut alive: Vec<usize> = (0..candidates.len()).collect();
    loop {
        let before = alive.len();
        let degrees: Vec<usize> = alive
            .iter()
            .map(|&i| alive.iter().filter(|&&j| adjacent[i][j]).count())
            .collect();
        alive = alive
            .iter()
            .zip(degrees)
            .filter(|(_, degree)| *degree + 1 >= n)
            .map(|(&i, _)| i)
            .collect();
        if alive.len() < n {
            return false;
        }
        if alive.len() == before {
            break;
        }
    }
    extend_clique(&adjacent, &mut Vec::with_capacity(n), &alive, n)
}

fn extend_clique(adjacent: &[Vec<bool>], clique: &mut Vec<usize>, pool: &[usize], n: usize) -> bool {
    if clique.len() == n {
        return true;
    }
    for (offset, &next) in pool.iter().enumerate() {
        if clique.len() + pool.len() - offset < n {
            return false;
        }
        let rest: Vec<usize> = pool[offset + 1..]
            .iter()
            .copied()
            .filter(|&other| adjacent[next][other])
            .collect();
        clique.push(next);
        if extend_clique(adjacent, clique, &rest, n) {
            return true;
        }
        clique.pop();
    }
    false
}

pub(super) fn apply_some(session: &mut Session<'_>, node: NodeId) {
    for (concept, ds) in session.graph.node(node).type_list() {
        let Concept::Exists(role, filler) = &concept else {
            continue;
        };
        let filler = filler.as_ref();
        if !qualified_neighbors(session, node, role, filler).is_empty() {
            continue;
        }

        if let Concept::Nominal(individual) = filler {
            let target = session.individual(individual);
            trace!(node = %node, role = %role, individual = %individual, "some: nominal filler");
            session.add_edge(node, role, target, ds);
        } else {
            let kind = if is_data_restriction(session, role, filler) {
                NodeKind::Literal
            } else {
                NodeKind::Individual
            };
            let successor = session.add_successor(node, role, kind, &ds);
            trace!(node = %node, role = %role, successor = %successor, "some: new successor");
            session.add_type(successor, filler.clone(), ds);
        }

        if halted(session, node) {
            return;
        }
    }
}

/// Create `n` pairwise different R-successors with C
pub(super) fn add_distinct_successors(
    session: &mut Session<'_>,
    node: NodeId,
    role: &Role,
    filler: &Concept,
    n: u32,
    kind: NodeKind,
    ds: &DependencySet,
) {
    let mut created = Vec::with_capacity(n as usize);
    for _ in 0..n {
        let successor = session.add_successor(node, role, kind, ds);
        session.add_type(successor, filler.clone(), ds.clone());
        created.push(successor);
        if halted(session, node) {
            return;
        }
    }
    for (a, b) in created.iter().tuple_combinations() {
        session.add_different(*a, *b, ds.clone());
    }
}

/// ≥n R.C on object roles, or on data roles when `data` is set
pub(super) fn apply_min(session: &mut Session<'_>, node: NodeId, data: bool) {
    for (concept, ds) in session.graph.node(node).type_list() {
        let Concept::AtLeast(n, role, filler) = &concept else {
            continue;
        };
        if is_data_restriction(session, role, filler) != data {
            continue;
        }
        let candidates: Vec<NodeId> = qualified_neighbors(session, node, role, filler)
            .into_iter()
            .map(|(neighbor, _)| neighbor)
            .collect();
        if has_distinct(session, &candidates, *n as usize) {
            continue;
        }

        trace!(node = %node, n, role = %role, "min: new successors");
        let kind = if data { NodeKind::Literal } else { NodeKind::Individual };
        add_distinct_successors(session, node, role, filler, *n, kind, &ds);
        if halted(session, node) {
            return;
        }
    }
}

/// ≤m R.C is satisfied on a nominal by m distinct nominal neighbours, for some m ≤ n
fn guessed(session: &Session<'_>, node: NodeId, role: &Role, filler: &Concept, n: u32) -> bool {
    let nominals: Vec<NodeId> = qualified_neighbors(session, node, role, filler)
        .into_iter()
        .map(|(neighbor, _)| neighbor)
        .filter(|neighbor| session.graph.node(*neighbor).is_nominal())
        .collect();
    let label = session.graph.node(node);
    (1..=n).any(|m| {
        label.has_type(&Concept::at_most(m, role.clone(), filler.clone()))
            && has_distinct(session, &nominals, m as usize)
    })
}

/// ≤n R.C on a nominal that a blockable node reaches through R⁻
pub(super) fn apply_guess(session: &mut Session<'_>, node: NodeId) -> Result<()> {
    if !session.graph.node(node).is_nominal() || session.graph.node(node).is_literal() {
        return Ok(());
    }
    for (concept, ds) in session.graph.node(node).type_list() {
        let Concept::AtMost(n, role, filler) = &concept else {
            continue;
        };
        let filler = filler.as_ref();
        let blockable = qualified_neighbors(session, node, role, filler)
            .into_iter()
            .find(|(neighbor, _)| session.graph.node(*neighbor).is_blockable());
        let Some((_, neighbor_ds)) = blockable else {
            continue;
        };
        if guessed(session, node, role, filler, *n) {
            continue;
        }

        let kind = BranchKind::Guess {
            role: role.clone(),
            filler: filler.clone(),
            max: *n,
        };
        session.create_branch(node, kind, ds.union(&neighbor_ds))?;
        return Ok(());
    }
    Ok(())
}

/// Alternative `m` of a guess: ≤m R.C plus m new distinct nominal neighbours with C
pub(crate) fn guess_nominals(
    session: &mut Session<'_>,
    node: NodeId,
    role: &Role,
    filler: &Concept,
    m: u32,
    ds: &DependencySet,
) {
    session.add_type(node, Concept::at_most(m, role.clone(), filler.clone()), ds.clone());
    let mut created = Vec::with_capacity(m as usize);
    for _ in 0..m {
        if halted(session, node) {
            return;
        }
        let nominal = session.add_guessed_nominal(node, role, ds);
        session.add_type(nominal, filler.clone(), ds.clone());
        created.push(nominal);
    }
    for (a, b) in created.iter().tuple_combinations() {
        session.add_different(*a, *b, ds.clone());
    }
}
