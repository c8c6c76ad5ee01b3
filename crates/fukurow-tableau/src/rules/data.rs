//! データ範囲とデータ数制約

use super::{cardinality, existential, halted, is_data_restriction};
use crate::clash::{Clash, ClashKind};
use crate::dependency::DependencySet;
use crate::graph::NodeId;
use crate::session::Session;
use crate::Result;
use fukurow_kb::{Concept, DataRange, Literal};
use itertools::Itertools;

/// The ranges on an anonymous literal node must share a value
///
/// Value spaces of datatypes are treated as infinite and pairwise disjoint,
/// so only enumerations can be exhausted by negative ranges.
pub(super) fn apply_data_satisfiability(session: &mut Session<'_>, node: NodeId) {
    let label = session.graph.node(node);
    if !label.is_literal() || label.value.is_some() {
        return;
    }

    let mut positive: Vec<(DataRange, DependencySet)> = Vec::new();
    let mut negative: Vec<(DataRange, DependencySet)> = Vec::new();
    for (concept, fact) in &label.types {
        match concept {
            Concept::Data(range) => positive.push((range.clone(), fact.ds.clone())),
            Concept::Not(inner) => {
                if let Concept::Data(range) = inner.as_ref() {
                    negative.push((range.clone(), fact.ds.clone()));
                }
            }
            _ => {}
        }
    }
    if positive.is_empty() {
        return;
    }

    let datatypes: Vec<(&String, &DependencySet)> = positive
        .iter()
        .filter_map(|(range, ds)| match range {
            DataRange::Datatype(datatype) => Some((datatype, ds)),
            DataRange::OneOf(_) => None,
        })
        .collect();
    let conflicting = datatypes
        .iter()
        .tuple_combinations()
        .find(|((a, _), (b, _))| a != b);
    if let Some(((a, a_ds), (b, b_ds))) = conflicting {
        let message = format!("datatypes {} and {} are disjoint", a, b);
        let ds = a_ds.union(b_ds);
        session.set_clash(Clash::new(ClashKind::EmptyDataRange, node, ds, message));
        return;
    }

    let all_ds = positive
        .iter()
        .chain(&negative)
        .fold(DependencySet::independent(), |acc, (_, ds)| acc.union(ds));
    let enumerations: Vec<&Vec<Literal>> = positive
        .iter()
        .filter_map(|(range, _)| match range {
            DataRange::OneOf(values) => Some(values),
            DataRange::Datatype(_) => None,
        })
        .collect();

    let empty = match enumerations.split_first() {
        Some((first, rest)) => !first.iter().any(|value| {
            rest.iter().all(|values| values.contains(value))
                && positive.iter().all(|(range, _)| range.contains(value) || matches!(range, DataRange::OneOf(_)))
                && !negative.iter().any(|(range, _)| range.contains(value))
        }),
        None => datatypes.iter().any(|(datatype, _)| {
            negative
                .iter()
                .any(|(range, _)| matches!(range, DataRange::Datatype(denied) if denied == *datatype))
        }),
    };
    if empty {
        session.set_clash(Clash::new(
            ClashKind::EmptyDataRange,
            node,
            all_ds,
            "no literal satisfies the data ranges",
        ));
    }
}

/// ≥n and ≤n on data properties, after checking that enumerations are large enough
pub(super) fn apply_data_cardinality(session: &mut Session<'_>, node: NodeId) -> Result<()> {
    for (concept, ds) in session.graph.node(node).type_list() {
        let Concept::AtLeast(n, role, filler) = &concept else {
            continue;
        };
        if !is_data_restriction(session, role, filler) {
            continue;
        }
        if let Concept::Data(DataRange::OneOf(values)) = filler.as_ref() {
            if values.len() < *n as usize {
                let message = format!("{} has fewer than {} values", filler, n);
                session.set_clash(Clash::new(ClashKind::EmptyDataRange, node, ds, message));
                return Ok(());
            }
        }
    }

    cardinality::apply_max(session, node, true)?;
    if halted(session, node) {
        return Ok(());
    }
    existential::apply_min(session, node, true);
    Ok(())
}
