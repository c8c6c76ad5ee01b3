//! 完全化戦略
//!
//! - `SroiqStrategy`: 全ノードに全規則を優先度順に適用する汎用戦略
//! - `SingleRootStrategy`: ABox を持たない充足可能性判定向けのキュー戦略 (キャッシュ付き)

use crate::cache::{CacheSafety, CachedSat};
use crate::clash::Clash;
use crate::config::StrategyKind;
use crate::graph::NodeId;
use crate::rules::{self, BlockStatus};
use crate::session::Session;
use crate::timers;
use crate::{Result, TableauError};
use fukurow_kb::Expressivity;
use std::collections::{BTreeMap, VecDeque};
use tracing::{debug, trace};

/// Drives rule application and backtracking until the graph is complete
/// or known to be inconsistent
pub trait CompletionStrategy {
    fn name(&self) -> &'static str;

    /// Returns `true` when a clash-free complete graph was built
    fn complete(&mut self, session: &mut Session<'_>) -> Result<bool>;
}

/// Strategy for a query
///
/// `abox_free` marks satisfiability checks that ignore the individuals.
pub fn select(kind: StrategyKind, expressivity: &Expressivity, abox_free: bool) -> Box<dyn CompletionStrategy> {
    match kind {
        StrategyKind::Sroiq => Box::new(SroiqStrategy::new()),
        StrategyKind::SingleRoot => Box::new(SingleRootStrategy::new()),
        StrategyKind::Auto if abox_free && !expressivity.nominals => Box::new(SingleRootStrategy::new()),
        StrategyKind::Auto => Box::new(SroiqStrategy::new()),
    }
}

fn finish(session: &mut Session<'_>, result: Result<bool>) -> Result<bool> {
    session.timers.stop(timers::COMPLETE);
    let consistent = result?;
    session.graph.check_aliases().map_err(TableauError::Internal)?;
    debug!(
        consistent,
        nodes = session.graph.len(),
        branches = session.stats.branches,
        backtracks = session.stats.backtracks,
        "Completion finished"
    );
    Ok(consistent)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Searching,
    Clashed,
    Backtracking(usize),
    Done(bool),
}

/// Applies every rule to every live node, pass after pass
#[derive(Debug, Default)]
pub struct SroiqStrategy {
    passes: usize,
}

impl SroiqStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn passes(&self) -> usize {
        self.passes
    }

    fn run(&mut self, session: &mut Session<'_>) -> Result<bool> {
        let mut state = if session.is_clashed() {
            State::Clashed
        } else {
            State::Searching
        };
        loop {
            state = match state {
                State::Searching => {
                    if self.expand(session)? {
                        State::Clashed
                    } else if session.graph.changed {
                        State::Searching
                    } else {
                        State::Done(true)
                    }
                }
                State::Clashed => {
                    let target = session.clash().map(|clash| clash.ds.max()).unwrap_or(0);
                    State::Backtracking(target)
                }
                State::Backtracking(target) => {
                    trace!(target, "backtracking");
                    if session.backtrack()? {
                        State::Searching
                    } else {
                        State::Done(false)
                    }
                }
                State::Done(consistent) => return Ok(consistent),
            };
        }
    }

    /// One pass over the live nodes; returns `true` on clash
    fn expand(&mut self, session: &mut Session<'_>) -> Result<bool> {
        session.check_timer()?;
        session.graph.changed = false;
        self.passes += 1;

        let nodes = session.graph.live_nodes();
        let statuses: Option<BTreeMap<NodeId, BlockStatus>> = (!session.blocking.is_dynamic())
            .then(|| nodes.iter().map(|node| (*node, BlockStatus::of(session, *node))).collect());
        let active = session.rules.clone();

        trace!(pass = self.passes, nodes = nodes.len(), "expansion pass");
        for rule in active {
            for node in &nodes {
                let clashed = match statuses.as_ref().and_then(|statuses| statuses.get(node)) {
                    Some(status) => rules::apply_with_status(session, rule, *node, *status)?,
                    None => rules::apply(session, rule, *node)?,
                };
                if clashed {
                    return Ok(true);
                }
            }
        }
        Ok(session.is_clashed())
    }
}

impl CompletionStrategy for SroiqStrategy {
    fn name(&self) -> &'static str {
        "sroiq"
    }

    fn complete(&mut self, session: &mut Session<'_>) -> Result<bool> {
        session.timers.start(timers::COMPLETE);
        let result = self.run(session);
        finish(session, result)
    }
}

/// Expands one node at a time from a queue and reuses satisfiability
/// results across nodes and queries
#[derive(Debug, Default)]
pub struct SingleRootStrategy {
    queue: VecDeque<NodeId>,
}

impl SingleRootStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    fn requeue(&mut self, session: &mut Session<'_>) {
        session.graph.changed = false;
        self.queue = session.graph.live_nodes().into();
    }

    fn run(&mut self, session: &mut Session<'_>) -> Result<bool> {
        let cache_safe = CacheSafety::for_expressivity(&session.expressivity).is_safe();
        self.requeue(session);

        loop {
            session.check_timer()?;
            if session.is_clashed() {
                if !session.backtrack()? {
                    return Ok(false);
                }
                self.requeue(session);
                continue;
            }
            let Some(node) = self.queue.pop_front() else {
                if session.graph.changed {
                    self.requeue(session);
                    continue;
                }
                break;
            };
            self.expand_node(session, node, cache_safe)?;
        }

        if cache_safe {
            store_labels(session);
        }
        Ok(true)
    }

    /// Apply the rules to one node until it stops changing
    fn expand_node(&mut self, session: &mut Session<'_>, node: NodeId, cache_safe: bool) -> Result<()> {
        loop {
            if session.is_clashed() || !session.graph.is_live(node) {
                return Ok(());
            }
            if cache_safe && consult_cache(session, node) {
                return Ok(());
            }

            let before = session.graph.modifications;
            let node_count = session.graph.len();
            let active = session.rules.clone();
            for rule in active {
                if rules::apply(session, rule, node)? {
                    return Ok(());
                }
            }
            self.queue.extend((node_count..session.graph.len()).map(NodeId));
            if session.graph.modifications == before {
                return Ok(());
            }
        }
    }
}

/// Close a node on a known label; returns `true` when it needs no expansion
fn consult_cache(session: &mut Session<'_>, node: NodeId) -> bool {
    let label = session.graph.node(node);
    if !label.is_blockable() || label.parent.is_none() {
        return false;
    }
    if session.is_cache_closed(node) {
        return true;
    }
    let key = session.label_concept(node);
    let cached = match session.cache.as_deref() {
        Some(cache) => cache.get(&key),
        None => return false,
    };
    match cached {
        CachedSat::Sat => {
            trace!(node = %node, "cached satisfiable label");
            session.stats.cache_hits += 1;
            session.mark_cached(node);
            true
        }
        CachedSat::Unsat => {
            session.stats.cache_hits += 1;
            let ds = session.label_ds(node);
            session.set_clash(Clash::unexplained(node, ds, "cached unsatisfiable label"));
            true
        }
        CachedSat::Unknown => false,
    }
}

/// Every label of a clash-free complete graph is satisfiable
fn store_labels(session: &mut Session<'_>) {
    let labels: Vec<_> = session
        .graph
        .nodes()
        .filter(|node| node.is_live() && node.is_blockable() && !node.types.is_empty())
        .map(|node| session.label_concept(node.id))
        .collect();
    if let Some(cache) = session.cache.as_deref_mut() {
        for label in labels {
            cache.put(label, true);
        }
        trace!(entries = cache.len(), "cached satisfiable labels");
    }
}

impl CompletionStrategy for SingleRootStrategy {
    fn name(&self) -> &'static str {
        "single-root"
    }

    fn complete(&mut self, session: &mut Session<'_>) -> Result<bool> {
        session.timers.start(timers::COMPLETE);
        let result = self.run(session);
        finish(session, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::SatCache;
    use crate::config::TableauConfig;
    use crate::session::PreparedKb;
    use fukurow_kb::{Axiom, Concept, KnowledgeBase, Role, UnsupportedPolicy};

    fn prepared(axioms: Vec<Axiom>) -> PreparedKb {
        let mut kb = KnowledgeBase::new();
        for axiom in axioms {
            kb.add_axiom(axiom);
        }
        PreparedKb::prepare(kb, UnsupportedPolicy::Fail).unwrap()
    }

    fn satisfiable(strategy: &mut dyn CompletionStrategy, prepared: &PreparedKb, concept: &Concept) -> bool {
        let config = TableauConfig::default();
        let expressivity = prepared.expressivity.union(&Expressivity::of_concept(concept));
        let mut session = Session::with_expressivity(prepared, &config, expressivity);
        session.add_root(concept);
        strategy.complete(&mut session).unwrap()
    }

    #[test]
    fn test_strategies_agree() {
        let prepared = prepared(vec![
            Axiom::SubClassOf(Concept::atomic("A"), Concept::exists(Role::named("r"), Concept::atomic("B"))),
            Axiom::DisjointClasses(vec![Concept::atomic("B"), Concept::atomic("C")]),
        ]);
        let r = Role::named("r");
        let concepts = vec![
            Concept::atomic("A"),
            Concept::and(vec![Concept::atomic("A"), Concept::for_all(r.clone(), Concept::atomic("C"))]),
            Concept::or(vec![
                Concept::and(vec![Concept::atomic("B"), Concept::atomic("C")]),
                Concept::atomic("A"),
            ]),
        ];
        let expected = [true, false, true];
        for (concept, expected) in concepts.iter().zip(expected) {
            assert_eq!(satisfiable(&mut SroiqStrategy::new(), &prepared, concept), expected, "{}", concept);
            assert_eq!(satisfiable(&mut SingleRootStrategy::new(), &prepared, concept), expected, "{}", concept);
        }
    }

    #[test]
    fn test_cyclic_existential_terminates() {
        let prepared = prepared(vec![Axiom::SubClassOf(
            Concept::atomic("Person"),
            Concept::exists(Role::named("hasParent"), Concept::atomic("Person")),
        )]);
        assert!(satisfiable(&mut SroiqStrategy::new(), &prepared, &Concept::atomic("Person")));
        assert!(satisfiable(&mut SingleRootStrategy::new(), &prepared, &Concept::atomic("Person")));
    }

    #[test]
    fn test_cache_hits_on_repeated_label() {
        let prepared = prepared(vec![Axiom::SubClassOf(
            Concept::atomic("A"),
            Concept::exists(Role::named("r"), Concept::atomic("B")),
        )]);
        let config = TableauConfig::default();
        let mut cache = SatCache::new();
        cache.put(Concept::atomic("B"), true);

        let mut session = Session::new(&prepared, &config).with_cache(&mut cache);
        session.add_root(&Concept::atomic("A"));
        assert!(SingleRootStrategy::new().complete(&mut session).unwrap());
        assert_eq!(session.stats().cache_hits, 1);
    }

    #[test]
    fn test_cached_unsat_label_clashes() {
        let prepared = prepared(vec![]);
        let config = TableauConfig::default();
        let mut cache = SatCache::new();
        cache.put(Concept::atomic("B"), false);

        let mut session = Session::new(&prepared, &config).with_cache(&mut cache);
        session.add_root(&Concept::exists(Role::named("r"), Concept::atomic("B")));
        assert!(!SingleRootStrategy::new().complete(&mut session).unwrap());
    }

    #[test]
    fn test_timeout() {
        let prepared = prepared(vec![]);
        let config = TableauConfig::default().with_timeout_ms(0);
        let mut session = Session::new(&prepared, &config);
        session.add_root(&Concept::atomic("A"));
        assert!(matches!(
            SroiqStrategy::new().complete(&mut session),
            Err(TableauError::Timeout { .. })
        ));
    }
}
