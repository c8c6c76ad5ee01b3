//! テーブロー推論器
//!
//! 知識ベースを一度だけ前処理し、問い合わせごとに新しいセッションを作ります。

use crate::cache::{CacheSafety, CachedSat, SatCache};
use crate::clash::Clash;
use crate::config::TableauConfig;
use crate::dependency::DependencySet;
use crate::graph::CompletionGraph;
use crate::session::{CompletionStats, PreparedKb, Session};
use crate::strategy;
use crate::Result;
use fukurow_kb::{AxiomId, Concept, Expressivity, KbError, KnowledgeBase};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Outcome of one completion run
#[derive(Debug, Clone)]
pub struct CompletionResult {
    pub consistent: bool,
    /// The clash that could not be backtracked, when inconsistent
    pub clash: Option<Clash>,
    /// The completed graph, or what was left of it
    pub graph: CompletionGraph,
    pub stats: CompletionStats,
}

/// Summary of a completion run, for reporting
#[derive(Debug, Clone, Serialize)]
pub struct CompletionSummary {
    pub consistent: bool,
    pub clash: Option<String>,
    pub nodes: usize,
    pub stats: CompletionStats,
}

impl CompletionResult {
    pub fn summary(&self) -> CompletionSummary {
        CompletionSummary {
            consistent: self.consistent,
            clash: self.clash.as_ref().map(|clash| clash.to_string()),
            nodes: self.graph.live_nodes().len(),
            stats: self.stats,
        }
    }
}

/// What a completion run is asked
#[derive(Debug, Clone, Copy)]
enum Query<'q> {
    Consistency,
    Satisfiability { concept: &'q Concept, with_abox: bool },
    Instance { individual: &'q str, concept: &'q Concept },
}

/// Consistency, satisfiability, subsumption, instance and classification
/// queries over one knowledge base
#[derive(Debug)]
pub struct Reasoner {
    prepared: PreparedKb,
    config: TableauConfig,
    cache: SatCache,
    /// Outcome of the first full consistency check
    consistent: Option<bool>,
}

impl Reasoner {
    /// Validate and index a knowledge base
    ///
    /// Fails with `UnsupportedFeature` on axioms outside the supported
    /// fragment unless the configuration ignores them.
    pub fn new(kb: KnowledgeBase, config: TableauConfig) -> Result<Self> {
        let prepared = PreparedKb::prepare(kb, config.unsupported_policy)?;
        info!(
            expressivity = %prepared.expressivity,
            axioms = prepared.kb.len(),
            disabled = prepared.disabled.len(),
            "Tableau reasoner ready"
        );
        Ok(Self {
            prepared,
            config,
            cache: SatCache::new(),
            consistent: None,
        })
    }

    pub fn with_defaults(kb: KnowledgeBase) -> Result<Self> {
        Self::new(kb, TableauConfig::default())
    }

    pub fn knowledge_base(&self) -> &KnowledgeBase {
        &self.prepared.kb
    }

    pub fn expressivity(&self) -> Expressivity {
        self.prepared.expressivity
    }

    pub fn config(&self) -> &TableauConfig {
        &self.config
    }

    /// Axioms disabled by the unsupported-axiom policy
    pub fn disabled_axioms(&self) -> &[AxiomId] {
        &self.prepared.disabled
    }

    pub fn cache(&self) -> &SatCache {
        &self.cache
    }

    pub fn is_consistent(&mut self) -> Result<bool> {
        Ok(self.check_consistency()?.consistent)
    }

    /// Complete the ABox and return the graph, or the clash on failure
    pub fn check_consistency(&mut self) -> Result<CompletionResult> {
        let result = Self::complete(&self.prepared, &self.config, &mut self.cache, Query::Consistency)?;
        self.consistent = Some(result.consistent);
        Ok(result)
    }

    fn consistent(&mut self) -> Result<bool> {
        match self.consistent {
            Some(consistent) => Ok(consistent),
            None => self.is_consistent(),
        }
    }

    /// Is `concept` satisfiable w.r.t. the knowledge base
    ///
    /// Every concept is unsatisfiable in an inconsistent knowledge base.
    /// Otherwise, without nominals the individuals cannot constrain the
    /// concept and only the TBox is used.
    pub fn is_satisfiable(&mut self, concept: &Concept) -> Result<bool> {
        if !self.consistent()? {
            return Ok(false);
        }
        let with_abox = self.prepared.expressivity.nominals || Expressivity::of_concept(concept).nominals;
        if !with_abox && self.config.use_sat_cache {
            match self.cache.get(&concept.nnf()) {
                CachedSat::Sat => return Ok(true),
                CachedSat::Unsat => return Ok(false),
                CachedSat::Unknown => {}
            }
        }
        let query = Query::Satisfiability { concept, with_abox };
        Ok(Self::complete(&self.prepared, &self.config, &mut self.cache, query)?.consistent)
    }

    /// `sub ⊑ sup` iff `sub ⊓ ¬sup` is unsatisfiable
    pub fn is_subsumed_by(&mut self, sub: &Concept, sup: &Concept) -> Result<bool> {
        let test = Concept::and(vec![sub.clone(), Concept::not(sup.clone())]);
        Ok(!self.is_satisfiable(&test)?)
    }

    /// `a : C` iff the knowledge base with `a : ¬C` is inconsistent
    pub fn is_instance_of(&mut self, individual: &str, concept: &Concept) -> Result<bool> {
        if !self.prepared.kb.individuals.contains(individual) {
            return Err(KbError::UnknownEntity(individual.to_string()).into());
        }
        let query = Query::Instance { individual, concept };
        Ok(!Self::complete(&self.prepared, &self.config, &mut self.cache, query)?.consistent)
    }

    /// Told and inferred named subsumers of every named class
    pub fn classify(&mut self) -> Result<BTreeMap<String, BTreeSet<String>>> {
        let classes: Vec<String> = self.prepared.kb.classes.iter().cloned().collect();
        let mut satisfiable = BTreeMap::new();
        for class in &classes {
            satisfiable.insert(class.clone(), self.is_satisfiable(&Concept::atomic(class.as_str()))?);
        }

        let mut hierarchy = BTreeMap::new();
        for sub in &classes {
            let mut subsumers = BTreeSet::new();
            for sup in &classes {
                if sub == sup {
                    continue;
                }
                let subsumed = !satisfiable.get(sub).copied().unwrap_or(true)
                    || self.is_subsumed_by(&Concept::atomic(sub.as_str()), &Concept::atomic(sup.as_str()))?;
                if subsumed {
                    subsumers.insert(sup.clone());
                }
            }
            hierarchy.insert(sub.clone(), subsumers);
        }
        debug!(classes = classes.len(), "Classification finished");
        Ok(hierarchy)
    }

    /// Axioms the final clash depends on, or `None` when consistent
    pub fn explain_inconsistency(&mut self) -> Result<Option<BTreeSet<AxiomId>>> {
        let config = self.config.clone().with_explanations(true);
        let result = Self::complete(&self.prepared, &config, &mut self.cache, Query::Consistency)?;
        if result.consistent {
            return Ok(None);
        }
        Ok(result.clash.map(|clash| clash.ds.explain().collect()))
    }

    fn complete(
        prepared: &PreparedKb,
        config: &TableauConfig,
        cache: &mut SatCache,
        query: Query<'_>,
    ) -> Result<CompletionResult> {
        let (root, with_abox) = match query {
            Query::Consistency => (None, true),
            Query::Satisfiability { concept, with_abox } => (Some(concept.nnf()), with_abox),
            Query::Instance { concept, .. } => (Some(concept.negate()), true),
        };
        let expressivity = match &root {
            Some(concept) => prepared.expressivity.union(&Expressivity::of_concept(concept)),
            None => prepared.expressivity,
        };
        let cache_usable = config.use_sat_cache
            && !with_abox
            && CacheSafety::for_expressivity(&expressivity).is_safe();

        let mut strategy = strategy::select(config.strategy, &expressivity, !with_abox);
        debug!(query = ?query, strategy = strategy.name(), expressivity = %expressivity, "Completion started");

        let (consistent, clash, graph, stats) = {
            let mut session = Session::with_expressivity(prepared, config, expressivity);
            if cache_usable {
                session = session.with_cache(cache);
            }
            if with_abox {
                session.initialize()?;
            }
            match (query, &root) {
                (Query::Instance { individual, .. }, Some(concept)) => {
                    let node = session.individual(individual);
                    session.add_type(node, concept.clone(), DependencySet::independent());
                }
                (_, Some(concept)) => {
                    session.add_root(concept);
                }
                _ => {}
            }
            let consistent = strategy.complete(&mut session)?;
            let clash = session.clash().cloned();
            let stats = session.stats();
            (consistent, clash, session.into_graph(), stats)
        };

        if !consistent && cache_usable {
            if let Some(concept) = root {
                cache.put(concept, false);
            }
        }
        Ok(CompletionResult {
            consistent,
            clash,
            graph,
            stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fukurow_kb::{Axiom, Role};

    fn kb(axioms: Vec<Axiom>) -> KnowledgeBase {
        let mut kb = KnowledgeBase::new();
        for axiom in axioms {
            kb.add_axiom(axiom);
        }
        kb
    }

    #[test]
    fn test_subsumption_through_existential() {
        let mut reasoner = Reasoner::with_defaults(kb(vec![
            Axiom::SubClassOf(
                Concept::atomic("Parent"),
                Concept::exists(Role::named("hasChild"), Concept::atomic("Person")),
            ),
            Axiom::EquivalentClasses(vec![
                Concept::atomic("HasPersonChild"),
                Concept::exists(Role::named("hasChild"), Concept::atomic("Person")),
            ]),
        ]))
        .unwrap();

        assert!(reasoner
            .is_subsumed_by(&Concept::atomic("Parent"), &Concept::atomic("HasPersonChild"))
            .unwrap());
        assert!(!reasoner
            .is_subsumed_by(&Concept::atomic("HasPersonChild"), &Concept::atomic("Parent"))
            .unwrap());
    }

    #[test]
    fn test_instance_checking() {
        let mut reasoner = Reasoner::with_defaults(kb(vec![
            Axiom::SubClassOf(Concept::atomic("Dog"), Concept::atomic("Animal")),
            Axiom::ClassAssertion(Concept::atomic("Dog"), "rex".to_string()),
        ]))
        .unwrap();

        assert!(reasoner.is_instance_of("rex", &Concept::atomic("Animal")).unwrap());
        assert!(!reasoner.is_instance_of("rex", &Concept::atomic("Cat")).unwrap());
        assert!(matches!(
            reasoner.is_instance_of("felix", &Concept::atomic("Cat")),
            Err(crate::TableauError::Kb(KbError::UnknownEntity(_)))
        ));
    }

    #[test]
    fn test_classify() {
        let mut reasoner = Reasoner::with_defaults(kb(vec![
            Axiom::SubClassOf(Concept::atomic("A"), Concept::atomic("B")),
            Axiom::SubClassOf(Concept::atomic("B"), Concept::atomic("C")),
        ]))
        .unwrap();

        let hierarchy = reasoner.classify().unwrap();
        assert_eq!(
            hierarchy["A"],
            BTreeSet::from(["B".to_string(), "C".to_string()])
        );
        assert!(hierarchy["C"].is_empty());
        assert!(!reasoner.cache().is_empty());
    }

    #[test]
    fn test_explanation_on_consistent_kb() {
        let mut reasoner = Reasoner::with_defaults(kb(vec![Axiom::ClassAssertion(
            Concept::atomic("A"),
            "a".to_string(),
        )]))
        .unwrap();
        assert_eq!(reasoner.explain_inconsistency().unwrap(), None);
        let result = reasoner.check_consistency().unwrap();
        assert!(result.summary().consistent);
        assert_eq!(result.summary().nodes, 1);
    }

    #[test]
    fn test_inconsistent_abox_makes_every_class_unsatisfiable() {
        let mut reasoner = Reasoner::with_defaults(kb(vec![
            Axiom::SubClassOf(Concept::atomic("A"), Concept::atomic("B")),
            Axiom::ClassAssertion(Concept::atomic("B"), "a".to_string()),
            Axiom::ClassAssertion(Concept::not(Concept::atomic("B")), "a".to_string()),
        ]))
        .unwrap();

        assert!(!reasoner.is_satisfiable(&Concept::atomic("A")).unwrap());
        assert!(reasoner
            .is_subsumed_by(&Concept::atomic("B"), &Concept::atomic("A"))
            .unwrap());
        assert!(!reasoner.is_consistent().unwrap());
        let hierarchy = reasoner.classify().unwrap();
        assert!(hierarchy["B"].contains("A"));
    }
}
