//! Completion scenarios for the fukurow-tableau crate

mod common;

use common::{init_tracing, kb};
use fukurow_kb::{Axiom, AxiomId, Concept, Role, UnsupportedPolicy};
use fukurow_tableau::*;

#[test]
fn test_disjoint_assertions_are_inconsistent() {
    init_tracing();
    let knowledge_base = kb(vec![
        Axiom::DisjointClasses(vec![Concept::atomic("C"), Concept::atomic("D")]),
        Axiom::ClassAssertion(Concept::atomic("C"), "a".to_string()),
        Axiom::ClassAssertion(Concept::atomic("C"), "b".to_string()),
        Axiom::ClassAssertion(Concept::atomic("D"), "b".to_string()),
    ]);
    let mut reasoner = Reasoner::with_defaults(knowledge_base).unwrap();

    let result = reasoner.check_consistency().unwrap();
    assert!(!result.consistent);
    assert!(result.clash.is_some());

    let explanation = reasoner.explain_inconsistency().unwrap().unwrap();
    assert!(explanation.contains(&AxiomId(2)), "{:?}", explanation);
    assert!(explanation.contains(&AxiomId(3)), "{:?}", explanation);
    assert!(!explanation.contains(&AxiomId(1)), "{:?}", explanation);
}

#[test]
fn test_max_one_successor_merges() {
    init_tracing();
    let r = Role::named("r");
    let knowledge_base = kb(vec![
        Axiom::ClassAssertion(Concept::at_most(1, r.clone(), Concept::Top), "a".to_string()),
        Axiom::ObjectPropertyAssertion(r.clone(), "a".to_string(), "b".to_string()),
        Axiom::ObjectPropertyAssertion(r.clone(), "a".to_string(), "c".to_string()),
    ]);
    let mut reasoner = Reasoner::with_defaults(knowledge_base).unwrap();

    let result = reasoner.check_consistency().unwrap();
    assert!(result.consistent);
    let graph = &result.graph;
    let b = graph.lookup("b").unwrap();
    let c = graph.lookup("c").unwrap();
    assert_eq!(graph.find(b).0, graph.find(c).0);
    assert_eq!(graph.live_nodes().len(), 2);
    assert!(result.stats.merges >= 1);
}

#[test]
fn test_max_one_with_different_successors_is_inconsistent() {
    let r = Role::named("r");
    let knowledge_base = kb(vec![
        Axiom::ClassAssertion(Concept::at_most(1, r.clone(), Concept::Top), "a".to_string()),
        Axiom::ObjectPropertyAssertion(r.clone(), "a".to_string(), "b".to_string()),
        Axiom::ObjectPropertyAssertion(r.clone(), "a".to_string(), "c".to_string()),
        Axiom::DifferentIndividuals(vec!["b".to_string(), "c".to_string()]),
    ]);
    let mut reasoner = Reasoner::with_defaults(knowledge_base).unwrap();
    assert!(!reasoner.is_consistent().unwrap());
}

#[test]
fn test_self_referential_existential_terminates() {
    init_tracing();
    let knowledge_base = kb(vec![
        Axiom::SubClassOf(
            Concept::atomic("Person"),
            Concept::exists(Role::named("hasParent"), Concept::atomic("Person")),
        ),
        Axiom::ClassAssertion(Concept::atomic("Person"), "alice".to_string()),
    ]);
    for strategy in [StrategyKind::Sroiq, StrategyKind::SingleRoot, StrategyKind::Auto] {
        let config = TableauConfig::default().with_strategy(strategy);
        let mut reasoner = Reasoner::new(knowledge_base.clone(), config).unwrap();
        assert!(reasoner.is_satisfiable(&Concept::atomic("Person")).unwrap());

        let result = reasoner.check_consistency().unwrap();
        assert!(result.consistent);
        assert!(result.graph.len() < 10, "unraveled {} nodes", result.graph.len());
    }
}

#[test]
fn test_backtracking_past_merge_restores_graph() {
    init_tracing();
    let r = Role::named("r");
    let prepared = PreparedKb::prepare(
        kb(vec![
            Axiom::ObjectPropertyAssertion(r.clone(), "a".to_string(), "b".to_string()),
            Axiom::ObjectPropertyAssertion(r.clone(), "a".to_string(), "c".to_string()),
        ]),
        UnsupportedPolicy::Fail,
    )
    .unwrap();

    for mode in [RestoreMode::Global, RestoreMode::Local] {
        let config = TableauConfig::default().with_restore_mode(mode);
        let mut session = Session::new(&prepared, &config);
        session.initialize().unwrap();
        let a = session.graph().lookup("a").unwrap();
        let b = session.graph().lookup("b").unwrap();
        let c = session.graph().lookup("c").unwrap();
        let before = session.graph().snapshot();

        let kind = BranchKind::MaxMerge {
            role: r.clone(),
            filler: Concept::Top,
            pairs: vec![(b, c)],
        };
        session.create_branch(a, kind, DependencySet::independent()).unwrap();
        assert_eq!(session.graph().live_nodes().len(), 2);
        assert_ne!(session.graph().snapshot(), before);

        session.set_clash(Clash::atomic(a, DependencySet::branch(1), "forced"));
        assert!(!session.backtrack().unwrap());
        assert_eq!(session.graph().snapshot(), before, "{:?}", mode);
        assert_eq!(session.graph().len(), before.node_count);
        assert!(session.graph().is_live(b) && session.graph().is_live(c));
    }
}

#[test]
fn test_exhausted_branches_backtrack_strictly_downwards() {
    let prepared = PreparedKb::prepare(kb(vec![]), UnsupportedPolicy::Fail).unwrap();
    let config = TableauConfig::default();
    let mut session = Session::new(&prepared, &config);
    let x = session.add_root(&Concept::atomic("A"));

    let single = |name: &str| BranchKind::Disjunction {
        disjuncts: vec![Concept::atomic(name)],
    };
    session.create_branch(x, single("B"), DependencySet::independent()).unwrap();
    session.create_branch(x, single("C"), DependencySet::branch(1)).unwrap();
    session.create_branch(x, single("D"), DependencySet::branch(2)).unwrap();
    assert_eq!(session.branch_depth(), 3);

    session.set_clash(Clash::atomic(x, DependencySet::branch(3).with_branch(1), "forced"));
    assert!(!session.backtrack().unwrap());

    let clash = session.clash().unwrap();
    assert!(clash.ds.is_independent(), "{}", clash);
    assert!(session.branch_depth() <= 1);
    assert!(!session.graph().node(x).has_type(&Concept::atomic("B")));
    assert!(session.graph().node(x).has_type(&Concept::atomic("A")));
}

#[test]
fn test_merge_twice_is_idempotent() {
    let r = Role::named("r");
    let prepared = PreparedKb::prepare(
        kb(vec![
            Axiom::ObjectPropertyAssertion(r.clone(), "a".to_string(), "b".to_string()),
            Axiom::ObjectPropertyAssertion(r.clone(), "a".to_string(), "c".to_string()),
            Axiom::ClassAssertion(Concept::atomic("B"), "b".to_string()),
        ]),
        UnsupportedPolicy::Fail,
    )
    .unwrap();
    let config = TableauConfig::default();
    let mut session = Session::new(&prepared, &config);
    session.initialize().unwrap();
    let a = session.graph().lookup("a").unwrap();
    let b = session.graph().lookup("b").unwrap();
    let c = session.graph().lookup("c").unwrap();

    session.merge_to(c, b, DependencySet::independent());
    let once = session.graph().snapshot();
    let merges = session.stats().merges;
    session.merge_to(c, b, DependencySet::independent());
    session.merge(b, c, DependencySet::independent());

    assert_eq!(session.graph().snapshot(), once);
    assert_eq!(session.stats().merges, merges);
    let edges = session
        .graph()
        .node(a)
        .out_edges
        .iter()
        .filter(|edge| session.graph().is_live(edge.to))
        .count();
    assert_eq!(edges, 1);
}

#[test]
fn test_timeout_fails_only_the_query() {
    let knowledge_base = kb(vec![
        Axiom::SubClassOf(
            Concept::atomic("Person"),
            Concept::exists(Role::named("hasParent"), Concept::atomic("Person")),
        ),
        Axiom::ClassAssertion(Concept::atomic("Person"), "alice".to_string()),
    ]);
    let config = TableauConfig::default().with_timeout_ms(0);
    let mut reasoner = Reasoner::new(knowledge_base.clone(), config).unwrap();
    assert!(matches!(reasoner.is_consistent(), Err(TableauError::Timeout { .. })));

    let mut reasoner = Reasoner::with_defaults(knowledge_base).unwrap();
    assert!(reasoner.is_consistent().unwrap());
}

#[test]
fn test_unsupported_policy() {
    let ancestor = Role::named("ancestorOf");
    let knowledge_base = kb(vec![
        Axiom::TransitiveProperty(ancestor.clone()),
        Axiom::SubClassOf(
            Concept::atomic("Person"),
            Concept::at_most(2, ancestor.clone(), Concept::Top),
        ),
        Axiom::ClassAssertion(Concept::atomic("Person"), "alice".to_string()),
    ]);

    let failing = Reasoner::new(knowledge_base.clone(), TableauConfig::default());
    assert!(matches!(failing, Err(TableauError::UnsupportedFeature(_))));

    let config = TableauConfig::default().with_unsupported_policy(UnsupportedPolicy::Ignore);
    let mut reasoner = Reasoner::new(knowledge_base, config).unwrap();
    assert_eq!(reasoner.disabled_axioms(), &[AxiomId(1)]);
    assert!(reasoner.is_consistent().unwrap());
}

#[test]
fn test_summary_serializes() {
    let knowledge_base = kb(vec![Axiom::ClassAssertion(Concept::atomic("A"), "a".to_string())]);
    let mut reasoner = Reasoner::with_defaults(knowledge_base).unwrap();
    let summary = reasoner.check_consistency().unwrap().summary();
    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["consistent"], serde_json::Value::Bool(true));
    assert_eq!(json["nodes"], serde_json::json!(1));
    assert!(json["stats"]["nodes_created"].is_number());
}

#[test]
fn test_independent_checks_share_a_prepared_kb() {
    let has_parent = Role::named("hasParent");
    let prepared = PreparedKb::prepare(
        kb(vec![Axiom::SubClassOf(
            Concept::atomic("Person"),
            Concept::exists(has_parent.clone(), Concept::atomic("Person")),
        )]),
        UnsupportedPolicy::Fail,
    )
    .unwrap();
    let config = TableauConfig::default();
    let concepts = vec![
        Concept::atomic("Person"),
        Concept::and(vec![Concept::atomic("Person"), Concept::for_all(has_parent, Concept::Bottom)]),
    ];

    let (prepared, config) = (&prepared, &config);
    let results: Vec<bool> = std::thread::scope(|scope| {
        let handles: Vec<_> = concepts
            .iter()
            .map(|concept| {
                scope.spawn(move || {
                    let mut session = Session::new(prepared, config);
                    session.add_root(concept);
                    SroiqStrategy::new().complete(&mut session).unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|handle| handle.join().unwrap()).collect()
    });
    assert_eq!(results, vec![true, false]);
}

#[test]
fn test_definition_with_absorbed_inclusion_fires() {
    init_tracing();
    let r = Role::named("r");
    let body = Concept::exists(r, Concept::atomic("B"));
    let knowledge_base = kb(vec![
        Axiom::EquivalentClasses(vec![Concept::atomic("A"), body.clone()]),
        Axiom::SubClassOf(
            Concept::and(vec![Concept::atomic("A"), Concept::atomic("E")]),
            Concept::atomic("D"),
        ),
        Axiom::ClassAssertion(
            Concept::and(vec![body, Concept::atomic("E"), Concept::not(Concept::atomic("D"))]),
            "x".to_string(),
        ),
    ]);
    let mut reasoner = Reasoner::with_defaults(knowledge_base).unwrap();
    assert!(!reasoner.is_consistent().unwrap());
}

#[test]
fn test_negated_inclusion_on_defined_class_fires() {
    init_tracing();
    let r = Role::named("r");
    let body = Concept::exists(r, Concept::atomic("B"));
    let knowledge_base = kb(vec![
        Axiom::EquivalentClasses(vec![Concept::atomic("A"), body.clone()]),
        Axiom::SubClassOf(Concept::not(Concept::atomic("A")), Concept::atomic("D")),
        Axiom::ClassAssertion(
            Concept::and(vec![Concept::not(body), Concept::not(Concept::atomic("D"))]),
            "x".to_string(),
        ),
    ]);
    let mut reasoner = Reasoner::with_defaults(knowledge_base).unwrap();
    assert!(!reasoner.is_consistent().unwrap());
}

#[test]
fn test_min_cardinality_over_many_asserted_successors_is_bounded() {
    init_tracing();
    let r = Role::named("r");
    let mut axioms = vec![Axiom::ClassAssertion(
        Concept::at_least(12, r.clone(), Concept::Top),
        "a".to_string(),
    )];
    for i in 0..26 {
        axioms.push(Axiom::ObjectPropertyAssertion(r.clone(), "a".to_string(), format!("b{}", i)));
    }
    let config = TableauConfig::default().with_timeout_ms(3000);
    let mut reasoner = Reasoner::new(kb(axioms), config).unwrap();
    assert!(reasoner.is_consistent().unwrap());
}
