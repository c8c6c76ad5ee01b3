use fukurow_kb::{Axiom, KnowledgeBase};

/// Log to the test writer; `RUST_LOG=fukurow_tableau=trace` shows the search
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn kb(axioms: Vec<Axiom>) -> KnowledgeBase {
    let mut kb = KnowledgeBase::new();
    for axiom in axioms {
        kb.add_axiom(axiom);
    }
    kb
}
