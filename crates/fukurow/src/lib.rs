//! # 🦉 Fukurow - SROIQ(D) Tableau Reasoning Stack
//!
//! Fukurow decides consistency of OWL 2 DL (SROIQ(D)) knowledge bases with a
//! tableau completion engine, and answers the queries built on top of it.
//!
//! ## Features
//!
//! - **Dependency-directed backtracking**: clashes jump straight back to the choice they depend on
//! - **Merge / prune / restore**: node aliasing that is rolled back exactly on backtracking
//! - **Blocking**: subset, equality and pairwise blocking chosen by expressivity
//! - **Explanations**: the axioms a clash depends on
//! - **Satisfiability cache**: reused across classification queries
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fukurow::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut kb = KnowledgeBase::new();
//!     kb.add_axiom(Axiom::SubClassOf(Concept::atomic("Dog"), Concept::atomic("Animal")));
//!     kb.add_axiom(Axiom::ClassAssertion(Concept::atomic("Dog"), "rex".to_string()));
//!
//!     let mut reasoner = Reasoner::with_defaults(kb)?;
//!     assert!(reasoner.is_consistent()?);
//!     assert!(reasoner.is_instance_of("rex", &Concept::atomic("Animal"))?);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **`fukurow-kb`**: concepts, axioms, RBox/TBox indexes, expressivity and validation
//! - **`fukurow-tableau`**: completion graph, rules, strategies and the `Reasoner` facade
//!
//! ## Feature Flags
//!
//! - `full` (default): all crates included
//! - `kb`: knowledge base model only
//! - `tableau`: tableau engine (implies `kb`)

#[cfg(feature = "fukurow-kb")]
pub use fukurow_kb as kb;

#[cfg(feature = "fukurow-tableau")]
pub use fukurow_tableau as tableau;

// Convenience re-exports for common types (feature-gated)
#[cfg(feature = "fukurow-kb")]
pub use fukurow_kb::{Axiom, Concept, KbError, KnowledgeBase, Role};

#[cfg(feature = "fukurow-tableau")]
pub use fukurow_tableau::{Reasoner, TableauConfig, TableauError};

// Commonly used external dependencies
pub use serde;
pub use serde_json;
pub use anyhow;

/// Prelude module for convenient imports
///
/// ```rust
/// use fukurow::prelude::*;
/// ```
pub mod prelude {
    #[cfg(feature = "fukurow-kb")]
    pub use fukurow_kb::{
        Axiom, AxiomId, Concept, DataRange, JsonOntologyLoader, KbError, KnowledgeBase, Literal,
        OntologyLoader, Role, UnsupportedPolicy,
    };

    #[cfg(feature = "fukurow-tableau")]
    pub use fukurow_tableau::{
        CompletionResult, Reasoner, RestoreMode, StrategyKind, TableauConfig, TableauError,
    };

    // Common external types
    pub use serde::{Deserialize, Serialize};
    pub use serde_json::Value;
    pub use anyhow::Result;
}

/// Load a JSON ontology document and prepare a reasoner for it
#[cfg(feature = "fukurow-tableau")]
pub fn load_reasoner(source: &str, config: TableauConfig) -> Result<Reasoner, TableauError> {
    use fukurow_kb::OntologyLoader;

    let kb = fukurow_kb::JsonOntologyLoader.load_from_str(source)?;
    tracing::debug!(axioms = kb.len(), "Ontology loaded");
    Reasoner::new(kb, config)
}

// Version information
/// Current version of Fukurow
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Health check function
///
/// Runs a consistency check on a two-axiom knowledge base and reports the
/// modules compiled in.
pub fn health_check() -> serde_json::Value {
    #[cfg(feature = "fukurow-tableau")]
    let reasoner_ok = {
        let mut kb = KnowledgeBase::new();
        kb.add_axiom(Axiom::DisjointClasses(vec![Concept::atomic("A"), Concept::atomic("B")]));
        kb.add_axiom(Axiom::ClassAssertion(Concept::atomic("A"), "a".to_string()));
        Reasoner::with_defaults(kb)
            .and_then(|mut reasoner| reasoner.is_consistent())
            .unwrap_or(false)
    };
    #[cfg(not(feature = "fukurow-tableau"))]
    let reasoner_ok = false;

    serde_json::json!({
        "status": if reasoner_ok || cfg!(not(feature = "fukurow-tableau")) { "healthy" } else { "degraded" },
        "version": VERSION,
        "modules": {
            "kb": cfg!(feature = "fukurow-kb"),
            "tableau": cfg!(feature = "fukurow-tableau")
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_check() {
        let health = health_check();
        assert_eq!(health["status"], "healthy");
        assert_eq!(health["version"], VERSION);
    }

    #[test]
    fn test_version_constant() {
        assert!(!VERSION.is_empty());
        assert!(VERSION.chars().all(|c| c.is_ascii_digit() || c == '.'));
    }

    #[cfg(feature = "fukurow-tableau")]
    #[test]
    fn test_load_reasoner() {
        let json = r#"{
            "axioms": [
                {"SubClassOf": [{"Atomic": "Student"}, {"Atomic": "Person"}]},
                {"ClassAssertion": [{"Atomic": "Student"}, "john"]}
            ]
        }"#;
        let mut reasoner = load_reasoner(json, TableauConfig::default()).unwrap();
        assert!(reasoner.is_instance_of("john", &Concept::atomic("Person")).unwrap());
    }

    #[cfg(feature = "fukurow-tableau")]
    #[test]
    fn test_load_reasoner_rejects_malformed_json() {
        let result = load_reasoner("{\"axioms\": [1]}", TableauConfig::default());
        assert!(matches!(result, Err(TableauError::Kb(KbError::LoaderError(_)))));
    }
}
