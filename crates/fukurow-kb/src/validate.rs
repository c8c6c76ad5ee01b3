//! 未対応公理の検証

use crate::model::{Concept, Role};
use crate::ontology::{Axiom, AxiomId, KnowledgeBase};
use crate::rbox::RBox;
use crate::KbError;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// What to do with axioms the tableau rules cannot handle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnsupportedPolicy {
    /// Fail with `KbError::UnsupportedFeature`
    #[default]
    Fail,

    /// Disable the offending axiom and log a warning
    Ignore,
}

/// Check every enabled axiom against the supported fragment
///
/// Returns the ids of the axioms disabled under `UnsupportedPolicy::Ignore`.
pub fn validate(kb: &mut KnowledgeBase, policy: UnsupportedPolicy) -> Result<Vec<AxiomId>, KbError> {
    let rbox = RBox::build(kb);
    let offending: Vec<(AxiomId, String)> = kb
        .axioms()
        .filter_map(|(id, axiom)| unsupported_reason(axiom, &rbox).map(|reason| (id, reason)))
        .collect();

    let mut disabled = Vec::new();
    for (id, reason) in offending {
        match policy {
            UnsupportedPolicy::Fail => {
                return Err(KbError::UnsupportedFeature(format!("axiom {}: {}", id, reason)));
            }
            UnsupportedPolicy::Ignore => {
                warn!(axiom = %id, reason = %reason, "Ignoring unsupported axiom");
                kb.disable(id);
                disabled.push(id);
            }
        }
    }

    Ok(disabled)
}

fn unsupported_reason(axiom: &Axiom, rbox: &RBox) -> Option<String> {
    let non_simple = |role: &Role| !rbox.is_simple(role);

    match axiom {
        Axiom::SubPropertyChain(chain, sup) => {
            let chain: Vec<String> = chain.iter().map(|r| r.to_string()).collect();
            return Some(format!("property chain {} ⊑ {}", chain.join(" ∘ "), sup));
        }
        Axiom::FunctionalProperty(role) | Axiom::InverseFunctionalProperty(role)
            if non_simple(role) =>
        {
            return Some(format!("functional non-simple role {}", role));
        }
        Axiom::IrreflexiveProperty(role) | Axiom::AsymmetricProperty(role) if non_simple(role) => {
            return Some(format!("irreflexive or asymmetric non-simple role {}", role));
        }
        Axiom::DisjointProperties(roles) => {
            if let Some(role) = roles.iter().find(|role| non_simple(role)) {
                return Some(format!("disjoint non-simple role {}", role));
            }
        }
        Axiom::ObjectPropertyAssertion(role, ..) | Axiom::NegativeObjectPropertyAssertion(role, ..)
            if rbox.is_data_role(role) =>
        {
            return Some(format!("object assertion on data property {}", role));
        }
        _ => {}
    }

    axiom
        .concepts()
        .into_iter()
        .find_map(|concept| unsupported_in_concept(&concept.nnf(), rbox))
}

fn unsupported_in_concept(concept: &Concept, rbox: &RBox) -> Option<String> {
    let mut reason = None;
    concept.walk(&mut |c| {
        if reason.is_some() {
            return;
        }
        match c {
            Concept::AtLeast(_, role, _) | Concept::AtMost(_, role, _) if !rbox.is_simple(role) => {
                reason = Some(format!("cardinality on non-simple role {}", role));
            }
            Concept::HasSelf(role) if !rbox.is_simple(role) => {
                reason = Some(format!("self restriction on non-simple role {}", role));
            }
            Concept::Exists(role, _)
            | Concept::ForAll(role, _)
            | Concept::AtLeast(_, role, _)
            | Concept::AtMost(_, role, _)
                if role.is_inverse() && rbox.is_data_role(role) =>
            {
                reason = Some(format!("inverse of data property {}", role.name()));
            }
            _ => {}
        }
    });
    reason
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transitive_kb() -> KnowledgeBase {
        let mut kb = KnowledgeBase::new();
        kb.add_axiom(Axiom::TransitiveProperty(Role::named("ancestorOf")));
        kb.add_axiom(Axiom::SubClassOf(
            Concept::atomic("Person"),
            Concept::at_most(2, Role::named("ancestorOf"), Concept::Top),
        ));
        kb
    }

    #[test]
    fn test_fail_policy() {
        let mut kb = transitive_kb();
        let result = validate(&mut kb, UnsupportedPolicy::Fail);
        assert!(matches!(result, Err(KbError::UnsupportedFeature(_))));
    }

    #[test]
    fn test_ignore_policy_disables_axiom() {
        let mut kb = transitive_kb();
        let disabled = validate(&mut kb, UnsupportedPolicy::Ignore).unwrap();

        assert_eq!(disabled, vec![AxiomId(1)]);
        assert!(kb.is_disabled(AxiomId(1)));
        assert_eq!(kb.axioms().count(), 1);
    }

    #[test]
    fn test_property_chain_unsupported() {
        let mut kb = KnowledgeBase::new();
        kb.add_axiom(Axiom::SubPropertyChain(
            vec![Role::named("hasParent"), Role::named("hasBrother")],
            Role::named("hasUncle"),
        ));
        assert!(validate(&mut kb, UnsupportedPolicy::Fail).is_err());
    }

    #[test]
    fn test_simple_roles_pass() {
        let mut kb = KnowledgeBase::new();
        kb.add_axiom(Axiom::FunctionalProperty(Role::named("hasMother")));
        kb.add_axiom(Axiom::SubClassOf(
            Concept::atomic("Person"),
            Concept::at_most(1, Role::named("hasMother"), Concept::Top),
        ));
        assert_eq!(validate(&mut kb, UnsupportedPolicy::Fail).unwrap(), Vec::<AxiomId>::new());
    }

    #[test]
    fn test_policy_serde() {
        let policy: UnsupportedPolicy = serde_json::from_str("\"ignore\"").unwrap();
        assert_eq!(policy, UnsupportedPolicy::Ignore);
    }
}
