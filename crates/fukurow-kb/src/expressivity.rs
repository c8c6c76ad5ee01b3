//! 表現力解析

use crate::model::{Concept, Role};
use crate::ontology::{Axiom, KnowledgeBase};
use crate::rbox::RBox;
use crate::tbox::TBox;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Language features used by a knowledge base or query concept
///
/// Drives the choice of expansion rules and blocking method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expressivity {
    /// Disjunction or full negation (C)
    pub disjunction: bool,
    /// Inverse roles (I)
    pub inverses: bool,
    /// Nominals (O)
    pub nominals: bool,
    /// Number restrictions (N)
    pub cardinality: bool,
    /// Qualified number restrictions (Q)
    pub qualified_cardinality: bool,
    /// Functional roles (F)
    pub functionality: bool,
    /// Transitive roles (S)
    pub transitivity: bool,
    /// Role hierarchy (H)
    pub role_hierarchy: bool,
    /// Disjoint, reflexive, irreflexive or asymmetric roles (R)
    pub complex_roles: bool,
    /// Sub-property chains (R)
    pub role_chains: bool,
    /// Local reflexivity ∃R.Self
    pub self_restriction: bool,
    /// Datatypes (D)
    pub datatypes: bool,
    /// Number restrictions on data properties
    pub data_cardinality: bool,
    /// Internalised general concept inclusions
    pub general_inclusions: bool,
}

impl Expressivity {
    /// Analyse the enabled axioms of a knowledge base
    pub fn analyze(kb: &KnowledgeBase, rbox: &RBox, tbox: &TBox) -> Self {
        let mut expressivity = Expressivity {
            inverses: rbox.has_inverse_axioms(),
            functionality: rbox.has_functional_roles(),
            transitivity: rbox.has_transitive_roles(),
            role_hierarchy: rbox.has_hierarchy(),
            complex_roles: rbox.has_disjoint_roles() || rbox.has_reflexive_roles(),
            general_inclusions: tbox.has_general_inclusions(),
            ..Default::default()
        };

        for (_, axiom) in kb.axioms() {
            match axiom {
                Axiom::SubPropertyChain(..) => expressivity.role_chains = true,
                Axiom::ObjectPropertyAssertion(role, ..) => {
                    expressivity.inverses |= role.is_inverse();
                }
                Axiom::NegativeObjectPropertyAssertion(role, ..) => {
                    // encoded as a : ∀R.¬{b}
                    expressivity.inverses |= role.is_inverse();
                    expressivity.nominals = true;
                    expressivity.disjunction = true;
                }
                Axiom::DataPropertyAssertion(..) => expressivity.datatypes = true,
                Axiom::PropertyDomain(role, _)
                | Axiom::PropertyRange(role, _)
                | Axiom::FunctionalProperty(role)
                | Axiom::InverseFunctionalProperty(role) => {
                    expressivity.inverses |= role.is_inverse()
                        || matches!(axiom, Axiom::InverseFunctionalProperty(_));
                    expressivity.datatypes |= rbox.is_data_role(role);
                }
                _ => {}
            }
            for concept in axiom.concepts() {
                expressivity.merge(&Expressivity::of_concept_with(&concept.nnf(), Some(rbox)));
            }
        }

        // ¬C ⊔ D for general inclusions is disjunctive even if told concepts are not
        if expressivity.general_inclusions {
            expressivity.disjunction = true;
        }
        for concept in tbox.concepts() {
            expressivity.merge(&Expressivity::of_concept_with(concept, Some(rbox)));
        }

        expressivity
    }

    /// Features used by a single (query) concept
    pub fn of_concept(concept: &Concept) -> Self {
        Self::of_concept_with(&concept.nnf(), None)
    }

    fn of_concept_with(concept: &Concept, rbox: Option<&RBox>) -> Self {
        let mut expressivity = Expressivity::default();
        let is_data = |role: &Role, filler: &Concept| {
            matches!(filler, Concept::Data(_))
                || matches!(filler, Concept::Not(inner) if matches!(inner.as_ref(), Concept::Data(_)))
                || rbox.map(|rbox| rbox.is_data_role(role)).unwrap_or(false)
        };

        concept.walk(&mut |c| match c {
            Concept::Or(_) => expressivity.disjunction = true,
            Concept::Not(inner) => {
                expressivity.disjunction |= !matches!(inner.as_ref(), Concept::Atomic(_));
                expressivity.nominals |= matches!(inner.as_ref(), Concept::Nominal(_));
                expressivity.self_restriction |= matches!(inner.as_ref(), Concept::HasSelf(_));
            }
            Concept::Exists(role, filler) | Concept::ForAll(role, filler) => {
                expressivity.inverses |= role.is_inverse();
                expressivity.datatypes |= is_data(role, filler);
            }
            Concept::AtLeast(_, role, filler) | Concept::AtMost(_, role, filler) => {
                expressivity.inverses |= role.is_inverse();
                if is_data(role, filler) {
                    expressivity.datatypes = true;
                    expressivity.data_cardinality = true;
                } else {
                    expressivity.cardinality = true;
                    expressivity.qualified_cardinality |= filler.as_ref() != &Concept::Top;
                }
            }
            Concept::Nominal(_) | Concept::HasValue(..) => expressivity.nominals = true,
            Concept::HasSelf(role) => {
                expressivity.self_restriction = true;
                expressivity.inverses |= role.is_inverse();
            }
            Concept::Data(_) => expressivity.datatypes = true,
            _ => {}
        });

        expressivity
    }

    /// Combine with the features of another source
    pub fn merge(&mut self, other: &Expressivity) {
        self.disjunction |= other.disjunction;
        self.inverses |= other.inverses;
        self.nominals |= other.nominals;
        self.cardinality |= other.cardinality;
        self.qualified_cardinality |= other.qualified_cardinality;
        self.functionality |= other.functionality;
        self.transitivity |= other.transitivity;
        self.role_hierarchy |= other.role_hierarchy;
        self.complex_roles |= other.complex_roles;
        self.role_chains |= other.role_chains;
        self.self_restriction |= other.self_restriction;
        self.datatypes |= other.datatypes;
        self.data_cardinality |= other.data_cardinality;
        self.general_inclusions |= other.general_inclusions;
    }

    pub fn union(mut self, other: &Expressivity) -> Self {
        self.merge(other);
        self
    }

    /// Cardinality of any kind, including functional roles
    pub fn has_number_restrictions(&self) -> bool {
        self.cardinality || self.functionality || self.data_cardinality
    }

    /// Standard DL name, e.g. `SHOIQ(D)`
    pub fn dl_name(&self) -> String {
        let mut name = String::new();
        if self.transitivity {
            name.push('S');
        } else if self.disjunction {
            name.push_str("ALC");
        } else {
            name.push_str("AL");
        }
        if self.role_chains || self.complex_roles || self.self_restriction {
            name.push('R');
        } else if self.role_hierarchy {
            name.push('H');
        }
        if self.nominals {
            name.push('O');
        }
        if self.inverses {
            name.push('I');
        }
        if self.qualified_cardinality {
            name.push('Q');
        } else if self.cardinality {
            name.push('N');
        } else if self.functionality {
            name.push('F');
        }
        if self.datatypes {
            name.push_str("(D)");
        }
        name
    }
}

impl fmt::Display for Expressivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dl_name())
    }
}
