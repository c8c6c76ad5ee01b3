//! 公理と知識ベース

use crate::model::{Concept, Literal, Role};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Stable identifier of an axiom within its knowledge base
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AxiomId(pub usize);

impl fmt::Display for AxiomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// SROIQ(D) axiom
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axiom {
    /// C ⊑ D
    SubClassOf(Concept, Concept),

    /// C1 ≡ ... ≡ Cn
    EquivalentClasses(Vec<Concept>),

    /// Pairwise disjoint classes
    DisjointClasses(Vec<Concept>),

    /// R ⊑ S
    SubPropertyOf(Role, Role),

    /// R1 ≡ ... ≡ Rn
    EquivalentProperties(Vec<Role>),

    /// R ≡ S⁻
    InverseProperties(String, String),

    /// ∃R.⊤ ⊑ C
    PropertyDomain(Role, Concept),

    /// ⊤ ⊑ ∀R.C
    PropertyRange(Role, Concept),

    FunctionalProperty(Role),

    InverseFunctionalProperty(Role),

    TransitiveProperty(Role),

    SymmetricProperty(Role),

    AsymmetricProperty(Role),

    ReflexiveProperty(Role),

    IrreflexiveProperty(Role),

    /// Pairwise disjoint properties
    DisjointProperties(Vec<Role>),

    /// R1 ∘ ... ∘ Rn ⊑ S
    SubPropertyChain(Vec<Role>, Role),

    /// Data property declaration
    DataProperty(String),

    /// a : C
    ClassAssertion(Concept, String),

    /// (a, b) : R
    ObjectPropertyAssertion(Role, String, String),

    /// (a, b) : ¬R
    NegativeObjectPropertyAssertion(Role, String, String),

    /// (a, v) : U
    DataPropertyAssertion(String, String, Literal),

    SameIndividual(Vec<String>),

    DifferentIndividuals(Vec<String>),
}

impl Axiom {
    /// Concepts appearing in this axiom
    pub fn concepts(&self) -> Vec<&Concept> {
        match self {
            Axiom::SubClassOf(sub, sup) => vec![sub, sup],
            Axiom::EquivalentClasses(concepts) | Axiom::DisjointClasses(concepts) => {
                concepts.iter().collect()
            }
            Axiom::PropertyDomain(_, concept)
            | Axiom::PropertyRange(_, concept)
            | Axiom::ClassAssertion(concept, _) => vec![concept],
            _ => Vec::new(),
        }
    }

    /// Is this an ABox assertion
    pub fn is_assertion(&self) -> bool {
        matches!(
            self,
            Axiom::ClassAssertion(..)
                | Axiom::ObjectPropertyAssertion(..)
                | Axiom::NegativeObjectPropertyAssertion(..)
                | Axiom::DataPropertyAssertion(..)
                | Axiom::SameIndividual(..)
                | Axiom::DifferentIndividuals(..)
        )
    }
}

/// Knowledge base: the axioms plus their signature
///
/// Axiom ids are positions in insertion order and never change; axioms
/// rejected by validation are disabled rather than removed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeBase {
    /// All axioms in insertion order
    axioms: Vec<Axiom>,

    /// Axioms switched off by validation
    disabled: BTreeSet<AxiomId>,

    /// All named classes mentioned
    pub classes: BTreeSet<String>,

    /// All object properties mentioned
    pub object_properties: BTreeSet<String>,

    /// All data properties mentioned or declared
    pub data_properties: BTreeSet<String>,

    /// All individuals mentioned
    pub individuals: BTreeSet<String>,
}

impl KnowledgeBase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_axiom(&mut self, axiom: Axiom) -> AxiomId {
        match &axiom {
            Axiom::SubPropertyOf(sub, sup) => {
                self.add_role(sub);
                self.add_role(sup);
            }
            Axiom::EquivalentProperties(roles) | Axiom::DisjointProperties(roles) => {
                for role in roles {
                    self.add_role(role);
                }
            }
            Axiom::SubPropertyChain(chain, sup) => {
                for role in chain {
                    self.add_role(role);
                }
                self.add_role(sup);
            }
            Axiom::InverseProperties(p, q) => {
                self.object_properties.insert(p.clone());
                self.object_properties.insert(q.clone());
            }
            Axiom::PropertyDomain(role, _)
            | Axiom::PropertyRange(role, _)
            | Axiom::FunctionalProperty(role)
            | Axiom::InverseFunctionalProperty(role)
            | Axiom::TransitiveProperty(role)
            | Axiom::SymmetricProperty(role)
            | Axiom::AsymmetricProperty(role)
            | Axiom::ReflexiveProperty(role)
            | Axiom::IrreflexiveProperty(role) => self.add_role(role),
            Axiom::DataProperty(name) => {
                self.object_properties.remove(name);
                self.data_properties.insert(name.clone());
            }
            Axiom::ClassAssertion(_, individual) => {
                self.individuals.insert(individual.clone());
            }
            Axiom::ObjectPropertyAssertion(role, subject, object)
            | Axiom::NegativeObjectPropertyAssertion(role, subject, object) => {
                self.add_role(role);
                self.individuals.insert(subject.clone());
                self.individuals.insert(object.clone());
            }
            Axiom::DataPropertyAssertion(property, subject, _) => {
                self.object_properties.remove(property);
                self.data_properties.insert(property.clone());
                self.individuals.insert(subject.clone());
            }
            Axiom::SameIndividual(individuals) | Axiom::DifferentIndividuals(individuals) => {
                self.individuals.extend(individuals.iter().cloned());
            }
            Axiom::SubClassOf(..) | Axiom::EquivalentClasses(..) | Axiom::DisjointClasses(..) => {}
        }

        for concept in axiom.concepts() {
            self.collect_concept(concept);
        }

        self.axioms.push(axiom);
        AxiomId(self.axioms.len() - 1)
    }

    fn add_role(&mut self, role: &Role) {
        if !self.data_properties.contains(role.name()) {
            self.object_properties.insert(role.name().to_string());
        }
    }

    fn collect_concept(&mut self, concept: &Concept) {
        self.classes.extend(concept.atomic_names());
        self.individuals.extend(concept.nominals());
        let mut data_roles = Vec::new();
        concept.walk(&mut |c| match c {
            Concept::Exists(role, filler)
            | Concept::ForAll(role, filler)
            | Concept::AtLeast(_, role, filler)
            | Concept::AtMost(_, role, filler) => {
                if matches!(filler.as_ref(), Concept::Data(_))
                    || matches!(filler.as_ref(), Concept::Not(inner) if matches!(inner.as_ref(), Concept::Data(_)))
                {
                    data_roles.push(role.name().to_string());
                }
            }
            _ => {}
        });
        for role in concept.roles() {
            self.add_role(&role);
        }
        for name in data_roles {
            self.object_properties.remove(&name);
            self.data_properties.insert(name);
        }
    }

    pub fn axiom(&self, id: AxiomId) -> Option<&Axiom> {
        self.axioms.get(id.0)
    }

    /// Enabled axioms with their ids, in insertion order
    pub fn axioms(&self) -> impl Iterator<Item = (AxiomId, &Axiom)> + '_ {
        self.axioms
            .iter()
            .enumerate()
            .map(|(i, axiom)| (AxiomId(i), axiom))
            .filter(move |(id, _)| !self.disabled.contains(id))
    }

    pub fn len(&self) -> usize {
        self.axioms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.axioms.is_empty()
    }

    /// Switch an axiom off; it keeps its id but no longer takes part in reasoning
    pub fn disable(&mut self, id: AxiomId) {
        self.disabled.insert(id);
    }

    pub fn is_disabled(&self, id: AxiomId) -> bool {
        self.disabled.contains(&id)
    }

    pub fn disabled(&self) -> impl Iterator<Item = AxiomId> + '_ {
        self.disabled.iter().copied()
    }

    pub fn is_data_property(&self, name: &str) -> bool {
        self.data_properties.contains(name)
    }
}
