//! オントロジーローダー (JSON)

use crate::model::Role;
use crate::ontology::{Axiom, KnowledgeBase};
use crate::KbError;
use serde::{Deserialize, Serialize};
use std::io::Read;

/// Ontology loader trait
pub trait OntologyLoader {
    fn load_from_str(&self, source: &str) -> Result<KnowledgeBase, KbError>;

    fn load_from_reader<R: Read>(&self, mut reader: R) -> Result<KnowledgeBase, KbError>
    where
        Self: Sized,
    {
        let mut source = String::new();
        reader
            .read_to_string(&mut source)
            .map_err(|e| KbError::LoaderError(e.to_string()))?;
        self.load_from_str(&source)
    }
}

/// Serialized form of a knowledge base
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OntologyDocument {
    /// Properties to treat as data properties
    pub data_properties: Vec<String>,

    /// Axioms in order; positions become axiom ids
    pub axioms: Vec<Axiom>,
}

impl From<&KnowledgeBase> for OntologyDocument {
    fn from(kb: &KnowledgeBase) -> Self {
        OntologyDocument {
            data_properties: kb.data_properties.iter().cloned().collect(),
            axioms: kb.axioms().map(|(_, axiom)| axiom.clone()).collect(),
        }
    }
}

/// Loader for [`OntologyDocument`] JSON
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonOntologyLoader;

impl OntologyLoader for JsonOntologyLoader {
    fn load_from_str(&self, source: &str) -> Result<KnowledgeBase, KbError> {
        let document: OntologyDocument = serde_json::from_str(source)?;
        build_knowledge_base(document)
    }
}

/// Build a knowledge base from a document, checking entity names and role kinds
pub fn build_knowledge_base(document: OntologyDocument) -> Result<KnowledgeBase, KbError> {
    let mut kb = KnowledgeBase::new();

    for name in &document.data_properties {
        check_name(name)?;
        kb.add_axiom(Axiom::DataProperty(name.clone()));
    }

    for axiom in document.axioms {
        check_axiom(&axiom, &kb)?;
        kb.add_axiom(axiom);
    }

    Ok(kb)
}

fn check_name(name: &str) -> Result<(), KbError> {
    if name.trim().is_empty() {
        return Err(KbError::InvalidAxiom("empty entity name".to_string()));
    }
    Ok(())
}

fn check_role(role: &Role, kb: &KnowledgeBase) -> Result<(), KbError> {
    check_name(role.name())?;
    if role.is_inverse() && kb.is_data_property(role.name()) {
        return Err(KbError::InvalidAxiom(format!(
            "data property {} used as inverse role",
            role.name()
        )));
    }
    Ok(())
}

fn check_axiom(axiom: &Axiom, kb: &KnowledgeBase) -> Result<(), KbError> {
    match axiom {
        Axiom::EquivalentClasses(concepts) | Axiom::DisjointClasses(concepts)
            if concepts.len() < 2 =>
        {
            Err(KbError::InvalidAxiom(format!(
                "class axiom needs at least two operands: {:?}",
                axiom
            )))
        }
        Axiom::SubPropertyOf(sub, sup) => {
            check_role(sub, kb)?;
            check_role(sup, kb)
        }
        Axiom::EquivalentProperties(roles) | Axiom::DisjointProperties(roles) => {
            roles.iter().try_for_each(|role| check_role(role, kb))
        }
        Axiom::ObjectPropertyAssertion(role, subject, object)
        | Axiom::NegativeObjectPropertyAssertion(role, subject, object) => {
            check_role(role, kb)?;
            if kb.is_data_property(role.name()) {
                return Err(KbError::InvalidAxiom(format!(
                    "object assertion on data property {}",
                    role.name()
                )));
            }
            check_name(subject)?;
            check_name(object)
        }
        Axiom::DataPropertyAssertion(property, subject, _) => {
            check_name(property)?;
            check_name(subject)
        }
        Axiom::ClassAssertion(_, individual) => check_name(individual),
        Axiom::SameIndividual(individuals) | Axiom::DifferentIndividuals(individuals) => {
            individuals.iter().try_for_each(|name| check_name(name))
        }
        _ => Ok(()),
    }
}
