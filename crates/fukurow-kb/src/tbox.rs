//! TBox: 遅延展開テーブルと内部化された一般包含公理

use crate::model::Concept;
use crate::ontology::{Axiom, AxiomId, KnowledgeBase};
use std::collections::{BTreeMap, BTreeSet};

/// Concept definitions prepared for the tableau
///
/// Inclusions with a named class on the left become lazy unfolding entries;
/// everything else is internalised into a universal concept that every
/// individual node must satisfy. Negations unfold lazily only for sole,
/// acyclic definitions: `¬A ⊑ D` alone must hold wherever `A` is absent
/// from a label, so it is internalised as `A ⊔ D`.
#[derive(Debug, Clone, Default)]
pub struct TBox {
    /// A → consequences of A ∈ L(x)
    unfold: BTreeMap<String, Vec<(Concept, AxiomId)>>,

    /// A → ¬C for a sole definition A ≡ C
    unfold_negated: BTreeMap<String, Vec<(Concept, AxiomId)>>,

    /// Concepts every individual must satisfy
    universal: Vec<(Concept, AxiomId)>,
}

struct Definition {
    name: String,
    body: Concept,
    id: AxiomId,
}

impl TBox {
    pub fn build(kb: &KnowledgeBase) -> Self {
        let mut tbox = TBox::default();
        let mut definitions: Vec<Definition> = Vec::new();

        for (id, axiom) in kb.axioms() {
            match axiom {
                Axiom::SubClassOf(sub, sup) => tbox.add_inclusion(&sub.nnf(), &sup.nnf(), id),
                Axiom::EquivalentClasses(concepts) => {
                    tbox.add_equivalence(concepts, id, &mut definitions);
                }
                Axiom::DisjointClasses(concepts) => tbox.add_disjointness(concepts, id),
                _ => {}
            }
        }

        // Sole, acyclic definitions may also unfold their negation lazily;
        // all other definitions need the reverse inclusion as a GCI.
        for definition in definitions {
            if tbox.is_sole(&definition) && !tbox.reaches(&definition.body, &definition.name) {
                tbox.unfold_negated
                    .entry(definition.name.clone())
                    .or_default()
                    .push((definition.body.negate(), definition.id));
            } else {
                let reverse = Concept::disjunction([
                    definition.body.negate(),
                    Concept::Atomic(definition.name.clone()),
                ]);
                tbox.universal.push((reverse, definition.id));
            }
        }

        tbox
    }

    /// The definition is the only entry unfolded from its name
    ///
    /// Absorbed inclusions, disjointness and atomic equivalences all land in
    /// the unfolding table, so any second entry disqualifies the name.
    fn is_sole(&self, definition: &Definition) -> bool {
        let own = (definition.body.clone(), definition.id);
        let positive = self.unfold.get(&definition.name).map(Vec::as_slice).unwrap_or(&[]);
        positive == [own].as_slice() && !self.unfold_negated.contains_key(&definition.name)
    }

    fn add_inclusion(&mut self, sub: &Concept, sup: &Concept, id: AxiomId) {
        match sub {
            Concept::Bottom => {}
            Concept::Top => self.universal.push((sup.clone(), id)),
            Concept::Atomic(name) => {
                self.unfold.entry(name.clone()).or_default().push((sup.clone(), id));
            }
            Concept::And(conjuncts) => {
                // A ⊓ E ⊑ D is absorbed into A ⊑ ¬E ⊔ D
                let absorbed = conjuncts.iter().position(|c| matches!(c, Concept::Atomic(_)));
                match absorbed {
                    Some(index) => {
                        let rest: Vec<Concept> = conjuncts
                            .iter()
                            .enumerate()
                            .filter(|(i, _)| *i != index)
                            .map(|(_, c)| c.clone())
                            .collect();
                        let body = Concept::disjunction([
                            Concept::conjunction(rest).negate(),
                            sup.clone(),
                        ]);
                        self.add_inclusion(&conjuncts[index], &body, id);
                    }
                    None => self.add_gci(sub, sup, id),
                }
            }
            _ => self.add_gci(sub, sup, id),
        }
    }

    fn add_gci(&mut self, sub: &Concept, sup: &Concept, id: AxiomId) {
        let internalised = Concept::disjunction([sub.negate(), sup.clone()]);
        if internalised != Concept::Top {
            self.universal.push((internalised, id));
        }
    }

    fn add_equivalence(
        &mut self,
        concepts: &[Concept],
        id: AxiomId,
        definitions: &mut Vec<Definition>,
    ) {
        let normalized: Vec<Concept> = concepts.iter().map(Concept::nnf).collect();
        let Some(anchor) = normalized.iter().position(|c| matches!(c, Concept::Atomic(_))) else {
            // no named class: pairwise GCIs in both directions
            for pair in normalized.windows(2) {
                self.add_gci(&pair[0], &pair[1], id);
                self.add_gci(&pair[1], &pair[0], id);
            }
            return;
        };
        let Concept::Atomic(name) = &normalized[anchor] else {
            return;
        };

        for (i, other) in normalized.iter().enumerate() {
            if i == anchor {
                continue;
            }
            match other {
                Concept::Atomic(_) => {
                    // A ≡ B unfolds both ways
                    self.add_inclusion(&normalized[anchor], other, id);
                    self.add_inclusion(other, &normalized[anchor], id);
                }
                body => {
                    self.add_inclusion(&normalized[anchor], body, id);
                    definitions.push(Definition {
                        name: name.clone(),
                        body: body.clone(),
                        id,
                    });
                }
            }
        }
    }

    fn add_disjointness(&mut self, concepts: &[Concept], id: AxiomId) {
        let normalized: Vec<Concept> = concepts.iter().map(Concept::nnf).collect();
        for (i, first) in normalized.iter().enumerate() {
            for second in &normalized[i + 1..] {
                match (first, second) {
                    (Concept::Atomic(_), _) => self.add_inclusion(first, &second.negate(), id),
                    (_, Concept::Atomic(_)) => self.add_inclusion(second, &first.negate(), id),
                    _ => self.universal.push((
                        Concept::disjunction([first.negate(), second.negate()]),
                        id,
                    )),
                }
            }
        }
    }

    /// Does unfolding `concept` ever reach the named class `target`
    fn reaches(&self, concept: &Concept, target: &str) -> bool {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<String> = concept.atomic_names().into_iter().collect();
        while let Some(name) = stack.pop() {
            if name == target {
                return true;
            }
            if !seen.insert(name.clone()) {
                continue;
            }
            let entries = self
                .unfold
                .get(&name)
                .into_iter()
                .chain(self.unfold_negated.get(&name))
                .flatten();
            for (body, _) in entries {
                stack.extend(body.atomic_names());
            }
        }
        false
    }

    /// Lazy unfolding consequences of a type in a node label
    pub fn unfold(&self, concept: &Concept) -> &[(Concept, AxiomId)] {
        let entries = match concept {
            Concept::Atomic(name) => self.unfold.get(name),
            Concept::Not(inner) => match inner.as_ref() {
                Concept::Atomic(name) => self.unfold_negated.get(name),
                _ => None,
            },
            _ => None,
        };
        entries.map(Vec::as_slice).unwrap_or(&[])
    }

    /// Internalised general inclusions
    pub fn universal(&self) -> &[(Concept, AxiomId)] {
        &self.universal
    }

    pub fn has_general_inclusions(&self) -> bool {
        !self.universal.is_empty()
    }

    /// Every concept reachable from the TBox, for expressivity analysis
    pub fn concepts(&self) -> impl Iterator<Item = &Concept> {
        self.unfold
            .values()
            .chain(self.unfold_negated.values())
            .flatten()
            .chain(self.universal.iter())
            .map(|(concept, _)| concept)
    }
}
