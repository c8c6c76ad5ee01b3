//! RBox: ロール階層とロール特性

use crate::model::{Concept, Role};
use crate::ontology::{Axiom, AxiomId, KnowledgeBase};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Role hierarchy and role characteristics
///
/// Every named object property contributes two role expressions (R and R⁻);
/// data properties only contribute their named form. The hierarchy is the
/// reflexive-transitive closure of the told sub-role relation, which makes
/// `R ⊑ S` imply `R⁻ ⊑ S⁻`.
#[derive(Debug, Clone, Default)]
pub struct RBox {
    /// Role expression → all super roles (including itself)
    supers: BTreeMap<Role, BTreeSet<Role>>,

    /// Role expression → all sub roles (including itself)
    subs: BTreeMap<Role, BTreeSet<Role>>,

    /// Subject-side concepts implied by an edge of the role
    domains: BTreeMap<Role, Vec<(Concept, AxiomId)>>,

    /// Object-side concepts implied by an edge of the role
    ranges: BTreeMap<Role, Vec<(Concept, AxiomId)>>,

    functional: BTreeMap<Role, AxiomId>,
    transitive: BTreeMap<String, AxiomId>,
    reflexive: BTreeMap<String, AxiomId>,
    irreflexive: BTreeMap<String, AxiomId>,
    disjoint: BTreeMap<Role, Vec<(Role, AxiomId)>>,

    object_roles: BTreeSet<String>,
    data_roles: BTreeSet<String>,
}

impl RBox {
    /// Build the RBox from the enabled axioms of a knowledge base
    pub fn build(kb: &KnowledgeBase) -> Self {
        let mut rbox = RBox {
            object_roles: kb.object_properties.clone(),
            data_roles: kb.data_properties.clone(),
            ..Default::default()
        };

        let mut told: Vec<(Role, Role)> = Vec::new();

        for (id, axiom) in kb.axioms() {
            match axiom {
                Axiom::SubPropertyOf(sub, sup) => told.push((sub.clone(), sup.clone())),
                Axiom::EquivalentProperties(roles) => {
                    for pair in roles.windows(2) {
                        told.push((pair[0].clone(), pair[1].clone()));
                        told.push((pair[1].clone(), pair[0].clone()));
                    }
                }
                Axiom::InverseProperties(p, q) => {
                    let p = Role::named(p.as_str());
                    let q = Role::named(q.as_str());
                    told.push((p.clone(), q.inverse()));
                    told.push((q.inverse(), p));
                }
                Axiom::SymmetricProperty(role) => {
                    told.push((role.clone(), role.inverse()));
                    told.push((role.inverse(), role.clone()));
                }
                Axiom::PropertyDomain(role, concept) => {
                    rbox.push_domain(role, concept.nnf(), id);
                }
                Axiom::PropertyRange(role, concept) => {
                    rbox.push_range(role, concept.nnf(), id);
                }
                Axiom::FunctionalProperty(role) => {
                    rbox.functional.insert(role.clone(), id);
                }
                Axiom::InverseFunctionalProperty(role) => {
                    rbox.functional.insert(role.inverse(), id);
                }
                Axiom::TransitiveProperty(role) => {
                    rbox.transitive.insert(role.name().to_string(), id);
                }
                Axiom::ReflexiveProperty(role) => {
                    rbox.reflexive.insert(role.name().to_string(), id);
                }
                Axiom::IrreflexiveProperty(role) => {
                    rbox.irreflexive.insert(role.name().to_string(), id);
                }
                Axiom::AsymmetricProperty(role) => {
                    rbox.push_disjoint(role, &role.inverse(), id);
                }
                Axiom::DisjointProperties(roles) => {
                    for (i, p) in roles.iter().enumerate() {
                        for q in &roles[i + 1..] {
                            rbox.push_disjoint(p, q, id);
                        }
                    }
                }
                _ => {}
            }
        }

        rbox.compute_hierarchy(&told);
        rbox
    }

    fn is_object_role(&self, role: &Role) -> bool {
        !self.data_roles.contains(role.name())
    }

    fn push_domain(&mut self, role: &Role, concept: Concept, id: AxiomId) {
        self.domains.entry(role.clone()).or_default().push((concept.clone(), id));
        if self.is_object_role(role) {
            self.ranges.entry(role.inverse()).or_default().push((concept, id));
        }
    }

    fn push_range(&mut self, role: &Role, concept: Concept, id: AxiomId) {
        self.ranges.entry(role.clone()).or_default().push((concept.clone(), id));
        if self.is_object_role(role) {
            self.domains.entry(role.inverse()).or_default().push((concept, id));
        }
    }

    fn push_disjoint(&mut self, p: &Role, q: &Role, id: AxiomId) {
        self.disjoint.entry(p.clone()).or_default().push((q.clone(), id));
        self.disjoint.entry(q.clone()).or_default().push((p.clone(), id));
        if self.is_object_role(p) && self.is_object_role(q) {
            self.disjoint.entry(p.inverse()).or_default().push((q.inverse(), id));
            self.disjoint.entry(q.inverse()).or_default().push((p.inverse(), id));
        }
    }

    fn compute_hierarchy(&mut self, told: &[(Role, Role)]) {
        let mut direct: BTreeMap<Role, BTreeSet<Role>> = BTreeMap::new();
        for (sub, sup) in told {
            direct.entry(sub.clone()).or_default().insert(sup.clone());
            if self.is_object_role(sub) && self.is_object_role(sup) {
                direct.entry(sub.inverse()).or_default().insert(sup.inverse());
            }
        }

        let mut universe: BTreeSet<Role> = BTreeSet::new();
        for name in &self.object_roles {
            universe.insert(Role::named(name.as_str()));
            universe.insert(Role::Inverse(name.clone()));
        }
        for name in &self.data_roles {
            universe.insert(Role::named(name.as_str()));
        }
        for (sub, sups) in &direct {
            universe.insert(sub.clone());
            universe.extend(sups.iter().cloned());
        }

        for role in &universe {
            let mut seen = BTreeSet::new();
            let mut queue = VecDeque::from([role.clone()]);
            while let Some(current) = queue.pop_front() {
                if !seen.insert(current.clone()) {
                    continue;
                }
                if let Some(next) = direct.get(&current) {
                    queue.extend(next.iter().cloned());
                }
            }
            for sup in &seen {
                self.subs.entry(sup.clone()).or_default().insert(role.clone());
            }
            self.supers.insert(role.clone(), seen);
        }
    }

    /// All super roles of `role`, including `role` itself
    pub fn super_roles(&self, role: &Role) -> BTreeSet<Role> {
        self.supers
            .get(role)
            .cloned()
            .unwrap_or_else(|| BTreeSet::from([role.clone()]))
    }

    /// All sub roles of `role`, including `role` itself
    pub fn sub_roles(&self, role: &Role) -> BTreeSet<Role> {
        self.subs
            .get(role)
            .cloned()
            .unwrap_or_else(|| BTreeSet::from([role.clone()]))
    }

    pub fn is_sub_role(&self, sub: &Role, sup: &Role) -> bool {
        sub == sup
            || self
                .supers
                .get(sub)
                .map(|supers| supers.contains(sup))
                .unwrap_or(false)
    }

    /// Told domains of exactly this role expression
    pub fn domains(&self, role: &Role) -> &[(Concept, AxiomId)] {
        self.domains.get(role).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Told ranges of exactly this role expression
    pub fn ranges(&self, role: &Role) -> &[(Concept, AxiomId)] {
        self.ranges.get(role).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn functional(&self, role: &Role) -> Option<AxiomId> {
        self.functional.get(role).copied()
    }

    pub fn transitive(&self, role: &Role) -> Option<AxiomId> {
        self.transitive.get(role.name()).copied()
    }

    pub fn reflexive_roles(&self) -> impl Iterator<Item = (Role, AxiomId)> + '_ {
        self.reflexive
            .iter()
            .map(|(name, id)| (Role::named(name.as_str()), *id))
    }

    pub fn irreflexive_roles(&self) -> impl Iterator<Item = (Role, AxiomId)> + '_ {
        self.irreflexive
            .iter()
            .map(|(name, id)| (Role::named(name.as_str()), *id))
    }

    /// Roles declared disjoint with exactly this role expression
    pub fn disjoint_roles(&self, role: &Role) -> &[(Role, AxiomId)] {
        self.disjoint.get(role).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Transitive roles that are sub roles of `role`
    pub fn transitive_sub_roles(&self, role: &Role) -> Vec<Role> {
        self.sub_roles(role)
            .into_iter()
            .filter(|sub| self.transitive(sub).is_some())
            .collect()
    }

    /// A role is simple if it has no transitive sub role
    pub fn is_simple(&self, role: &Role) -> bool {
        self.transitive_sub_roles(role).is_empty()
    }

    pub fn is_data_role(&self, role: &Role) -> bool {
        self.data_roles.contains(role.name())
    }

    pub fn has_transitive_roles(&self) -> bool {
        !self.transitive.is_empty()
    }

    pub fn has_functional_roles(&self) -> bool {
        !self.functional.is_empty()
    }

    pub fn has_disjoint_roles(&self) -> bool {
        !self.disjoint.is_empty()
    }

    pub fn has_reflexive_roles(&self) -> bool {
        !self.reflexive.is_empty() || !self.irreflexive.is_empty()
    }

    /// Any told sub-role relation that is not reflexive
    pub fn has_hierarchy(&self) -> bool {
        self.supers.values().any(|supers| supers.len() > 1)
    }

    /// Any inverse role forced into the hierarchy by inverse or symmetric axioms
    pub fn has_inverse_axioms(&self) -> bool {
        self.supers.iter().any(|(role, supers)| {
            supers
                .iter()
                .any(|sup| sup.is_inverse() != role.is_inverse())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(name: &str) -> Role {
        Role::named(name)
    }

    #[test]
    fn test_hierarchy_closure() {
        let mut kb = KnowledgeBase::new();
        kb.add_axiom(Axiom::SubPropertyOf(r("hasSon"), r("hasChild")));
        kb.add_axiom(Axiom::SubPropertyOf(r("hasChild"), r("hasDescendant")));
        let rbox = RBox::build(&kb);

        assert!(rbox.is_sub_role(&r("hasSon"), &r("hasDescendant")));
        assert!(rbox.is_sub_role(&r("hasSon").inverse(), &r("hasDescendant").inverse()));
        assert!(!rbox.is_sub_role(&r("hasDescendant"), &r("hasSon")));
        assert!(rbox.sub_roles(&r("hasDescendant")).contains(&r("hasSon")));
    }

    #[test]
    fn test_inverse_properties() {
        let mut kb = KnowledgeBase::new();
        kb.add_axiom(Axiom::InverseProperties(
            "hasParent".to_string(),
            "hasChild".to_string(),
        ));
        let rbox = RBox::build(&kb);

        assert!(rbox.is_sub_role(&r("hasParent"), &r("hasChild").inverse()));
        assert!(rbox.is_sub_role(&r("hasChild"), &r("hasParent").inverse()));
        assert!(rbox.has_inverse_axioms());
    }

    #[test]
    fn test_domain_range_inverse_sides() {
        let mut kb = KnowledgeBase::new();
        let id = kb.add_axiom(Axiom::PropertyDomain(r("teaches"), Concept::atomic("Teacher")));
        let rbox = RBox::build(&kb);

        assert_eq!(rbox.domains(&r("teaches")), &[(Concept::atomic("Teacher"), id)]);
        assert_eq!(
            rbox.ranges(&r("teaches").inverse()),
            &[(Concept::atomic("Teacher"), id)]
        );
    }

    #[test]
    fn test_simple_roles() {
        let mut kb = KnowledgeBase::new();
        kb.add_axiom(Axiom::TransitiveProperty(r("partOf")));
        kb.add_axiom(Axiom::SubPropertyOf(r("partOf"), r("locatedIn")));
        let rbox = RBox::build(&kb);

        assert!(!rbox.is_simple(&r("locatedIn")));
        assert!(!rbox.is_simple(&r("partOf").inverse()));
        assert!(rbox.is_simple(&r("unrelated")));
    }

    #[test]
    fn test_asymmetric_is_self_disjoint() {
        let mut kb = KnowledgeBase::new();
        kb.add_axiom(Axiom::AsymmetricProperty(r("parentOf")));
        let rbox = RBox::build(&kb);

        assert!(rbox
            .disjoint_roles(&r("parentOf"))
            .iter()
            .any(|(role, _)| role == &r("parentOf").inverse()));
    }
}
