//! 記述論理の項モデル (概念・ロール・データ範囲)

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// XML Schema datatype IRIs used by literals
pub mod xsd {
    pub const STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
    pub const INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
    pub const BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";
}

/// Role expression: a named property or the inverse of a named object property
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    /// Named object or data property
    Named(String),

    /// Inverse of a named object property: R⁻
    Inverse(String),
}

impl Role {
    pub fn named(name: impl Into<String>) -> Self {
        Role::Named(name.into())
    }

    /// The inverse role expression (R⁻⁻ = R)
    pub fn inverse(&self) -> Role {
        match self {
            Role::Named(name) => Role::Inverse(name.clone()),
            Role::Inverse(name) => Role::Named(name.clone()),
        }
    }

    /// Name of the underlying property
    pub fn name(&self) -> &str {
        match self {
            Role::Named(name) | Role::Inverse(name) => name,
        }
    }

    pub fn is_inverse(&self) -> bool {
        matches!(self, Role::Inverse(_))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Named(name) => write!(f, "{}", name),
            Role::Inverse(name) => write!(f, "{}⁻", name),
        }
    }
}

/// Typed literal value
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Literal {
    pub lexical: String,
    pub datatype: String,
}

impl Literal {
    pub fn new(lexical: impl Into<String>, datatype: impl Into<String>) -> Self {
        Self {
            lexical: lexical.into(),
            datatype: datatype.into(),
        }
    }

    pub fn string(lexical: impl Into<String>) -> Self {
        Self::new(lexical, xsd::STRING)
    }

    pub fn integer(value: i64) -> Self {
        Self::new(value.to_string(), xsd::INTEGER)
    }

    pub fn boolean(value: bool) -> Self {
        Self::new(value.to_string(), xsd::BOOLEAN)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"^^<{}>", self.lexical, self.datatype)
    }
}

/// Data range used as the filler of data property restrictions
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DataRange {
    /// All literals of a datatype
    Datatype(String),

    /// Enumeration of literals
    OneOf(Vec<Literal>),
}

impl DataRange {
    pub fn contains(&self, literal: &Literal) -> bool {
        match self {
            DataRange::Datatype(datatype) => &literal.datatype == datatype,
            DataRange::OneOf(values) => values.contains(literal),
        }
    }

    fn normalized(&self) -> DataRange {
        match self {
            DataRange::Datatype(_) => self.clone(),
            DataRange::OneOf(values) => {
                let set: BTreeSet<Literal> = values.iter().cloned().collect();
                DataRange::OneOf(set.into_iter().collect())
            }
        }
    }
}

impl fmt::Display for DataRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataRange::Datatype(datatype) => write!(f, "<{}>", datatype),
            DataRange::OneOf(values) => {
                let parts: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
        }
    }
}

/// Concept (class expression)
///
/// The engine only ever stores concepts in negation normal form, see [`Concept::nnf`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Concept {
    /// owl:Thing (⊤)
    Top,

    /// owl:Nothing (⊥)
    Bottom,

    /// Named class
    Atomic(String),

    /// Complement: ¬C
    Not(Box<Concept>),

    /// Intersection: C1 ⊓ ... ⊓ Cn
    And(Vec<Concept>),

    /// Union: C1 ⊔ ... ⊔ Cn
    Or(Vec<Concept>),

    /// Existential restriction: ∃R.C
    Exists(Role, Box<Concept>),

    /// Universal restriction: ∀R.C
    ForAll(Role, Box<Concept>),

    /// Minimum cardinality: ≥n R.C
    AtLeast(u32, Role, Box<Concept>),

    /// Maximum cardinality: ≤n R.C
    AtMost(u32, Role, Box<Concept>),

    /// Nominal: {a}
    Nominal(String),

    /// Has value: ∃R.{a}
    HasValue(Role, String),

    /// Local reflexivity: ∃R.Self
    HasSelf(Role),

    /// Data range filler of a data property restriction
    Data(DataRange),
}

impl Concept {
    pub fn atomic(name: impl Into<String>) -> Self {
        Concept::Atomic(name.into())
    }

    pub fn not(concept: Concept) -> Self {
        Concept::Not(Box::new(concept))
    }

    pub fn and(concepts: Vec<Concept>) -> Self {
        Concept::And(concepts)
    }

    pub fn or(concepts: Vec<Concept>) -> Self {
        Concept::Or(concepts)
    }

    pub fn exists(role: Role, filler: Concept) -> Self {
        Concept::Exists(role, Box::new(filler))
    }

    pub fn for_all(role: Role, filler: Concept) -> Self {
        Concept::ForAll(role, Box::new(filler))
    }

    pub fn at_least(n: u32, role: Role, filler: Concept) -> Self {
        Concept::AtLeast(n, role, Box::new(filler))
    }

    pub fn at_most(n: u32, role: Role, filler: Concept) -> Self {
        Concept::AtMost(n, role, Box::new(filler))
    }

    pub fn nominal(individual: impl Into<String>) -> Self {
        Concept::Nominal(individual.into())
    }

    pub fn has_self(role: Role) -> Self {
        Concept::HasSelf(role)
    }

    pub fn data(range: DataRange) -> Self {
        Concept::Data(range)
    }

    /// Negation normal form with flattened, sorted and deduplicated
    /// conjunctions and disjunctions
    pub fn nnf(&self) -> Concept {
        match self {
            Concept::Top
            | Concept::Bottom
            | Concept::Atomic(_)
            | Concept::Nominal(_)
            | Concept::HasSelf(_) => self.clone(),
            Concept::Data(range) => Concept::Data(range.normalized()),
            Concept::HasValue(role, individual) => {
                Concept::exists(role.clone(), Concept::Nominal(individual.clone()))
            }
            Concept::Not(inner) => inner.negate(),
            Concept::And(concepts) => Concept::conjunction(concepts.iter().map(Concept::nnf)),
            Concept::Or(concepts) => Concept::disjunction(concepts.iter().map(Concept::nnf)),
            Concept::Exists(role, filler) => Concept::exists(role.clone(), filler.nnf()),
            Concept::ForAll(role, filler) => Concept::for_all(role.clone(), filler.nnf()),
            Concept::AtLeast(n, role, filler) => match n {
                0 => Concept::Top,
                1 => Concept::exists(role.clone(), filler.nnf()),
                _ => Concept::at_least(*n, role.clone(), filler.nnf()),
            },
            Concept::AtMost(n, role, filler) => {
                if *n == 0 {
                    Concept::for_all(role.clone(), filler.negate())
                } else {
                    Concept::at_most(*n, role.clone(), filler.nnf())
                }
            }
        }
    }

    /// Negation normal form of ¬self
    pub fn negate(&self) -> Concept {
        match self {
            Concept::Top => Concept::Bottom,
            Concept::Bottom => Concept::Top,
            Concept::Atomic(_) | Concept::Nominal(_) | Concept::HasSelf(_) => {
                Concept::not(self.clone())
            }
            Concept::Data(range) => Concept::not(Concept::Data(range.normalized())),
            Concept::Not(inner) => inner.nnf(),
            Concept::HasValue(role, individual) => Concept::for_all(
                role.clone(),
                Concept::not(Concept::Nominal(individual.clone())),
            ),
            Concept::And(concepts) => Concept::disjunction(concepts.iter().map(Concept::negate)),
            Concept::Or(concepts) => Concept::conjunction(concepts.iter().map(Concept::negate)),
            Concept::Exists(role, filler) => Concept::for_all(role.clone(), filler.negate()),
            Concept::ForAll(role, filler) => Concept::exists(role.clone(), filler.negate()),
            Concept::AtLeast(n, role, filler) => {
                if *n == 0 {
                    Concept::Bottom
                } else {
                    Concept::at_most(n - 1, role.clone(), filler.as_ref().clone()).nnf()
                }
            }
            Concept::AtMost(n, role, filler) => {
                Concept::at_least(n + 1, role.clone(), filler.as_ref().clone()).nnf()
            }
        }
    }

    /// Build a normalised conjunction from NNF operands
    pub fn conjunction(operands: impl IntoIterator<Item = Concept>) -> Concept {
        let mut set = BTreeSet::new();
        for operand in operands {
            match operand {
                Concept::Top => {}
                Concept::Bottom => return Concept::Bottom,
                Concept::And(inner) => set.extend(inner),
                other => {
                    set.insert(other);
                }
            }
        }
        match set.len() {
            0 => Concept::Top,
            1 => set.into_iter().next().unwrap_or(Concept::Top),
            _ => Concept::And(set.into_iter().collect()),
        }
    }

    /// Build a normalised disjunction from NNF operands
    pub fn disjunction(operands: impl IntoIterator<Item = Concept>) -> Concept {
        let mut set = BTreeSet::new();
        for operand in operands {
            match operand {
                Concept::Bottom => {}
                Concept::Top => return Concept::Top,
                Concept::Or(inner) => set.extend(inner),
                other => {
                    set.insert(other);
                }
            }
        }
        match set.len() {
            0 => Concept::Bottom,
            1 => set.into_iter().next().unwrap_or(Concept::Bottom),
            _ => Concept::Or(set.into_iter().collect()),
        }
    }

    /// Atomic concept or the negation of one
    pub fn is_literal(&self) -> bool {
        match self {
            Concept::Atomic(_) => true,
            Concept::Not(inner) => matches!(inner.as_ref(), Concept::Atomic(_)),
            _ => false,
        }
    }

    /// Visit this concept and every sub-concept, outermost first
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Concept)) {
        visit(self);
        match self {
            Concept::Not(inner)
            | Concept::Exists(_, inner)
            | Concept::ForAll(_, inner)
            | Concept::AtLeast(_, _, inner)
            | Concept::AtMost(_, _, inner) => inner.walk(visit),
            Concept::And(concepts) | Concept::Or(concepts) => {
                for concept in concepts {
                    concept.walk(visit);
                }
            }
            _ => {}
        }
    }

    /// Named classes mentioned anywhere in this concept
    pub fn atomic_names(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.walk(&mut |c| {
            if let Concept::Atomic(name) = c {
                names.insert(name.clone());
            }
        });
        names
    }

    /// Individuals mentioned in nominals or has-value restrictions
    pub fn nominals(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.walk(&mut |c| match c {
            Concept::Nominal(name) | Concept::HasValue(_, name) => {
                names.insert(name.clone());
            }
            _ => {}
        });
        names
    }

    /// Role expressions used in restrictions
    pub fn roles(&self) -> BTreeSet<Role> {
        let mut roles = BTreeSet::new();
        self.walk(&mut |c| match c {
            Concept::Exists(role, _)
            | Concept::ForAll(role, _)
            | Concept::AtLeast(_, role, _)
            | Concept::AtMost(_, role, _)
            | Concept::HasValue(role, _)
            | Concept::HasSelf(role) => {
                roles.insert(role.clone());
            }
            _ => {}
        });
        roles
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, concepts: &[Concept], sep: &str) -> fmt::Result {
    write!(f, "(")?;
    for (i, concept) in concepts.iter().enumerate() {
        if i > 0 {
            write!(f, " {} ", sep)?;
        }
        write!(f, "{}", concept)?;
    }
    write!(f, ")")
}

impl fmt::Display for Concept {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Concept::Top => write!(f, "⊤"),
            Concept::Bottom => write!(f, "⊥"),
            Concept::Atomic(name) => write!(f, "{}", name),
            Concept::Not(inner) => write!(f, "¬{}", inner),
            Concept::And(concepts) => write_list(f, concepts, "⊓"),
            Concept::Or(concepts) => write_list(f, concepts, "⊔"),
            Concept::Exists(role, filler) => write!(f, "∃{}.{}", role, filler),
            Concept::ForAll(role, filler) => write!(f, "∀{}.{}", role, filler),
            Concept::AtLeast(n, role, filler) => write!(f, "≥{} {}.{}", n, role, filler),
            Concept::AtMost(n, role, filler) => write!(f, "≤{} {}.{}", n, role, filler),
            Concept::Nominal(name) => write!(f, "{{{}}}", name),
            Concept::HasValue(role, name) => write!(f, "∃{}.{{{}}}", role, name),
            Concept::HasSelf(role) => write!(f, "∃{}.Self", role),
            Concept::Data(range) => write!(f, "{}", range),
        }
    }
}
