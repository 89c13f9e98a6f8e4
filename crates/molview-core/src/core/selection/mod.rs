//! Declarative atom selections.
//!
//! A [`Selection`] is pure data: evaluating it never mutates atoms, never fails, and an
//! empty selection matches everything. [`SelectionSpec`] is the serde-facing form with a
//! fixed set of recognised keys; unrecognised keys are ignored rather than excluding atoms.

mod predicate;
mod spec;

pub use predicate::{AtomFilter, Predicate, PropertyTest, ResidueRange};
pub use spec::{Lenient, OneOrMany, PropertySpec, ResiValue, SelectionSpec};

use crate::core::models::atom::Atom;
use crate::core::models::ids::ModelId;

#[derive(Debug, Clone, Default)]
pub enum Selection {
    /// Matches every atom.
    #[default]
    All,
    /// Matches atoms satisfying every predicate; an empty list matches everything.
    Where(Vec<Predicate>),
    And(Vec<Selection>),
    Or(Vec<Selection>),
    Not(Box<Selection>),
}

impl Selection {
    pub fn all() -> Self {
        Selection::All
    }

    /// Matches no atom.
    pub fn none() -> Self {
        Selection::Or(Vec::new())
    }

    pub fn by(predicate: Predicate) -> Self {
        Selection::Where(vec![predicate])
    }

    pub fn model(id: ModelId) -> Self {
        Self::by(Predicate::Model(vec![id]))
    }

    pub fn chain(chain: &str) -> Self {
        Self::by(Predicate::Chain(vec![chain.to_string()]))
    }

    pub fn element(element: &str) -> Self {
        Self::by(Predicate::Element(vec![element.to_string()]))
    }

    pub fn residue_name(name: &str) -> Self {
        Self::by(Predicate::ResidueName(vec![name.to_string()]))
    }

    pub fn residues(start: isize, end: isize) -> Self {
        Self::by(Predicate::Residue(vec![ResidueRange::new(start, end)]))
    }

    pub fn serials(serials: impl IntoIterator<Item = u32>) -> Self {
        Self::by(Predicate::Serial(serials.into_iter().collect()))
    }

    pub fn custom(filter: impl Fn(&Atom) -> bool + Send + Sync + 'static) -> Self {
        Self::by(Predicate::Custom(AtomFilter::new(filter)))
    }

    pub fn and(self, other: Selection) -> Self {
        match self {
            Selection::All => other,
            Selection::And(mut parts) => {
                parts.push(other);
                Selection::And(parts)
            }
            s => Selection::And(vec![s, other]),
        }
    }

    pub fn or(self, other: Selection) -> Self {
        match self {
            Selection::Or(mut parts) => {
                parts.push(other);
                Selection::Or(parts)
            }
            s => Selection::Or(vec![s, other]),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Selection::Not(Box::new(self))
    }

    /// Whether the selection trivially matches every atom.
    pub fn is_all(&self) -> bool {
        match self {
            Selection::All => true,
            Selection::Where(predicates) => predicates.is_empty(),
            Selection::And(parts) => parts.iter().all(Selection::is_all),
            _ => false,
        }
    }

    /// Evaluates the selection for one atom of model `model`.
    pub fn matches(&self, model: ModelId, atom: &Atom) -> bool {
        match self {
            Selection::All => true,
            Selection::Where(predicates) => predicates.iter().all(|p| p.matches(model, atom)),
            Selection::And(parts) => parts.iter().all(|s| s.matches(model, atom)),
            Selection::Or(parts) => parts.iter().any(|s| s.matches(model, atom)),
            Selection::Not(inner) => !inner.matches(model, atom),
        }
    }

    /// Whether the selection can match atoms of `model` at all, judged by model predicates only.
    pub fn may_touch_model(&self, model: ModelId) -> bool {
        match self {
            Selection::All => true,
            Selection::Where(predicates) => predicates.iter().all(|p| match p {
                Predicate::Model(ids) => ids.contains(&model),
                _ => true,
            }),
            Selection::And(parts) => parts.iter().all(|s| s.may_touch_model(model)),
            Selection::Or(parts) => parts.iter().any(|s| s.may_touch_model(model)),
            Selection::Not(_) => true,
        }
    }
}

impl From<Predicate> for Selection {
    fn from(predicate: Predicate) -> Self {
        Selection::by(predicate)
    }
}
