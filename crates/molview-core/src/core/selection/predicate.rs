use crate::core::models::atom::{Atom, PropertyValue, SecondaryStructure};
use crate::core::models::ids::ModelId;
use std::fmt;
use std::sync::Arc;

/// An inclusive residue-index range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResidueRange {
    pub start: isize,
    pub end: isize,
}

impl ResidueRange {
    pub fn new(start: isize, end: isize) -> Self {
        Self {
            start: start.min(end),
            end: start.max(end),
        }
    }

    pub fn single(index: isize) -> Self {
        Self::new(index, index)
    }

    pub fn contains(&self, index: isize) -> bool {
        (self.start..=self.end).contains(&index)
    }
}

/// How a property-bag entry is tested.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyTest {
    Exists,
    Equals(PropertyValue),
    /// Inclusive numeric bounds; entries without a numeric view never match.
    Range { min: Option<f64>, max: Option<f64> },
}

impl PropertyTest {
    fn test(&self, value: Option<&PropertyValue>) -> bool {
        let Some(value) = value else {
            return false;
        };
        match self {
            PropertyTest::Exists => true,
            PropertyTest::Equals(expected) => match (expected.as_number(), value.as_number()) {
                (Some(a), Some(b)) => a == b,
                _ => expected == value,
            },
            PropertyTest::Range { min, max } => value.as_number().is_some_and(|v| {
                min.is_none_or(|lo| v >= lo) && max.is_none_or(|hi| v <= hi)
            }),
        }
    }
}

/// A caller-supplied atom predicate.
#[derive(Clone)]
pub struct AtomFilter(Arc<dyn Fn(&Atom) -> bool + Send + Sync>);

impl AtomFilter {
    pub fn new(filter: impl Fn(&Atom) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(filter))
    }
}

impl fmt::Debug for AtomFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AtomFilter(..)")
    }
}

/// A single recognised selection key. List-valued keys match when any entry matches.
#[derive(Debug, Clone)]
pub enum Predicate {
    Model(Vec<ModelId>),
    Chain(Vec<String>),
    Residue(Vec<ResidueRange>),
    ResidueName(Vec<String>),
    Element(Vec<String>),
    AtomName(Vec<String>),
    Serial(Vec<u32>),
    Hetero(bool),
    SecondaryStructure(Vec<SecondaryStructure>),
    InsertionCode(Vec<char>),
    Clickable(bool),
    Property { key: String, test: PropertyTest },
    Custom(AtomFilter),
}

impl Predicate {
    pub fn matches(&self, model: ModelId, atom: &Atom) -> bool {
        match self {
            Predicate::Model(ids) => ids.contains(&model),
            Predicate::Chain(chains) => chains.iter().any(|c| c == &atom.chain),
            Predicate::Residue(ranges) => ranges.iter().any(|r| r.contains(atom.residue_index)),
            Predicate::ResidueName(names) => names
                .iter()
                .any(|n| n.eq_ignore_ascii_case(&atom.residue_name)),
            Predicate::Element(elements) => elements
                .iter()
                .any(|e| e.trim().eq_ignore_ascii_case(&atom.element)),
            Predicate::AtomName(names) => names.iter().any(|n| n == &atom.name),
            Predicate::Serial(serials) => serials.contains(&atom.serial),
            Predicate::Hetero(flag) => atom.hetflag == *flag,
            Predicate::SecondaryStructure(codes) => codes.contains(&atom.secondary_structure),
            Predicate::InsertionCode(codes) => {
                atom.insertion_code.is_some_and(|c| codes.contains(&c))
            }
            Predicate::Clickable(flag) => atom.clickable == *flag,
            Predicate::Property { key, test } => test.test(atom.property(key)),
            Predicate::Custom(filter) => (filter.0)(atom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    const M: ModelId = ModelId(0);

    fn sample_atom() -> Atom {
        let mut atom = Atom::new("CA", "C", Point3::origin()).with_residue("LYS", 42, "A");
        atom.serial = 17;
        atom.insertion_code = Some('B');
        atom.secondary_structure = SecondaryStructure::Helix;
        atom.set_property("charge", 0.25);
        atom.set_property("tag", "active");
        atom
    }

    #[test]
    fn residue_range_is_inclusive_and_order_insensitive() {
        let range = ResidueRange::new(20, 10);
        assert_eq!(range.start, 10);
        assert!(range.contains(10));
        assert!(range.contains(20));
        assert!(!range.contains(21));
        assert!(ResidueRange::single(5).contains(5));
    }

    #[test]
    fn identity_predicates() {
        let atom = sample_atom();
        assert!(Predicate::Chain(vec!["B".into(), "A".into()]).matches(M, &atom));
        assert!(!Predicate::Chain(vec!["a".into()]).matches(M, &atom));
        assert!(Predicate::ResidueName(vec!["lys".into()]).matches(M, &atom));
        assert!(Predicate::Element(vec!["c".into()]).matches(M, &atom));
        assert!(Predicate::AtomName(vec!["CA".into()]).matches(M, &atom));
        assert!(Predicate::Serial(vec![1, 17]).matches(M, &atom));
        assert!(Predicate::Hetero(false).matches(M, &atom));
        assert!(Predicate::Residue(vec![ResidueRange::new(40, 45)]).matches(M, &atom));
        assert!(Predicate::InsertionCode(vec!['B']).matches(M, &atom));
        assert!(Predicate::SecondaryStructure(vec![SecondaryStructure::Helix]).matches(M, &atom));
        assert!(!Predicate::Clickable(true).matches(M, &atom));
    }

    #[test]
    fn empty_lists_match_nothing() {
        let atom = sample_atom();
        assert!(!Predicate::Chain(vec![]).matches(M, &atom));
        assert!(!Predicate::Residue(vec![]).matches(M, &atom));
    }

    #[test]
    fn property_tests() {
        let atom = sample_atom();
        let prop = |key: &str, test| Predicate::Property {
            key: key.to_string(),
            test,
        };
        assert!(prop("charge", PropertyTest::Exists).matches(M, &atom));
        assert!(!prop("missing", PropertyTest::Exists).matches(M, &atom));
        assert!(prop("charge", PropertyTest::Equals(PropertyValue::Number(0.25))).matches(M, &atom));
        assert!(prop("tag", PropertyTest::Equals("active".into())).matches(M, &atom));
        assert!(
            prop(
                "charge",
                PropertyTest::Range {
                    min: Some(0.0),
                    max: Some(0.5)
                }
            )
            .matches(M, &atom)
        );
        assert!(
            !prop(
                "tag",
                PropertyTest::Range {
                    min: None,
                    max: None
                }
            )
            .matches(M, &atom)
        );
    }
}
