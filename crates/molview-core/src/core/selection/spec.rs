use super::predicate::{Predicate, PropertyTest, ResidueRange};
use super::Selection;
use crate::core::models::atom::{PropertyValue, SecondaryStructure};
use crate::core::models::ids::ModelId;
use serde::Deserialize;
use serde::de::IgnoredAny;
use std::collections::BTreeMap;

/// A value that may be given either alone or as a list. Anything else lands in
/// `Malformed` and yields no values.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
    Malformed(IgnoredAny),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(v) => vec![v],
            OneOrMany::Many(v) => v,
            OneOrMany::Malformed(_) => Vec::new(),
        }
    }
}

/// A scalar value, or anything else under the same key.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Lenient<T> {
    Valid(T),
    Malformed(IgnoredAny),
}

/// A residue index or a textual range such as `"10-20"` or `"-5--1"`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ResiValue {
    Index(i64),
    Text(String),
}

impl ResiValue {
    fn to_range(&self) -> Option<ResidueRange> {
        match self {
            ResiValue::Index(i) => Some(ResidueRange::single(*i as isize)),
            ResiValue::Text(text) => parse_residue_range(text),
        }
    }
}

fn parse_residue_range(text: &str) -> Option<ResidueRange> {
    let text = text.trim();
    if let Ok(single) = text.parse::<isize>() {
        return Some(ResidueRange::single(single));
    }
    // The separator is the first '-' that is not a leading sign.
    let split_at = text
        .char_indices()
        .skip(1)
        .find(|(_, c)| *c == '-')
        .map(|(i, _)| i)?;
    let start = text[..split_at].trim().parse().ok()?;
    let end = text[split_at + 1..].trim().parse().ok()?;
    Some(ResidueRange::new(start, end))
}

/// A property test as written in a selection spec: a bare value tests equality,
/// a `{ min, max }` table tests a numeric range, and `{}` tests existence.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PropertySpec {
    Value(PropertyValue),
    Range { min: Option<f64>, max: Option<f64> },
    Malformed(IgnoredAny),
}

impl PropertySpec {
    /// The test this entry stands for; `None` when it can match nothing.
    fn into_test(self) -> Option<PropertyTest> {
        match self {
            PropertySpec::Value(v) => Some(PropertyTest::Equals(v)),
            PropertySpec::Range {
                min: None,
                max: None,
            } => Some(PropertyTest::Exists),
            PropertySpec::Range { min, max } => Some(PropertyTest::Range { min, max }),
            PropertySpec::Malformed(_) => None,
        }
    }
}

/// Serde-facing selection with the recognised key set. Unknown keys are ignored.
///
/// Malformed values under a recognised predicate key (an unparsable `resi` range,
/// `chain = 5`, `hetflag = "yes"`) never fail deserialization; that key then
/// matches no atoms. `and`, `or` and `not` must hold tables.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SelectionSpec {
    pub model: Option<OneOrMany<u32>>,
    pub chain: Option<OneOrMany<String>>,
    pub resi: Option<OneOrMany<ResiValue>>,
    pub resn: Option<OneOrMany<String>>,
    #[serde(alias = "element")]
    pub elem: Option<OneOrMany<String>>,
    pub atom: Option<OneOrMany<String>>,
    pub serial: Option<OneOrMany<u32>>,
    pub hetflag: Option<Lenient<bool>>,
    pub ss: Option<OneOrMany<String>>,
    pub icode: Option<OneOrMany<String>>,
    pub clickable: Option<Lenient<bool>>,
    pub properties: Option<BTreeMap<String, PropertySpec>>,
    pub and: Option<Vec<SelectionSpec>>,
    pub or: Option<Vec<SelectionSpec>>,
    pub not: Option<Box<SelectionSpec>>,
}

impl From<SelectionSpec> for Selection {
    fn from(spec: SelectionSpec) -> Self {
        let mut predicates = Vec::new();
        let mut malformed = false;

        if let Some(models) = spec.model {
            predicates.push(Predicate::Model(
                models.into_vec().into_iter().map(ModelId).collect(),
            ));
        }
        if let Some(chains) = spec.chain {
            predicates.push(Predicate::Chain(chains.into_vec()));
        }
        if let Some(resi) = spec.resi {
            predicates.push(Predicate::Residue(
                resi.into_vec().iter().filter_map(ResiValue::to_range).collect(),
            ));
        }
        if let Some(names) = spec.resn {
            predicates.push(Predicate::ResidueName(names.into_vec()));
        }
        if let Some(elements) = spec.elem {
            predicates.push(Predicate::Element(elements.into_vec()));
        }
        if let Some(names) = spec.atom {
            predicates.push(Predicate::AtomName(names.into_vec()));
        }
        if let Some(serials) = spec.serial {
            predicates.push(Predicate::Serial(serials.into_vec()));
        }
        match spec.hetflag {
            Some(Lenient::Valid(flag)) => predicates.push(Predicate::Hetero(flag)),
            Some(Lenient::Malformed(_)) => malformed = true,
            None => {}
        }
        if let Some(codes) = spec.ss {
            predicates.push(Predicate::SecondaryStructure(
                codes
                    .into_vec()
                    .iter()
                    .filter_map(|c| c.parse::<SecondaryStructure>().ok())
                    .collect(),
            ));
        }
        if let Some(codes) = spec.icode {
            predicates.push(Predicate::InsertionCode(
                codes
                    .into_vec()
                    .iter()
                    .filter_map(|c| c.trim().chars().next())
                    .collect(),
            ));
        }
        match spec.clickable {
            Some(Lenient::Valid(flag)) => predicates.push(Predicate::Clickable(flag)),
            Some(Lenient::Malformed(_)) => malformed = true,
            None => {}
        }
        for (key, test) in spec.properties.unwrap_or_default() {
            match test.into_test() {
                Some(test) => predicates.push(Predicate::Property { key, test }),
                None => malformed = true,
            }
        }

        let mut selection = Selection::Where(predicates);
        if malformed {
            selection = selection.and(Selection::none());
        }
        if let Some(parts) = spec.and {
            for part in parts {
                selection = selection.and(part.into());
            }
        }
        if let Some(parts) = spec.or {
            let alternatives: Vec<Selection> = parts.into_iter().map(Into::into).collect();
            if !alternatives.is_empty() {
                selection = selection.and(Selection::Or(alternatives));
            }
        }
        if let Some(inner) = spec.not {
            selection = selection.and(Selection::from(*inner).not());
        }
        selection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::Atom;
    use nalgebra::Point3;

    const M: ModelId = ModelId(0);

    fn parse(toml_src: &str) -> Selection {
        let spec: SelectionSpec = toml::from_str(toml_src).unwrap();
        spec.into()
    }

    fn atom(element: &str, chain: &str, resi: isize) -> Atom {
        Atom::new("X", element, Point3::origin()).with_residue("GLY", resi, chain)
    }

    #[test]
    fn residue_range_strings_parse() {
        assert_eq!(parse_residue_range("10-20"), Some(ResidueRange::new(10, 20)));
        assert_eq!(parse_residue_range("-5"), Some(ResidueRange::single(-5)));
        assert_eq!(parse_residue_range("-5--1"), Some(ResidueRange::new(-5, -1)));
        assert_eq!(parse_residue_range("abc"), None);
    }

    #[test]
    fn empty_spec_matches_everything() {
        let sel = parse("");
        assert!(sel.is_all());
        assert!(sel.matches(M, &atom("C", "A", 1)));
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let sel = parse("chain = \"A\"\ncolorfunc = \"whatever\"\n[bogus]\nx = 1\n");
        assert!(sel.matches(M, &atom("C", "A", 1)));
        assert!(!sel.matches(M, &atom("C", "B", 1)));
    }

    #[test]
    fn scalar_and_list_forms_are_equivalent() {
        let one = parse("elem = \"O\"");
        let many = parse("elem = [\"O\", \"N\"]");
        let oxygen = atom("O", "A", 1);
        assert!(one.matches(M, &oxygen));
        assert!(many.matches(M, &oxygen));
        assert!(many.matches(M, &atom("N", "A", 1)));
        assert!(!one.matches(M, &atom("N", "A", 1)));
    }

    #[test]
    fn resi_accepts_numbers_and_ranges() {
        let sel = parse("resi = [3, \"10-12\"]");
        assert!(sel.matches(M, &atom("C", "A", 3)));
        assert!(sel.matches(M, &atom("C", "A", 11)));
        assert!(!sel.matches(M, &atom("C", "A", 5)));
    }

    #[test]
    fn malformed_resi_matches_nothing() {
        let sel = parse("resi = \"ten\"");
        assert!(!sel.matches(M, &atom("C", "A", 10)));
    }

    #[test]
    fn wrongly_typed_values_match_nothing() {
        for source in [
            "chain = 5",
            "elem = { symbol = \"C\" }",
            "resi = 1.5",
            "model = \"first\"",
            "serial = [1, \"two\"]",
            "hetflag = \"yes\"",
            "clickable = 1",
        ] {
            let sel = parse(source);
            assert!(!sel.matches(M, &atom("C", "A", 1)), "{source} matched");
        }
    }

    #[test]
    fn malformed_property_values_match_nothing() {
        let sel = parse("[properties]\ncharge = [[1.0]]");
        let mut a = atom("C", "A", 1);
        a.set_property("charge", 1.0);
        assert!(!sel.matches(M, &a));
    }

    #[test]
    fn malformed_keys_do_not_spoil_the_rest_of_an_or() {
        let sel = parse(
            r#"
            [[or]]
            chain = 5
            [[or]]
            elem = "C"
            "#,
        );
        assert!(sel.matches(M, &atom("C", "B", 1)));
        assert!(!sel.matches(M, &atom("O", "B", 1)));
    }

    #[test]
    fn boolean_combinators_from_spec() {
        let sel = parse(
            r#"
            chain = "A"
            [[or]]
            elem = "O"
            [[or]]
            resi = 7
            [not]
            resi = "100-200"
            "#,
        );
        assert!(sel.matches(M, &atom("O", "A", 1)));
        assert!(sel.matches(M, &atom("C", "A", 7)));
        assert!(!sel.matches(M, &atom("C", "A", 1)));
        assert!(!sel.matches(M, &atom("O", "A", 150)));
        assert!(!sel.matches(M, &atom("O", "B", 1)));
    }

    #[test]
    fn property_specs_map_to_tests() {
        let sel = parse(
            r#"
            [properties]
            charge = { min = 0.0, max = 1.0 }
            tag = "ring"
            flagged = {}
            "#,
        );
        let mut a = atom("C", "A", 1);
        a.set_property("charge", 0.5);
        a.set_property("tag", "ring");
        a.set_property("flagged", true);
        assert!(sel.matches(M, &a));
        a.set_property("charge", 2.0);
        assert!(!sel.matches(M, &a));
    }

    #[test]
    fn model_key_filters_models() {
        let sel = parse("model = [1, 2]");
        assert!(sel.matches(ModelId(2), &atom("C", "A", 1)));
        assert!(!sel.matches(ModelId(0), &atom("C", "A", 1)));
    }
}
