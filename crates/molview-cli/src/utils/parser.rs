use molview::core::selection::{Lenient, OneOrMany, ResiValue, Selection, SelectionSpec};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionParseError {
    #[error("Expected 'key=value' but got '{0}'.")]
    MissingSeparator(String),

    #[error("Selection key '{0}' has an empty value.")]
    EmptyValue(String),

    #[error(
        "Unknown selection key '{0}'. Expected one of: model, chain, resi, resn, elem, atom, serial, hetflag, ss, icode."
    )]
    UnknownKey(String),

    #[error("Selection key '{0}' was given more than once.")]
    DuplicateKey(String),

    #[error("Invalid value '{value}' for '{key}': expected {expected}.")]
    InvalidValue {
        key: String,
        value: String,
        expected: &'static str,
    },
}

/// Builds a selection from command-line terms such as `chain=A` or
/// `resi=10-20,42`. Comma-separated values are alternatives; separate terms
/// must all hold. No terms selects every atom.
pub fn parse_selection<S: AsRef<str>>(terms: &[S]) -> Result<Selection, SelectionParseError> {
    parse_selection_spec(terms).map(Selection::from)
}

pub fn parse_selection_spec<S: AsRef<str>>(
    terms: &[S],
) -> Result<SelectionSpec, SelectionParseError> {
    let mut spec = SelectionSpec::default();
    for term in terms {
        let term = term.as_ref().trim();
        let (key, value) = term
            .split_once('=')
            .ok_or_else(|| SelectionParseError::MissingSeparator(term.to_string()))?;
        let key = key.trim().to_ascii_lowercase();
        let values: Vec<&str> = value
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .collect();
        if values.is_empty() {
            return Err(SelectionParseError::EmptyValue(key));
        }
        apply_term(&mut spec, &key, &values)?;
    }
    Ok(spec)
}

fn apply_term(
    spec: &mut SelectionSpec,
    key: &str,
    values: &[&str],
) -> Result<(), SelectionParseError> {
    match key {
        "model" => set_once(&mut spec.model, key, numbers(key, values)?),
        "chain" => set_once(&mut spec.chain, key, strings(values)),
        "resi" => set_once(
            &mut spec.resi,
            key,
            values.iter().map(|v| ResiValue::Text((*v).to_string())).collect(),
        ),
        "resn" => set_once(&mut spec.resn, key, strings(values)),
        "elem" | "element" => set_once(&mut spec.elem, "elem", strings(values)),
        "atom" => set_once(&mut spec.atom, key, strings(values)),
        "serial" => set_once(&mut spec.serial, key, numbers(key, values)?),
        "ss" => set_once(&mut spec.ss, key, strings(values)),
        "icode" => set_once(&mut spec.icode, key, strings(values)),
        "hetflag" => {
            let [value] = values else {
                return Err(invalid(key, &values.join(","), "a single true/false"));
            };
            let flag = value
                .parse::<bool>()
                .map_err(|_| invalid(key, value, "true or false"))?;
            if spec.hetflag.replace(Lenient::Valid(flag)).is_some() {
                return Err(SelectionParseError::DuplicateKey(key.to_string()));
            }
            Ok(())
        }
        other => Err(SelectionParseError::UnknownKey(other.to_string())),
    }
}

fn set_once<T>(
    slot: &mut Option<OneOrMany<T>>,
    key: &str,
    values: Vec<T>,
) -> Result<(), SelectionParseError> {
    if slot.is_some() {
        return Err(SelectionParseError::DuplicateKey(key.to_string()));
    }
    *slot = Some(OneOrMany::Many(values));
    Ok(())
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| (*v).to_string()).collect()
}

fn numbers(key: &str, values: &[&str]) -> Result<Vec<u32>, SelectionParseError> {
    values
        .iter()
        .map(|v| v.parse().map_err(|_| invalid(key, v, "a non-negative integer")))
        .collect()
}

fn invalid(key: &str, value: &str, expected: &'static str) -> SelectionParseError {
    SelectionParseError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        expected,
    }
}
