use super::format::Format;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("{format} parse error on line {line}: {kind}")]
    Parse {
        format: Format,
        line: usize,
        kind: ParseErrorKind,
    },
    #[error("{format} data is missing a required record: {record}")]
    MissingRecord { format: Format, record: String },
    #[error("Unknown structure format '{0}' (expected pdb, sdf, xyz, mol2 or cube)")]
    UnknownFormat(String),
}

impl ParseError {
    pub(crate) fn at(format: Format, line: usize, kind: ParseErrorKind) -> Self {
        ParseError::Parse { format, line, kind }
    }
}

#[derive(Debug, Error)]
pub enum ParseErrorKind {
    #[error("Invalid integer in {field} (value: '{value}')")]
    InvalidInt { field: String, value: String },
    #[error("Invalid number in {field} (value: '{value}')")]
    InvalidFloat { field: String, value: String },
    #[error("Required field {field} is empty")]
    MissingRequiredField { field: String },
    #[error("Line is too short for this record (need at least {min} characters)")]
    LineTooShort { min: usize },
    #[error("CONECT record requires at least two atoms")]
    InvalidConectFormat,
    #[error("Bond references unknown atom {0}")]
    UnknownBondTarget(i64),
    #[error("Expected {expected} records, found {found}")]
    CountMismatch { expected: usize, found: usize },
    #[error("Unsupported variant: {0}")]
    Unsupported(String),
}

pub(crate) fn parse_f64(format: Format, line: usize, field: &str, value: &str) -> Result<f64, ParseError> {
    if value.is_empty() {
        return Err(ParseError::at(
            format,
            line,
            ParseErrorKind::MissingRequiredField {
                field: field.to_string(),
            },
        ));
    }
    value.parse().map_err(|_| {
        ParseError::at(
            format,
            line,
            ParseErrorKind::InvalidFloat {
                field: field.to_string(),
                value: value.to_string(),
            },
        )
    })
}

pub(crate) fn parse_int<T: std::str::FromStr>(
    format: Format,
    line: usize,
    field: &str,
    value: &str,
) -> Result<T, ParseError> {
    value.parse().map_err(|_| {
        ParseError::at(
            format,
            line,
            ParseErrorKind::InvalidInt {
                field: field.to_string(),
                value: value.to_string(),
            },
        )
    })
}
