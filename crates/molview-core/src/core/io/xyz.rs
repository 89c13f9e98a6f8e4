use super::error::{ParseError, ParseErrorKind, parse_f64, parse_int};
use super::format::Format;
use super::traits::{ParsedStructure, StructureReader};
use crate::core::models::atom::Atom;
use nalgebra::Point3;
use std::io::BufRead;

const FORMAT: Format = Format::Xyz;

pub struct XyzFile;

impl StructureReader for XyzFile {
    /// Reads the first frame: an atom count, a comment line, then `element x y z` lines.
    fn read_from(reader: &mut impl BufRead) -> Result<ParsedStructure, ParseError> {
        let mut lines = reader.lines().enumerate();

        let (count, count_line) = loop {
            match lines.next() {
                Some((i, line)) => {
                    let line = line?;
                    let trimmed = line.trim();
                    if !trimmed.is_empty() {
                        break (parse_int::<usize>(FORMAT, i + 1, "atom count", trimmed)?, i + 1);
                    }
                }
                None => {
                    return Err(ParseError::MissingRecord {
                        format: FORMAT,
                        record: "atom count".into(),
                    });
                }
            }
        };
        // Comment line.
        if let Some((_, line)) = lines.next() {
            line?;
        }

        let mut atoms = Vec::with_capacity(count);
        for (i, line) in lines.take(count) {
            let line = line?;
            let line_num = i + 1;
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 4 {
                return Err(ParseError::at(
                    FORMAT,
                    line_num,
                    ParseErrorKind::MissingRequiredField {
                        field: "element x y z".into(),
                    },
                ));
            }
            let position = Point3::new(
                parse_f64(FORMAT, line_num, "x", fields[1])?,
                parse_f64(FORMAT, line_num, "y", fields[2])?,
                parse_f64(FORMAT, line_num, "z", fields[3])?,
            );
            let mut atom = Atom::new(fields[0], fields[0], position);
            atom.serial = atoms.len() as u32 + 1;
            atoms.push(atom);
        }

        if atoms.len() != count {
            return Err(ParseError::at(
                FORMAT,
                count_line,
                ParseErrorKind::CountMismatch {
                    expected: count,
                    found: atoms.len(),
                },
            ));
        }

        Ok(ParsedStructure {
            atoms,
            bonds: Vec::new(),
            infer_bonds: true,
        })
    }
}
