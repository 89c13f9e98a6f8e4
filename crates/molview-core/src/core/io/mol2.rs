use super::error::{ParseError, ParseErrorKind, parse_f64, parse_int};
use super::format::Format;
use super::traits::{ParsedStructure, StructureReader};
use crate::core::models::atom::Atom;
use crate::core::models::model::BatchBond;
use crate::core::models::topology::BondOrder;
use nalgebra::Point3;
use std::collections::HashMap;
use std::io::BufRead;

const FORMAT: Format = Format::Mol2;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    Other,
    Atom,
    Bond,
}

pub struct Mol2File;

/// Splits a substructure name such as `ALA12` into residue name and number.
fn split_substructure(name: &str) -> (&str, Option<isize>) {
    let split = name
        .char_indices()
        .find(|(_, c)| c.is_ascii_digit() || *c == '-')
        .map(|(i, _)| i)
        .unwrap_or(name.len());
    (&name[..split], name[split..].parse().ok())
}

impl StructureReader for Mol2File {
    /// Reads the first molecule of a Tripos MOL2 file.
    ///
    /// The SYBYL atom type prefix gives the element; substructure columns give residue data
    /// and the charge column is kept as the `partial_charge` property.
    fn read_from(reader: &mut impl BufRead) -> Result<ParsedStructure, ParseError> {
        let mut section = Section::Other;
        let mut molecules_seen = 0;
        let mut atoms = Vec::new();
        let mut ids: HashMap<i64, usize> = HashMap::new();
        let mut bonds = Vec::new();

        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            let line_num = i + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            if let Some(tag) = trimmed.strip_prefix("@<TRIPOS>") {
                section = match tag {
                    "MOLECULE" => {
                        molecules_seen += 1;
                        if molecules_seen > 1 {
                            break;
                        }
                        Section::Other
                    }
                    "ATOM" => Section::Atom,
                    "BOND" => Section::Bond,
                    _ => Section::Other,
                };
                continue;
            }

            let fields: Vec<&str> = trimmed.split_whitespace().collect();
            match section {
                Section::Atom => {
                    if fields.len() < 6 {
                        return Err(ParseError::at(
                            FORMAT,
                            line_num,
                            ParseErrorKind::MissingRequiredField {
                                field: "atom_id name x y z type".into(),
                            },
                        ));
                    }
                    let id: i64 = parse_int(FORMAT, line_num, "atom_id", fields[0])?;
                    let position = Point3::new(
                        parse_f64(FORMAT, line_num, "x", fields[2])?,
                        parse_f64(FORMAT, line_num, "y", fields[3])?,
                        parse_f64(FORMAT, line_num, "z", fields[4])?,
                    );
                    let element = fields[5].split('.').next().unwrap_or(fields[5]);
                    let mut atom = Atom::new(fields[1], element, position);
                    atom.serial = u32::try_from(id).unwrap_or(0);
                    if let Some(subst_id) = fields.get(6).and_then(|s| s.parse::<isize>().ok()) {
                        atom.residue_index = subst_id;
                    }
                    if let Some(subst_name) = fields.get(7) {
                        let (resn, resi) = split_substructure(subst_name);
                        atom.residue_name = resn.to_string();
                        if let Some(resi) = resi {
                            atom.residue_index = resi;
                        }
                    }
                    if let Some(charge) = fields.get(8).and_then(|s| s.parse::<f64>().ok()) {
                        atom.set_property("partial_charge", charge);
                    }
                    ids.insert(id, atoms.len());
                    atoms.push(atom);
                }
                Section::Bond => {
                    if fields.len() < 4 {
                        return Err(ParseError::at(
                            FORMAT,
                            line_num,
                            ParseErrorKind::MissingRequiredField {
                                field: "bond_id origin target type".into(),
                            },
                        ));
                    }
                    let mut endpoints = [0usize; 2];
                    for (slot, field) in endpoints.iter_mut().zip(&fields[1..3]) {
                        let id: i64 = parse_int(FORMAT, line_num, "bond atom", field)?;
                        *slot = *ids.get(&id).ok_or_else(|| {
                            ParseError::at(FORMAT, line_num, ParseErrorKind::UnknownBondTarget(id))
                        })?;
                    }
                    let order: BondOrder = fields[3].parse().unwrap_or_default();
                    bonds.push(BatchBond::new(endpoints[0], endpoints[1], order));
                }
                Section::Other => {}
            }
        }

        if atoms.is_empty() {
            return Err(ParseError::MissingRecord {
                format: FORMAT,
                record: "@<TRIPOS>ATOM".into(),
            });
        }
        let infer_bonds = bonds.is_empty();
        Ok(ParsedStructure {
            atoms,
            bonds,
            infer_bonds,
        })
    }
}
