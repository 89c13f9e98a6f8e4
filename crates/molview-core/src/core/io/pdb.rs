use super::error::{ParseError, ParseErrorKind, parse_f64, parse_int};
use super::format::Format;
use super::slice_and_trim;
use super::traits::{ParsedStructure, StructureReader, StructureWriter};
use crate::core::models::atom::{Atom, SecondaryStructure};
use crate::core::models::element::{guess_from_atom_name, normalize_symbol};
use crate::core::models::model::BatchBond;
use crate::core::models::topology::BondOrder;
use nalgebra::Point3;
use std::collections::{BTreeMap, HashMap};
use std::io::{self, BufRead, Write};

const FORMAT: Format = Format::Pdb;
/// Coordinates end at column 54; anything shorter cannot be an atom record.
const MIN_ATOM_LINE: usize = 54;
const CONECT_FIELDS: [(usize, usize); 4] = [(11, 16), (16, 21), (21, 26), (26, 31)];

struct SecondaryRange {
    kind: SecondaryStructure,
    start_chain: String,
    start: isize,
    end_chain: String,
    end: isize,
}

impl SecondaryRange {
    fn covers(&self, atom: &Atom) -> bool {
        if self.start_chain == self.end_chain {
            atom.chain == self.start_chain && (self.start..=self.end).contains(&atom.residue_index)
        } else {
            (atom.chain == self.start_chain && atom.residue_index >= self.start)
                || (atom.chain == self.end_chain && atom.residue_index <= self.end)
        }
    }
}

pub struct PdbFile;

impl PdbFile {
    fn parse_atom(line: &str, line_num: usize) -> Result<Option<Atom>, ParseError> {
        if line.len() < MIN_ATOM_LINE {
            return Err(ParseError::at(
                FORMAT,
                line_num,
                ParseErrorKind::LineTooShort { min: MIN_ATOM_LINE },
            ));
        }

        // Keep only the primary alternate location.
        let alt_loc = slice_and_trim(line, 16, 17);
        if !alt_loc.is_empty() && alt_loc != "A" && alt_loc != "1" {
            return Ok(None);
        }

        let raw_name = line.get(12..16).unwrap_or("");
        let name = raw_name.trim();
        if name.is_empty() {
            return Err(ParseError::at(
                FORMAT,
                line_num,
                ParseErrorKind::MissingRequiredField {
                    field: "atom name (columns 13-16)".into(),
                },
            ));
        }

        let x = parse_f64(FORMAT, line_num, "x (columns 31-38)", slice_and_trim(line, 30, 38))?;
        let y = parse_f64(FORMAT, line_num, "y (columns 39-46)", slice_and_trim(line, 38, 46))?;
        let z = parse_f64(FORMAT, line_num, "z (columns 47-54)", slice_and_trim(line, 46, 54))?;

        let element_str = slice_and_trim(line, 76, 78);
        let element = if element_str.is_empty() {
            guess_from_atom_name(raw_name)
        } else {
            normalize_symbol(element_str)
        };

        let mut atom = Atom::new(name, &element, Point3::new(x, y, z));
        atom.hetflag = line.starts_with("HETATM");

        let serial_str = slice_and_trim(line, 6, 11);
        if !serial_str.is_empty() {
            atom.serial = parse_int(FORMAT, line_num, "serial (columns 7-11)", serial_str)?;
        }
        atom.residue_name = slice_and_trim(line, 17, 20).to_string();
        atom.chain = slice_and_trim(line, 21, 22).to_string();
        let resi_str = slice_and_trim(line, 22, 26);
        if !resi_str.is_empty() {
            atom.residue_index =
                parse_int(FORMAT, line_num, "residue number (columns 23-26)", resi_str)?;
        }
        atom.insertion_code = slice_and_trim(line, 26, 27).chars().next();

        let occupancy = slice_and_trim(line, 54, 60);
        if !occupancy.is_empty() {
            atom.occupancy = parse_f64(FORMAT, line_num, "occupancy (columns 55-60)", occupancy)?;
        }
        let b_factor = slice_and_trim(line, 60, 66);
        if !b_factor.is_empty() {
            atom.b_factor = parse_f64(FORMAT, line_num, "b-factor (columns 61-66)", b_factor)?;
        }
        Ok(Some(atom))
    }

    fn parse_secondary(
        line: &str,
        line_num: usize,
        kind: SecondaryStructure,
    ) -> Result<SecondaryRange, ParseError> {
        // HELIX and SHEET place the same fields in different columns.
        let (start_chain, start, end_chain, end) = match kind {
            SecondaryStructure::Helix => ((19, 20), (21, 25), (31, 32), (33, 37)),
            _ => ((21, 22), (22, 26), (32, 33), (33, 37)),
        };
        Ok(SecondaryRange {
            kind,
            start_chain: slice_and_trim(line, start_chain.0, start_chain.1).to_string(),
            start: parse_int(FORMAT, line_num, "initial residue", slice_and_trim(line, start.0, start.1))?,
            end_chain: slice_and_trim(line, end_chain.0, end_chain.1).to_string(),
            end: parse_int(FORMAT, line_num, "terminal residue", slice_and_trim(line, end.0, end.1))?,
        })
    }

    fn parse_conect(line: &str, line_num: usize) -> Result<(i64, Vec<i64>), ParseError> {
        let origin = slice_and_trim(line, 6, 11);
        if origin.is_empty() {
            return Err(ParseError::at(FORMAT, line_num, ParseErrorKind::InvalidConectFormat));
        }
        let origin: i64 = parse_int(FORMAT, line_num, "CONECT serial", origin)?;
        let mut targets = Vec::new();
        for (start, end) in CONECT_FIELDS {
            let field = slice_and_trim(line, start, end);
            if !field.is_empty() {
                targets.push(parse_int(FORMAT, line_num, "CONECT partner", field)?);
            }
        }
        if targets.is_empty() {
            return Err(ParseError::at(FORMAT, line_num, ParseErrorKind::InvalidConectFormat));
        }
        Ok((origin, targets))
    }
}

impl StructureReader for PdbFile {
    /// Reads the first model of a PDB file.
    ///
    /// `CONECT` records become explicit bonds; a partner repeated within a record raises
    /// the bond order. Distance inference always runs as well since `CONECT` usually covers
    /// only hetero groups.
    fn read_from(reader: &mut impl BufRead) -> Result<ParsedStructure, ParseError> {
        let mut atoms = Vec::new();
        let mut ranges = Vec::new();
        let mut conect: Vec<(usize, i64, Vec<i64>)> = Vec::new();

        for (line_num, line_res) in reader.lines().enumerate() {
            let line = line_res?;
            let line_num = line_num + 1;
            let record_type = slice_and_trim(&line, 0, 6);

            match record_type {
                "ATOM" | "HETATM" => {
                    if let Some(atom) = Self::parse_atom(&line, line_num)? {
                        atoms.push(atom);
                    }
                }
                "HELIX" => ranges.push(Self::parse_secondary(&line, line_num, SecondaryStructure::Helix)?),
                "SHEET" => ranges.push(Self::parse_secondary(&line, line_num, SecondaryStructure::Sheet)?),
                "CONECT" => {
                    let (origin, targets) = Self::parse_conect(&line, line_num)?;
                    conect.push((line_num, origin, targets));
                }
                "ENDMDL" | "END" => break,
                _ => {}
            }
        }

        if atoms.is_empty() {
            return Err(ParseError::MissingRecord {
                format: FORMAT,
                record: "ATOM/HETATM".into(),
            });
        }

        for atom in atoms.iter_mut().filter(|a| !a.hetflag) {
            if let Some(range) = ranges.iter().find(|r| r.covers(atom)) {
                atom.secondary_structure = range.kind;
            }
        }

        let by_serial: HashMap<i64, usize> = atoms
            .iter()
            .enumerate()
            .map(|(i, a)| (a.serial as i64, i))
            .collect();
        // Per unordered pair, the highest multiplicity seen in any one record.
        let mut multiplicity: BTreeMap<(usize, usize), usize> = BTreeMap::new();
        for (line_num, origin, targets) in conect {
            let a = *by_serial.get(&origin).ok_or_else(|| {
                ParseError::at(FORMAT, line_num, ParseErrorKind::UnknownBondTarget(origin))
            })?;
            let mut counts: HashMap<usize, usize> = HashMap::new();
            for target in targets {
                let b = *by_serial.get(&target).ok_or_else(|| {
                    ParseError::at(FORMAT, line_num, ParseErrorKind::UnknownBondTarget(target))
                })?;
                if a != b {
                    *counts.entry(b).or_default() += 1;
                }
            }
            for (b, count) in counts {
                let entry = multiplicity.entry((a.min(b), a.max(b))).or_default();
                *entry = (*entry).max(count);
            }
        }
        let bonds = multiplicity
            .into_iter()
            .map(|((a, b), count)| BatchBond::new(a, b, BondOrder::from_multiplicity(count)))
            .collect();

        Ok(ParsedStructure {
            atoms,
            bonds,
            infer_bonds: true,
        })
    }
}

fn format_atom_name(atom: &Atom) -> String {
    if atom.name.len() < 4 && atom.element.len() < 2 {
        format!(" {:<3}", atom.name)
    } else {
        format!("{:<4.4}", atom.name)
    }
}

impl StructureWriter for PdbFile {
    /// Writes `ATOM`/`HETATM` records followed by `CONECT` records for bonds that touch a
    /// hetero atom, repeating the partner to encode bond order.
    ///
    /// Atoms are numbered by output position rather than by their stored serials, so
    /// atoms gathered from several models never share a serial.
    fn write_to(atoms: &[&Atom], bonds: &[BatchBond], writer: &mut impl Write) -> io::Result<()> {
        for (index, atom) in atoms.iter().enumerate() {
            let record = if atom.hetflag { "HETATM" } else { "ATOM" };
            writeln!(
                writer,
                "{:<6}{:>5} {}{}{:>3} {:1}{:>4}{:1}   {:>8.3}{:>8.3}{:>8.3}{:>6.2}{:>6.2}          {:>2}",
                record,
                output_serial(index),
                format_atom_name(atom),
                ' ',
                truncate(&atom.residue_name, 3),
                truncate(&atom.chain, 1),
                atom.residue_index,
                atom.insertion_code.unwrap_or(' '),
                atom.position.x,
                atom.position.y,
                atom.position.z,
                atom.occupancy,
                atom.b_factor,
                truncate(&atom.element.to_ascii_uppercase(), 2),
            )?;
        }

        let mut partners: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for bond in bonds {
            let (Some(a), Some(b)) = (atoms.get(bond.a), atoms.get(bond.b)) else {
                continue;
            };
            if !a.hetflag && !b.hetflag {
                continue;
            }
            for _ in 0..bond.order.multiplicity() {
                partners.entry(bond.a).or_default().push(bond.b);
                partners.entry(bond.b).or_default().push(bond.a);
            }
        }
        for (origin, targets) in partners {
            for chunk in targets.chunks(4) {
                write!(writer, "CONECT{:>5}", output_serial(origin))?;
                for &target in chunk {
                    write!(writer, "{:>5}", output_serial(target))?;
                }
                writeln!(writer)?;
            }
        }
        writeln!(writer, "END")
    }
}

/// One-based serial of the atom at output position `index`, wrapped to the five
/// columns the record allows.
fn output_serial(index: usize) -> usize {
    (index + 1) % 100_000
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}
