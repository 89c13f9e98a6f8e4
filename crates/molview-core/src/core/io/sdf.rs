use super::error::{ParseError, ParseErrorKind, parse_f64, parse_int};
use super::format::Format;
use super::slice_and_trim;
use super::traits::{ParsedStructure, StructureReader};
use crate::core::models::atom::Atom;
use crate::core::models::model::BatchBond;
use crate::core::models::topology::BondOrder;
use nalgebra::Point3;
use std::io::BufRead;

const FORMAT: Format = Format::Sdf;
const HEADER_LINES: usize = 3;

pub struct SdfFile;

/// Splits a fixed-width counts or bond line into its leading three-character integers,
/// falling back to whitespace separation for loosely written files.
fn leading_triplets(line: &str, n: usize) -> Vec<String> {
    let fixed: Vec<String> = (0..n)
        .map(|i| slice_and_trim(line, i * 3, i * 3 + 3).to_string())
        .collect();
    if fixed.iter().all(|f| f.parse::<i64>().is_ok()) {
        return fixed;
    }
    line.split_whitespace().take(n).map(str::to_string).collect()
}

impl StructureReader for SdfFile {
    /// Reads the first record of a V2000 molfile/SD file.
    fn read_from(reader: &mut impl BufRead) -> Result<ParsedStructure, ParseError> {
        let lines: Vec<String> = reader.lines().collect::<Result<_, _>>()?;

        let counts_index = HEADER_LINES;
        let counts = lines.get(counts_index).ok_or_else(|| ParseError::MissingRecord {
            format: FORMAT,
            record: "counts line".into(),
        })?;
        if counts.contains("V3000") {
            return Err(ParseError::at(
                FORMAT,
                counts_index + 1,
                ParseErrorKind::Unsupported("V3000 molfile".into()),
            ));
        }
        let fields = leading_triplets(counts, 2);
        if fields.len() < 2 {
            return Err(ParseError::at(
                FORMAT,
                counts_index + 1,
                ParseErrorKind::MissingRequiredField {
                    field: "atom and bond counts".into(),
                },
            ));
        }
        let atom_count: usize = parse_int(FORMAT, counts_index + 1, "atom count", &fields[0])?;
        let bond_count: usize = parse_int(FORMAT, counts_index + 1, "bond count", &fields[1])?;

        let atom_start = counts_index + 1;
        let bond_start = atom_start + atom_count;
        if lines.len() < bond_start + bond_count {
            return Err(ParseError::at(
                FORMAT,
                lines.len(),
                ParseErrorKind::CountMismatch {
                    expected: atom_count + bond_count,
                    found: lines.len().saturating_sub(atom_start),
                },
            ));
        }

        let mut atoms = Vec::with_capacity(atom_count);
        for (offset, line) in lines[atom_start..bond_start].iter().enumerate() {
            let line_num = atom_start + offset + 1;
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 4 {
                return Err(ParseError::at(
                    FORMAT,
                    line_num,
                    ParseErrorKind::MissingRequiredField {
                        field: "x y z element".into(),
                    },
                ));
            }
            let position = Point3::new(
                parse_f64(FORMAT, line_num, "x", fields[0])?,
                parse_f64(FORMAT, line_num, "y", fields[1])?,
                parse_f64(FORMAT, line_num, "z", fields[2])?,
            );
            let mut atom = Atom::new(fields[3], fields[3], position);
            atom.serial = offset as u32 + 1;
            atom.hetflag = true;
            atoms.push(atom);
        }

        let mut bonds = Vec::with_capacity(bond_count);
        for (offset, line) in lines[bond_start..bond_start + bond_count].iter().enumerate() {
            let line_num = bond_start + offset + 1;
            let fields = leading_triplets(line, 3);
            if fields.len() < 3 {
                return Err(ParseError::at(
                    FORMAT,
                    line_num,
                    ParseErrorKind::MissingRequiredField {
                        field: "bond atoms and order".into(),
                    },
                ));
            }
            let a: i64 = parse_int(FORMAT, line_num, "first atom", &fields[0])?;
            let b: i64 = parse_int(FORMAT, line_num, "second atom", &fields[1])?;
            for atom in [a, b] {
                if atom < 1 || atom as usize > atom_count {
                    return Err(ParseError::at(
                        FORMAT,
                        line_num,
                        ParseErrorKind::UnknownBondTarget(atom),
                    ));
                }
            }
            let order = fields[2].parse().unwrap_or_default();
            bonds.push(BatchBond::new(a as usize - 1, b as usize - 1, order));
        }

        let infer_bonds = bonds.is_empty();
        Ok(ParsedStructure {
            atoms,
            bonds,
            infer_bonds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ETHENE_OXIDE: &str = "\
ethanal
  test

  3  2  0  0  0  0  0  0  0  0999 V2000
    0.0000    0.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
    1.5000    0.0000    0.0000 C   0  0  0  0  0  0  0  0  0  0  0  0
    2.2000    1.0000    0.0000 O   0  0  0  0  0  0  0  0  0  0  0  0
  1  2  1  0  0  0  0
  2  3  2  0  0  0  0
M  END
$$$$
";

    #[test]
    fn reads_atoms_and_bonds() {
        let parsed = SdfFile::read_str(ETHENE_OXIDE).unwrap();
        assert_eq!(parsed.atoms.len(), 3);
        assert_eq!(parsed.atoms[2].element, "O");
        assert!(parsed.atoms.iter().all(|a| a.hetflag));
        assert_eq!(
            parsed.bonds,
            vec![
                BatchBond::new(0, 1, BondOrder::Single),
                BatchBond::new(1, 2, BondOrder::Double)
            ]
        );
        assert!(!parsed.infer_bonds);
    }

    #[test]
    fn rejects_v3000_and_truncated_blocks() {
        let v3000 = "x\n\n\n  0  0  0     0  0            999 V3000\n";
        assert!(matches!(
            SdfFile::read_str(v3000).unwrap_err(),
            ParseError::Parse {
                kind: ParseErrorKind::Unsupported(_),
                ..
            }
        ));
        let truncated = "x\n\n\n  3  0  0\n    0.0 0.0 0.0 C\n";
        assert!(SdfFile::read_str(truncated).is_err());
        assert!(SdfFile::read_str("only\nheader\n").is_err());
    }

    #[test]
    fn rejects_bonds_to_missing_atoms() {
        let src = "x\n\n\n  1  1\n    0.0 0.0 0.0 C\n  1  2  1\n";
        assert!(matches!(
            SdfFile::read_str(src).unwrap_err(),
            ParseError::Parse {
                kind: ParseErrorKind::UnknownBondTarget(2),
                ..
            }
        ));
    }
}
