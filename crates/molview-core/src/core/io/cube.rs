use super::error::{ParseError, ParseErrorKind, parse_f64, parse_int};
use super::format::Format;
use super::traits::{ParsedStructure, StructureReader};
use crate::core::models::atom::Atom;
use crate::core::models::element::symbol_for_atomic_number;
use crate::core::surface::volume::VolumeData;
use nalgebra::{Point3, Vector3};
use std::io::{self, BufRead};

const FORMAT: Format = Format::Cube;

/// Cube files store lengths in Bohr unless an axis count is negative.
const BOHR_TO_ANGSTROM: f64 = 0.529_177_210_903;

/// Gaussian cube files: two comment lines, a header with the atom count, origin
/// and three lattice axes, the atoms, then the samples with z varying fastest.
pub struct CubeFile;

struct Header {
    origin: Point3<f64>,
    axes: [Vector3<f64>; 3],
    dims: [usize; 3],
    atoms: Vec<Atom>,
    /// Values stored per lattice point; only the first one is kept.
    components: usize,
}

type Lines<'a, R> = std::iter::Enumerate<io::Lines<&'a mut R>>;

impl CubeFile {
    pub fn read_volume_str(data: &str) -> Result<VolumeData, ParseError> {
        let mut bytes = data.as_bytes();
        Self::read_volume(&mut bytes)
    }

    /// Reads the sampled volume, converted to Angstroms and to x-fastest layout.
    pub fn read_volume(reader: &mut impl BufRead) -> Result<VolumeData, ParseError> {
        let mut lines = reader.lines().enumerate();
        let header = Self::read_header(&mut lines)?;
        let [nx, ny, nz] = header.dims;
        let expected = nx * ny * nz * header.components;

        let mut samples = Vec::with_capacity(expected);
        for (i, line) in lines {
            let line = line?;
            for token in line.split_whitespace() {
                if samples.len() == expected {
                    break;
                }
                samples.push(parse_f64(FORMAT, i + 1, "volume sample", token)?);
            }
        }
        if samples.len() < expected {
            return Err(ParseError::MissingRecord {
                format: FORMAT,
                record: format!("{expected} volume samples (found {})", samples.len()),
            });
        }

        let mut values = vec![0.0; nx * ny * nz];
        for x in 0..nx {
            for y in 0..ny {
                for z in 0..nz {
                    let stored = ((x * ny + y) * nz + z) * header.components;
                    values[x + y * nx + z * nx * ny] = samples[stored];
                }
            }
        }
        Ok(VolumeData {
            origin: header.origin,
            axes: header.axes,
            dims: header.dims,
            values,
        })
    }

    fn read_header<R: BufRead>(lines: &mut Lines<'_, R>) -> Result<Header, ParseError> {
        for record in ["title line", "comment line"] {
            next_line(lines, record)?;
        }

        let (line_num, line) = next_line(lines, "atom count and origin")?;
        let fields = split_fields(&line, line_num, 4, "atom count and origin")?;
        let atom_count: i64 = parse_int(FORMAT, line_num, "atom count", fields[0])?;
        let raw_origin = point(line_num, &fields[1..4])?;
        let mut components = match fields.get(4) {
            Some(value) => parse_int::<usize>(FORMAT, line_num, "values per point", value)?.max(1),
            None => 1,
        };

        let mut dims = [0usize; 3];
        let mut axes = [Vector3::zeros(); 3];
        let mut length_scale = BOHR_TO_ANGSTROM;
        for axis in 0..3 {
            let (line_num, line) = next_line(lines, "lattice axis")?;
            let fields = split_fields(&line, line_num, 4, "lattice axis")?;
            let count: i64 = parse_int(FORMAT, line_num, "sample count", fields[0])?;
            if count == 0 {
                return Err(ParseError::at(
                    FORMAT,
                    line_num,
                    ParseErrorKind::Unsupported("lattice axis with no samples".into()),
                ));
            }
            let scale = if count < 0 { 1.0 } else { BOHR_TO_ANGSTROM };
            if axis == 0 {
                length_scale = scale;
            }
            dims[axis] = count.unsigned_abs() as usize;
            axes[axis] = point(line_num, &fields[1..4])?.coords * scale;
        }

        let mut atoms = Vec::with_capacity(atom_count.unsigned_abs() as usize);
        for serial in 1..=atom_count.unsigned_abs() {
            let (line_num, line) = next_line(lines, "atom")?;
            let fields = split_fields(&line, line_num, 5, "atomic number, charge, x, y, z")?;
            let number: u32 = parse_int(FORMAT, line_num, "atomic number", fields[0])?;
            let charge = parse_f64(FORMAT, line_num, "charge", fields[1])?;
            let position = point(line_num, &fields[2..5])?;
            let element = symbol_for_atomic_number(number).unwrap_or("X");
            let mut atom = Atom::new(element, element, Point3::from(position.coords * length_scale));
            atom.serial = serial as u32;
            atom.set_property("charge", charge);
            atoms.push(atom);
        }

        // A negative atom count announces a line listing the stored orbitals.
        if atom_count < 0 {
            let (line_num, line) = next_line(lines, "orbital list")?;
            let fields = split_fields(&line, line_num, 1, "orbital count")?;
            components = parse_int::<usize>(FORMAT, line_num, "orbital count", fields[0])?.max(1);
        }

        Ok(Header {
            origin: Point3::from(raw_origin.coords * length_scale),
            axes,
            dims,
            atoms,
            components,
        })
    }
}

impl StructureReader for CubeFile {
    /// Reads the atoms listed in the cube header. The samples are not read.
    fn read_from(reader: &mut impl BufRead) -> Result<ParsedStructure, ParseError> {
        let mut lines = reader.lines().enumerate();
        let header = Self::read_header(&mut lines)?;
        Ok(ParsedStructure {
            atoms: header.atoms,
            bonds: Vec::new(),
            infer_bonds: true,
        })
    }
}

fn next_line<R: BufRead>(
    lines: &mut Lines<'_, R>,
    record: &str,
) -> Result<(usize, String), ParseError> {
    match lines.next() {
        Some((i, line)) => Ok((i + 1, line?)),
        None => Err(ParseError::MissingRecord {
            format: FORMAT,
            record: record.to_string(),
        }),
    }
}

fn split_fields<'a>(
    line: &'a str,
    line_num: usize,
    min: usize,
    field: &str,
) -> Result<Vec<&'a str>, ParseError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < min {
        return Err(ParseError::at(
            FORMAT,
            line_num,
            ParseErrorKind::MissingRequiredField {
                field: field.to_string(),
            },
        ));
    }
    Ok(fields)
}

fn point(line_num: usize, fields: &[&str]) -> Result<Point3<f64>, ParseError> {
    Ok(Point3::new(
        parse_f64(FORMAT, line_num, "x", fields[0])?,
        parse_f64(FORMAT, line_num, "y", fields[1])?,
        parse_f64(FORMAT, line_num, "z", fields[2])?,
    ))
}
