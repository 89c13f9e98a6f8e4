use super::error::ParseError;
use crate::core::models::atom::Atom;
use crate::core::models::model::BatchBond;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// A normalized structure as produced by a reader.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedStructure {
    /// Atoms in file order.
    pub atoms: Vec<Atom>,
    /// Explicit bonds, by index into `atoms`.
    pub bonds: Vec<BatchBond>,
    /// Whether bonds should also be inferred from distances when the structure is loaded.
    pub infer_bonds: bool,
}

/// Defines the interface for reading a structure file format.
pub trait StructureReader {
    /// Reads a structure from a buffered reader.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails or I/O operations encounter issues.
    fn read_from(reader: &mut impl BufRead) -> Result<ParsedStructure, ParseError>;

    /// Reads a structure from an in-memory string.
    fn read_str(data: &str) -> Result<ParsedStructure, ParseError> {
        let mut bytes = data.as_bytes();
        Self::read_from(&mut bytes)
    }

    /// Reads a structure from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or parsing fails.
    fn read_from_path<P: AsRef<Path>>(path: P) -> Result<ParsedStructure, ParseError> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }
}

/// Defines the interface for writing atoms back out as a structure file.
pub trait StructureWriter {
    /// Writes `atoms` and the `bonds` among them (by index into `atoms`).
    fn write_to(atoms: &[&Atom], bonds: &[BatchBond], writer: &mut impl Write) -> io::Result<()>;

    /// Writes to a file path.
    fn write_to_path<P: AsRef<Path>>(
        atoms: &[&Atom],
        bonds: &[BatchBond],
        path: P,
    ) -> io::Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        Self::write_to(atoms, bonds, &mut writer)?;
        writer.flush()
    }

    /// Writes into a `String`.
    fn write_string(atoms: &[&Atom], bonds: &[BatchBond]) -> String {
        let mut buffer = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = Self::write_to(atoms, bonds, &mut buffer);
        String::from_utf8_lossy(&buffer).into_owned()
    }
}
