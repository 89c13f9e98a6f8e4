use super::cube::CubeFile;
use super::error::ParseError;
use super::mol2::Mol2File;
use super::pdb::PdbFile;
use super::sdf::SdfFile;
use super::traits::{ParsedStructure, StructureReader};
use super::xyz::XyzFile;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// The supported structure formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Pdb,
    Sdf,
    Xyz,
    Mol2,
    /// Gaussian cube; as a structure, only the atoms of its header.
    Cube,
}

impl Format {
    /// Guesses the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Format> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(|e| e.parse().ok())
    }

    /// Parses `data` with this format's reader.
    pub fn parse(self, data: &str) -> Result<ParsedStructure, ParseError> {
        match self {
            Format::Pdb => PdbFile::read_str(data),
            Format::Sdf => SdfFile::read_str(data),
            Format::Xyz => XyzFile::read_str(data),
            Format::Mol2 => Mol2File::read_str(data),
            Format::Cube => CubeFile::read_str(data),
        }
    }
}

impl FromStr for Format {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdb" | "ent" => Ok(Format::Pdb),
            "sdf" | "mol" | "sd" => Ok(Format::Sdf),
            "xyz" => Ok(Format::Xyz),
            "mol2" => Ok(Format::Mol2),
            "cube" | "cub" => Ok(Format::Cube),
            _ => Err(ParseError::UnknownFormat(s.to_string())),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Format::Pdb => "PDB",
            Format::Sdf => "SDF",
            Format::Xyz => "XYZ",
            Format::Mol2 => "MOL2",
            Format::Cube => "CUBE",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn parses_format_tags_case_insensitively() {
        assert_eq!("PDB".parse::<Format>().unwrap(), Format::Pdb);
        assert_eq!("mol".parse::<Format>().unwrap(), Format::Sdf);
        assert_eq!("Mol2".parse::<Format>().unwrap(), Format::Mol2);
        assert_eq!("cube".parse::<Format>().unwrap(), Format::Cube);
        assert!(matches!("cif".parse::<Format>(), Err(ParseError::UnknownFormat(_))));
    }

    #[test]
    fn guesses_format_from_extension() {
        assert_eq!(Format::from_path(&PathBuf::from("a/b/1crn.pdb")), Some(Format::Pdb));
        assert_eq!(Format::from_path(&PathBuf::from("ligand.sdf")), Some(Format::Sdf));
        assert_eq!(Format::from_path(&PathBuf::from("noext")), None);
    }

    #[test]
    fn dispatches_to_reader() {
        let parsed = Format::Xyz.parse("1\ncomment\nO 0.0 0.0 0.0\n").unwrap();
        assert_eq!(parsed.atoms.len(), 1);
    }
}
