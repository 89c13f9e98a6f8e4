use super::style::AtomStyle;
use crate::core::color::Color;
use nalgebra::Point3;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Secondary-structure assignment of the residue an atom belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum SecondaryStructure {
    /// Part of a helix (PDB `HELIX` record).
    Helix,
    /// Part of a beta strand (PDB `SHEET` record).
    Sheet,
    /// Anything else, including loops and ligands.
    #[default]
    Coil,
}

impl SecondaryStructure {
    /// The single-letter code used in selections and exports (`h`, `s`, `c`).
    pub fn code(self) -> char {
        match self {
            Self::Helix => 'h',
            Self::Sheet => 's',
            Self::Coil => 'c',
        }
    }
}

impl FromStr for SecondaryStructure {
    type Err = ();

    /// Parses a secondary-structure code, accepting single letters and full names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "h" | "helix" => Ok(Self::Helix),
            "s" | "e" | "sheet" | "strand" => Ok(Self::Sheet),
            "c" | "coil" | "" => Ok(Self::Coil),
            _ => Err(()),
        }
    }
}

/// A user-defined value stored in an atom's property bag.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Flag(bool),
    Number(f64),
    Text(String),
}

impl PropertyValue {
    /// Numeric view of the value; text is parsed, flags map to `0`/`1`.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            Self::Flag(b) => Some(if *b { 1.0 } else { 0.0 }),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flag(b) => write!(f, "{}", b),
            Self::Number(v) => write!(f, "{}", v),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        Self::Flag(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

/// Represents an atom of a displayed model.
///
/// Atoms carry chemical identity, residue/chain metadata as read from a structure
/// file, and the mutable visual state (style record and base colour) that the style
/// resolver updates. Connectivity lives on the owning model.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// Serial number, unique within the owning model.
    pub serial: u32,
    /// The atom name (e.g., "CA", "N", "O1").
    pub name: String,
    /// Element symbol in conventional capitalization (e.g., "C", "Fe").
    pub element: String,
    /// Cartesian coordinates in Angstroms.
    pub position: Point3<f64>,
    /// Three-letter residue name (e.g., "ALA", "HOH").
    pub residue_name: String,
    /// Residue sequence number.
    pub residue_index: isize,
    /// Residue insertion code, if any.
    pub insertion_code: Option<char>,
    /// Chain identifier; empty for structures without chains.
    pub chain: String,
    /// Whether the atom came from a `HETATM` record.
    pub hetflag: bool,
    pub secondary_structure: SecondaryStructure,
    /// Crystallographic temperature factor.
    pub b_factor: f64,
    /// Crystallographic occupancy.
    pub occupancy: f64,
    /// Base colour overriding the model's element colour map.
    pub color: Option<Color>,
    /// Per-representation style record.
    pub style: AtomStyle,
    /// Whether the atom takes part in picking.
    pub clickable: bool,
    /// Arbitrary user-defined data.
    pub properties: HashMap<String, PropertyValue>,
}

impl Atom {
    /// Creates a new `Atom` with default metadata.
    ///
    /// The serial is assigned when the atom is added to a model.
    ///
    /// # Arguments
    ///
    /// * `name` - The name of the atom.
    /// * `element` - The element symbol; capitalization is normalized.
    /// * `position` - The 3D coordinates of the atom.
    pub fn new(name: &str, element: &str, position: Point3<f64>) -> Self {
        Self {
            serial: 0,
            name: name.to_string(),
            element: super::element::normalize_symbol(element),
            position,
            residue_name: String::new(),
            residue_index: 0,
            insertion_code: None,
            chain: String::new(),
            hetflag: false,
            secondary_structure: SecondaryStructure::default(),
            b_factor: 0.0,
            occupancy: 1.0,
            color: None,
            style: AtomStyle::default(),
            clickable: false,
            properties: HashMap::new(),
        }
    }

    pub fn with_residue(mut self, residue_name: &str, residue_index: isize, chain: &str) -> Self {
        self.residue_name = residue_name.to_string();
        self.residue_index = residue_index;
        self.chain = chain.to_string();
        self
    }

    pub fn with_serial(mut self, serial: u32) -> Self {
        self.serial = serial;
        self
    }

    /// Van der Waals radius of the atom's element.
    pub fn vdw_radius(&self) -> f64 {
        super::element::vdw_radius(&self.element)
    }

    pub fn covalent_radius(&self) -> f64 {
        super::element::covalent_radius(&self.element)
    }

    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    pub fn set_property(&mut self, key: &str, value: impl Into<PropertyValue>) {
        self.properties.insert(key.to_string(), value.into());
    }
}
