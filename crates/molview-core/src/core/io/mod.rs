//! Reading and writing structure files and exporting meshes.
//!
//! Readers normalize every format into a [`traits::ParsedStructure`]: an ordered atom list
//! plus optional explicit bonds. They are line-oriented record readers and only interpret
//! the records needed to populate atoms, bonds and secondary structure.

pub mod cube;
pub mod error;
pub mod format;
pub mod mol2;
pub mod obj;
pub mod pdb;
pub mod sdf;
pub mod traits;
pub mod xyz;

pub(crate) fn slice_and_trim(line: &str, start: usize, end: usize) -> &str {
    line.get(start..end.min(line.len())).unwrap_or("").trim()
}
