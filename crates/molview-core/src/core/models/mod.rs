//! # Core Models Module
//!
//! Data structures describing displayed molecules.
//!
//! - [`atom`] - Atom identity, residue/chain metadata, style and property bag
//! - [`element`] - Per-element radii
//! - [`ids`] - Atom keys and viewer-level handles
//! - [`model`] - The atom/bond store of a single model
//! - [`style`] - Representation styles and surface materials
//! - [`topology`] - Bonds and bond orders
//!
//! ```ignore
//! use molview::core::models::{atom::Atom, ids::ModelId, model::Model};
//!
//! let mut model = Model::new(ModelId(0));
//! model.add_atoms(vec![Atom::new("C1", "C", Point3::origin())], &[])?;
//! ```

pub mod atom;
pub mod element;
pub mod ids;
pub mod model;
pub mod style;
pub mod topology;
