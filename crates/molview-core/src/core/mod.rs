//! # Core Module
//!
//! Stateless data and algorithms underneath the viewer.
//!
//! - **Molecular Representation** ([`models`]) - Atoms, bonds, styles and the per-model store
//! - **Queries** ([`selection`]) - Declarative atom selections
//! - **Colouring** ([`color`]) - Colours, numeric gradients and element colour tables
//! - **File I/O** ([`io`]) - Structure readers and writers, mesh export
//! - **Surfaces** ([`surface`]) - Grids, distance fields, marching cubes and meshes

pub mod color;
pub mod io;
pub mod models;
pub mod selection;
pub mod surface;
