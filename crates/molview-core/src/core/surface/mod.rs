//! # Surface Extraction
//!
//! Turns a set of atom spheres into a triangle mesh.
//!
//! - [`grid`] - Regular sampling grid around the atoms
//! - [`distance_field`] - Signed fields for the four surface definitions
//! - [`marching_cubes`] - Level-set triangulation with shared-edge welding
//! - [`mesh`] - Normals, display filtering and focus clipping
//! - [`tables`] - Marching cubes lookup tables
//! - [`volume`] - Isosurfaces of sampled volumetric data

pub mod distance_field;
pub mod grid;
pub mod marching_cubes;
pub mod mesh;
pub mod tables;
pub mod volume;

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

use nalgebra::Point3;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use self::distance_field::AtomLocator;
use self::grid::{Aabb, Grid};
use self::mesh::{Mesh, UNOWNED};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurfaceType {
    /// Van der Waals: union of the atom spheres.
    Vdw,
    /// Molecular surface: rolling-probe surface including enclosed pockets.
    Ms,
    /// Solvent accessible: spheres grown by the probe radius.
    Sas,
    /// Solvent excluded: rolling-probe surface with buried cavities filled.
    Ses,
}

impl SurfaceType {
    pub const ALL: [SurfaceType; 4] = [
        SurfaceType::Vdw,
        SurfaceType::Ms,
        SurfaceType::Sas,
        SurfaceType::Ses,
    ];
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown surface type '{0}' (expected vdw, ms, sas or ses)")]
pub struct ParseSurfaceTypeError(pub String);

impl FromStr for SurfaceType {
    type Err = ParseSurfaceTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vdw" => Ok(SurfaceType::Vdw),
            "ms" => Ok(SurfaceType::Ms),
            "sas" => Ok(SurfaceType::Sas),
            "ses" => Ok(SurfaceType::Ses),
            _ => Err(ParseSurfaceTypeError(s.to_string())),
        }
    }
}

impl fmt::Display for SurfaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SurfaceType::Vdw => "VDW",
            SurfaceType::Ms => "MS",
            SurfaceType::Sas => "SAS",
            SurfaceType::Ses => "SES",
        };
        f.write_str(name)
    }
}

/// A sphere contributing to a surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceAtom {
    pub position: Point3<f64>,
    pub radius: f64,
}

impl SurfaceAtom {
    pub fn new(position: Point3<f64>, radius: f64) -> Self {
        Self { position, radius }
    }
}

/// The computation was stopped through its cancel flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("surface computation cancelled")]
pub struct Cancelled;

/// Geometric parameters of one extraction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceParams {
    pub surface_type: SurfaceType,
    pub probe_radius: f64,
    /// Grid spacing in Ångström.
    pub resolution: f64,
    pub smooth_normals: bool,
}

/// Atoms feeding one extraction.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceInput<'a> {
    /// Every atom contributing to the field.
    pub context: &'a [SurfaceAtom],
    /// Per context atom, whether triangles it owns are emitted.
    pub shown: &'a [bool],
    /// Atoms whose surroundings the mesh is clipped to.
    pub focus: Option<&'a [SurfaceAtom]>,
}

/// Milestones passed while a surface is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStage {
    FieldSampled,
    Triangulated,
    MeshAssembled,
}

impl ExtractionStage {
    pub const COUNT: u64 = 3;
}

/// Computes the surface mesh for `input`.
///
/// An empty context yields an empty mesh. The probe radius plays no part in a
/// van der Waals surface. The grid lives only for the duration of the call.
pub fn extract(
    input: &SurfaceInput,
    params: &SurfaceParams,
    cancel: &AtomicBool,
) -> Result<Mesh, Cancelled> {
    extract_observed(input, params, cancel, |_| {})
}

/// [`extract`], calling `on_stage` after each completed stage.
#[instrument(skip_all, name = "surface_extraction", fields(surface_type = %params.surface_type, atoms = input.context.len()))]
pub fn extract_observed(
    input: &SurfaceInput,
    params: &SurfaceParams,
    cancel: &AtomicBool,
    on_stage: impl Fn(ExtractionStage),
) -> Result<Mesh, Cancelled> {
    let probe = match params.surface_type {
        SurfaceType::Vdw => 0.0,
        _ => params.probe_radius.max(0.0),
    };
    let Some(bounds) = Aabb::around(input.context, probe) else {
        debug!("No atoms in context, returning an empty mesh");
        return Ok(Mesh::new());
    };

    let spacing = params.resolution;
    let mut grid = Grid::from_bounds(bounds.min, bounds.max, spacing, 2.0 * spacing, 0.0);
    info!(
        dims = ?grid.dims,
        spacing,
        probe,
        "Sampling surface field"
    );

    let locator = AtomLocator::new(input.context);
    grid.values = distance_field::compute(&grid, &locator, params.surface_type, probe, cancel)?;
    on_stage(ExtractionStage::FieldSampled);
    let triangulation = marching_cubes::triangulate(&grid, 0.0, cancel)?;
    drop(grid);
    on_stage(ExtractionStage::Triangulated);

    let cutoff = 2.0 * spacing;

    #[cfg(not(feature = "parallel"))]
    let vertices = triangulation.vertices.iter();

    #[cfg(feature = "parallel")]
    let vertices = triangulation.vertices.par_iter();

    let owners: Vec<u32> = vertices
        .map(|vertex| {
            locator
                .owner(vertex, probe, cutoff)
                .map_or(UNOWNED, |index| index as u32)
        })
        .collect();
    if cancel.load(Ordering::Relaxed) {
        return Err(Cancelled);
    }

    let mut mesh = Mesh::from_parts(&triangulation.vertices, &triangulation.triangles, owners);
    if !input.shown.iter().all(|shown| *shown) {
        mesh.retain_owned_by(input.shown);
    }
    if let Some(region) = input.focus.and_then(|focus| Aabb::around(focus, probe)) {
        mesh.clip_to(&region);
    }
    mesh.compact();
    mesh.compute_normals(params.smooth_normals);
    on_stage(ExtractionStage::MeshAssembled);

    info!(
        vertices = mesh.vertex_count(),
        triangles = mesh.triangle_count(),
        "Surface extracted"
    );
    Ok(mesh)
}
