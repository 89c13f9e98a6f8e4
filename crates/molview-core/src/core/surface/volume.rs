//! Isosurfaces of sampled scalar volumes such as electron densities or orbitals.

use std::sync::atomic::AtomicBool;

use nalgebra::{Point3, Vector3};
use tracing::{debug, instrument};

use super::Cancelled;
use super::grid::Grid;
use super::marching_cubes;
use super::mesh::{Mesh, UNOWNED};

/// Values sampled on a lattice spanned by three step vectors, which need not be
/// orthogonal.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeData {
    /// World position of sample (0, 0, 0), in Angstroms.
    pub origin: Point3<f64>,
    /// Offset between neighbouring samples along each lattice axis, in Angstroms.
    pub axes: [Vector3<f64>; 3],
    /// Sample counts along each lattice axis.
    pub dims: [usize; 3],
    /// Layout: `values[x + y * dims[0] + z * dims[0] * dims[1]]`.
    pub values: Vec<f64>,
}

impl VolumeData {
    /// World position of fractional lattice coordinates.
    pub fn position(&self, lattice: &Point3<f64>) -> Point3<f64> {
        self.origin + self.axes[0] * lattice.x + self.axes[1] * lattice.y + self.axes[2] * lattice.z
    }

    pub fn get(&self, x: usize, y: usize, z: usize) -> Option<f64> {
        if x >= self.dims[0] || y >= self.dims[1] || z >= self.dims[2] {
            return None;
        }
        self.values
            .get(x + y * self.dims[0] + z * self.dims[0] * self.dims[1])
            .copied()
    }

    /// Smallest and largest sample, `None` for an empty volume.
    pub fn value_range(&self) -> Option<(f64, f64)> {
        let first = *self.values.first()?;
        Some(
            self.values
                .iter()
                .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v))),
        )
    }

    /// Triangulates the `iso` level set with smooth normals.
    ///
    /// A non-negative level encloses the samples above it and a negative level the
    /// samples below it, so both lobes of an orbital close around their extremum.
    /// Triangles wind counter-clockwise seen from outside the enclosed region.
    #[instrument(skip_all, name = "volume_isosurface", fields(dims = ?self.dims, iso))]
    pub fn isosurface(&self, iso: f64, cancel: &AtomicBool) -> Result<Mesh, Cancelled> {
        let lattice = Grid {
            origin: Point3::origin(),
            spacing: 1.0,
            dims: self.dims,
            values: self.values.clone(),
        };
        let soup = marching_cubes::triangulate(&lattice, iso, cancel)?;

        let vertices: Vec<Point3<f64>> = soup.vertices.iter().map(|v| self.position(v)).collect();
        // Triangulated faces point up the gradient; a left-handed lattice mirrors them.
        let left_handed = self.axes[0].cross(&self.axes[1]).dot(&self.axes[2]) < 0.0;
        let flip = (iso >= 0.0) != left_handed;
        let triangles: Vec<[u32; 3]> = soup
            .triangles
            .iter()
            .map(|&[a, b, c]| if flip { [a, c, b] } else { [a, b, c] })
            .collect();

        let mut mesh = Mesh::from_parts(&vertices, &triangles, vec![UNOWNED; vertices.len()]);
        mesh.compute_normals(true);
        debug!(triangles = mesh.triangle_count(), "Volume isosurface built");
        Ok(mesh)
    }
}
