use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};

use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::Point3;
use tracing::debug;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::grid::Grid;
use super::{Cancelled, SurfaceAtom, SurfaceType};

/// Marker for grid vertices with no atom within reach.
pub const NO_ATOM: u32 = u32::MAX;

/// Spatial index over atom centres answering nearest-sphere-surface queries.
pub struct AtomLocator<'a> {
    atoms: &'a [SurfaceAtom],
    tree: Option<KdTree<f64, 3>>,
    max_radius: f64,
}

impl<'a> AtomLocator<'a> {
    pub fn new(atoms: &'a [SurfaceAtom]) -> Self {
        let centres: Vec<[f64; 3]> = atoms.iter().map(|a| to_array(&a.position)).collect();
        let tree = (!centres.is_empty()).then(|| (&centres).into());
        let max_radius = atoms.iter().map(|a| a.radius).fold(0.0, f64::max);
        Self {
            atoms,
            tree,
            max_radius,
        }
    }

    pub fn atoms(&self) -> &'a [SurfaceAtom] {
        self.atoms
    }

    pub fn max_radius(&self) -> f64 {
        self.max_radius
    }

    /// The atom whose sphere, grown by `inflate`, has the closest surface to
    /// `point`, and the signed distance to that surface.
    ///
    /// Only atoms whose surface may lie within `cutoff` of the point are
    /// considered; `None` means every surface is farther than that.
    pub fn nearest_surface(
        &self,
        point: &Point3<f64>,
        inflate: f64,
        cutoff: f64,
    ) -> Option<(usize, f64)> {
        let tree = self.tree.as_ref()?;
        let reach = self.max_radius + inflate + cutoff;
        tree.within_unsorted::<SquaredEuclidean>(&to_array(point), reach * reach)
            .into_iter()
            .map(|neighbor| {
                let index = neighbor.item as usize;
                let radius = self.atoms[index].radius + inflate;
                (index, neighbor.distance.sqrt() - radius)
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    /// The atom owning the point: nearest sphere surface when one is close,
    /// otherwise the nearest centre.
    pub fn owner(&self, point: &Point3<f64>, inflate: f64, cutoff: f64) -> Option<usize> {
        if let Some((index, _)) = self.nearest_surface(point, inflate, cutoff) {
            return Some(index);
        }
        let tree = self.tree.as_ref()?;
        Some(tree.nearest_one::<SquaredEuclidean>(&to_array(point)).item as usize)
    }
}

fn to_array(point: &Point3<f64>) -> [f64; 3] {
    [point.x, point.y, point.z]
}

/// Fills a per-vertex buffer slice by slice along z, checking `cancel` before each slice.
fn sample_slices<T, F>(grid: &Grid, cancel: &AtomicBool, sample: F) -> Result<Vec<T>, Cancelled>
where
    T: Copy + Default + Send,
    F: Fn(usize, usize, usize) -> T + Send + Sync,
{
    let mut out = vec![T::default(); grid.vertex_count()];
    let nx = grid.dims[0];

    #[cfg(not(feature = "parallel"))]
    let slices = out.chunks_mut(grid.slice_len());

    #[cfg(feature = "parallel")]
    let slices = out.par_chunks_mut(grid.slice_len());

    slices.enumerate().try_for_each(|(z, slice)| {
        if cancel.load(Ordering::Relaxed) {
            return Err(Cancelled);
        }
        for (i, value) in slice.iter_mut().enumerate() {
            *value = sample(i % nx, i / nx, z);
        }
        Ok(())
    })?;
    Ok(out)
}

/// Signed distance from every vertex to the nearest sphere surface with radii
/// grown by `inflate`, negative inside, plus the owning atom per vertex.
///
/// Vertices farther than two cells from every surface hold a clamped positive
/// value and [`NO_ATOM`].
pub fn sphere_field(
    grid: &Grid,
    locator: &AtomLocator,
    inflate: f64,
    cancel: &AtomicBool,
) -> Result<(Vec<f64>, Vec<u32>), Cancelled> {
    let cutoff = 2.0 * grid.spacing;
    let samples = sample_slices(grid, cancel, |x, y, z| {
        let point = grid.vertex_position(x, y, z);
        match locator.nearest_surface(&point, inflate, cutoff) {
            Some((atom, distance)) => (distance, atom as u32),
            None => (cutoff, NO_ATOM),
        }
    })?;
    Ok(samples.into_iter().unzip())
}

/// Vertices outside the inflated spheres that are 6-connected to the grid boundary.
fn connected_to_boundary(grid: &Grid, accessible: &[f64]) -> Vec<bool> {
    let mut reached = vec![false; accessible.len()];
    let mut queue = VecDeque::new();
    for (index, value) in accessible.iter().enumerate() {
        let [x, y, z] = grid.vertex_coords(index);
        if *value >= 0.0 && grid.is_boundary(x, y, z) {
            reached[index] = true;
            queue.push_back(index);
        }
    }
    while let Some(index) = queue.pop_front() {
        let [x, y, z] = grid.vertex_coords(index);
        for [nx, ny, nz] in grid.neighbors6(x, y, z) {
            let next = grid.vertex_index(nx, ny, nz);
            if !reached[next] && accessible[next] >= 0.0 {
                reached[next] = true;
                queue.push_back(next);
            }
        }
    }
    reached
}

/// Rolling-probe field shared by SES and MS.
///
/// Probe centres may sit on any vertex in `exterior`. The points of the
/// exterior touching the rest of the grid are projected onto the inflated
/// sphere that owns them; every other vertex is then outside exactly when it
/// lies within `probe` of one of those points. Values deeper than two cells
/// inside are clamped.
fn probe_field(
    grid: &Grid,
    locator: &AtomLocator,
    probe: f64,
    connected_only: bool,
    cancel: &AtomicBool,
) -> Result<Vec<f64>, Cancelled> {
    let (accessible, owners) = sphere_field(grid, locator, probe, cancel)?;
    let exterior = if connected_only {
        connected_to_boundary(grid, &accessible)
    } else {
        accessible.iter().map(|v| *v >= 0.0).collect()
    };
    if cancel.load(Ordering::Relaxed) {
        return Err(Cancelled);
    }

    let atoms = locator.atoms();
    let shell: Vec<Point3<f64>> = (0..grid.vertex_count())
        .filter(|&index| exterior[index] && owners[index] != NO_ATOM)
        .filter(|&index| {
            let [x, y, z] = grid.vertex_coords(index);
            grid.neighbors6(x, y, z)
                .any(|[nx, ny, nz]| !exterior[grid.vertex_index(nx, ny, nz)])
        })
        .filter_map(|index| {
            let [x, y, z] = grid.vertex_coords(index);
            let atom = &atoms[owners[index] as usize];
            let offset = grid.vertex_position(x, y, z) - atom.position;
            let length = offset.norm();
            (length > f64::EPSILON)
                .then(|| atom.position + offset * ((atom.radius + probe) / length))
        })
        .collect();
    debug!(
        shell_points = shell.len(),
        connected_only, "Probe-accessible boundary located"
    );

    // Distance to the van der Waals surface differs from the accessible one by the probe.
    let vdw = |index: usize| accessible[index] + probe;
    if shell.is_empty() {
        return Ok((0..grid.vertex_count()).map(vdw).collect());
    }
    let cutoff = 2.0 * grid.spacing;
    let locus = LocusIndex::new(&shell, probe + cutoff);

    sample_slices(grid, cancel, |x, y, z| {
        let index = grid.vertex_index(x, y, z);
        if exterior[index] {
            return vdw(index);
        }
        let point = grid.vertex_position(x, y, z);
        let covered = match locus.nearest_within(&point) {
            Some(distance) => probe - distance,
            None => -cutoff,
        };
        covered.min(vdw(index))
    })
}

/// Uniform bucket hash over probe-locus points for bounded nearest-point queries.
struct LocusIndex {
    cell: f64,
    buckets: HashMap<[i64; 3], Vec<Point3<f64>>>,
}

impl LocusIndex {
    fn new(points: &[Point3<f64>], cell: f64) -> Self {
        let mut buckets: HashMap<[i64; 3], Vec<Point3<f64>>> = HashMap::new();
        for point in points {
            buckets.entry(Self::key(point, cell)).or_default().push(*point);
        }
        Self { cell, buckets }
    }

    fn key(point: &Point3<f64>, cell: f64) -> [i64; 3] {
        [
            (point.x / cell).floor() as i64,
            (point.y / cell).floor() as i64,
            (point.z / cell).floor() as i64,
        ]
    }

    /// Distance to the nearest indexed point, if one lies within one cell size.
    fn nearest_within(&self, point: &Point3<f64>) -> Option<f64> {
        let [kx, ky, kz] = Self::key(point, self.cell);
        let mut best: Option<f64> = None;
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let Some(bucket) = self.buckets.get(&[kx + dx, ky + dy, kz + dz]) else {
                        continue;
                    };
                    for other in bucket {
                        let distance = (other - point).norm();
                        if best.is_none_or(|b| distance < b) {
                            best = Some(distance);
                        }
                    }
                }
            }
        }
        best.filter(|d| *d <= self.cell)
    }
}

/// Samples the scalar field of `surface_type` on every grid vertex, negative inside.
///
/// A non-positive probe radius reduces every surface type to the van der Waals field.
pub fn compute(
    grid: &Grid,
    locator: &AtomLocator,
    surface_type: SurfaceType,
    probe: f64,
    cancel: &AtomicBool,
) -> Result<Vec<f64>, Cancelled> {
    if probe <= 0.0 {
        return sphere_field(grid, locator, 0.0, cancel).map(|(values, _)| values);
    }
    match surface_type {
        SurfaceType::Vdw => sphere_field(grid, locator, 0.0, cancel).map(|(values, _)| values),
        SurfaceType::Sas => sphere_field(grid, locator, probe, cancel).map(|(values, _)| values),
        SurfaceType::Ses => probe_field(grid, locator, probe, true, cancel),
        SurfaceType::Ms => probe_field(grid, locator, probe, false, cancel),
    }
}
