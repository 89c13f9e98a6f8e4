//! Regular 3D grid holding a scalar field sampled at its vertices.

use nalgebra::{Point3, Vector3};

use super::SurfaceAtom;

/// Corner offsets of a cell, in the order used by the marching cubes tables.
pub const CUBE_CORNERS: [[usize; 3]; 8] = [
    [0, 0, 0],
    [1, 0, 0],
    [1, 1, 0],
    [0, 1, 0],
    [0, 0, 1],
    [1, 0, 1],
    [1, 1, 1],
    [0, 1, 1],
];

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl Aabb {
    /// Box enclosing every atom sphere with its radius grown by `margin`.
    /// `None` for an empty atom set.
    pub fn around(atoms: &[SurfaceAtom], margin: f64) -> Option<Self> {
        let first = atoms.first()?;
        let init = Self {
            min: first.position,
            max: first.position,
        };
        Some(atoms.iter().fold(init, |acc, atom| {
            let reach = Vector3::repeat(atom.radius + margin);
            Self {
                min: acc.min.inf(&(atom.position - reach)),
                max: acc.max.sup(&(atom.position + reach)),
            }
        }))
    }

    pub fn contains(&self, point: &Point3<f64>) -> bool {
        (0..3).all(|i| point[i] >= self.min[i] && point[i] <= self.max[i])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    /// World position of vertex (0, 0, 0).
    pub origin: Point3<f64>,
    pub spacing: f64,
    /// Vertex counts along x, y and z.
    pub dims: [usize; 3],
    /// Layout: `values[x + y * dims[0] + z * dims[0] * dims[1]]`.
    pub values: Vec<f64>,
}

impl Grid {
    /// A grid covering `[min, max]` expanded by `padding`, filled with `fill`.
    pub fn from_bounds(
        min: Point3<f64>,
        max: Point3<f64>,
        spacing: f64,
        padding: f64,
        fill: f64,
    ) -> Self {
        let pad = Vector3::repeat(padding);
        let origin = min - pad;
        let extent = (max + pad) - origin;
        let dims = [
            (extent.x / spacing).ceil() as usize + 1,
            (extent.y / spacing).ceil() as usize + 1,
            (extent.z / spacing).ceil() as usize + 1,
        ];
        Self {
            origin,
            spacing,
            dims,
            values: vec![fill; dims[0] * dims[1] * dims[2]],
        }
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.dims[0] * self.dims[1] * self.dims[2]
    }

    /// Number of vertices in one z slice.
    #[inline]
    pub fn slice_len(&self) -> usize {
        self.dims[0] * self.dims[1]
    }

    #[inline]
    pub fn vertex_index(&self, x: usize, y: usize, z: usize) -> usize {
        x + y * self.dims[0] + z * self.dims[0] * self.dims[1]
    }

    /// Inverse of [`Grid::vertex_index`].
    #[inline]
    pub fn vertex_coords(&self, index: usize) -> [usize; 3] {
        let slice = self.slice_len();
        [index % self.dims[0], (index % slice) / self.dims[0], index / slice]
    }

    #[inline]
    pub fn vertex_position(&self, x: usize, y: usize, z: usize) -> Point3<f64> {
        self.origin + Vector3::new(x as f64, y as f64, z as f64) * self.spacing
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize, z: usize) -> f64 {
        self.values[self.vertex_index(x, y, z)]
    }

    /// Number of cells along each axis.
    pub fn cell_dims(&self) -> [usize; 3] {
        [
            self.dims[0].saturating_sub(1),
            self.dims[1].saturating_sub(1),
            self.dims[2].saturating_sub(1),
        ]
    }

    /// The eight corner values of cell `(x, y, z)`.
    #[inline]
    pub fn cube_values(&self, x: usize, y: usize, z: usize) -> [f64; 8] {
        CUBE_CORNERS.map(|[dx, dy, dz]| self.get(x + dx, y + dy, z + dz))
    }

    /// Whether the vertex lies on the outer face of the grid.
    pub fn is_boundary(&self, x: usize, y: usize, z: usize) -> bool {
        x == 0
            || y == 0
            || z == 0
            || x + 1 == self.dims[0]
            || y + 1 == self.dims[1]
            || z + 1 == self.dims[2]
    }

    /// Face-adjacent neighbours of a vertex.
    pub fn neighbors6(&self, x: usize, y: usize, z: usize) -> impl Iterator<Item = [usize; 3]> + '_ {
        const STEPS: [[isize; 3]; 6] = [
            [-1, 0, 0],
            [1, 0, 0],
            [0, -1, 0],
            [0, 1, 0],
            [0, 0, -1],
            [0, 0, 1],
        ];
        STEPS.into_iter().filter_map(move |[dx, dy, dz]| {
            let nx = x.checked_add_signed(dx)?;
            let ny = y.checked_add_signed(dy)?;
            let nz = z.checked_add_signed(dz)?;
            (nx < self.dims[0] && ny < self.dims[1] && nz < self.dims[2]).then_some([nx, ny, nz])
        })
    }
}
