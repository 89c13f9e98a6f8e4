use nalgebra::{Point3, Vector3};

use super::grid::Aabb;

/// Marker in [`Mesh::vertex_atoms`] for a vertex with no owning atom.
pub const UNOWNED: u32 = u32::MAX;

/// An indexed triangle mesh ready for a render backend.
///
/// Once published by a surface job a mesh is never mutated again.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    /// Three vertex indices per triangle, counter-clockwise seen from outside.
    pub indices: Vec<u32>,
    /// Index of the owning atom in the atom list the surface was computed from.
    pub vertex_atoms: Vec<u32>,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(
        vertices: &[Point3<f64>],
        triangles: &[[u32; 3]],
        vertex_atoms: Vec<u32>,
    ) -> Self {
        Self {
            positions: vertices
                .iter()
                .map(|v| [v.x as f32, v.y as f32, v.z as f32])
                .collect(),
            normals: Vec::new(),
            indices: triangles.iter().flatten().copied().collect(),
            vertex_atoms,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]])
    }

    fn position(&self, index: u32) -> Vector3<f32> {
        Vector3::from(self.positions[index as usize])
    }

    /// Keeps only triangles for which `keep` returns true. Vertices are left in
    /// place; call [`Mesh::compact`] to drop the unreferenced ones.
    pub fn retain_triangles(&mut self, mut keep: impl FnMut(&Self, [u32; 3]) -> bool) {
        let kept: Vec<u32> = self
            .triangles()
            .filter(|t| keep(self, *t))
            .flatten()
            .collect();
        self.indices = kept;
    }

    /// Drops triangles touching any vertex owned by an atom outside `shown`.
    pub fn retain_owned_by(&mut self, shown: &[bool]) {
        self.retain_triangles(|mesh, triangle| {
            triangle.iter().all(|&v| {
                let atom = mesh.vertex_atoms[v as usize];
                atom != UNOWNED && shown.get(atom as usize).copied().unwrap_or(false)
            })
        });
    }

    /// Drops triangles whose centroid falls outside `region`.
    pub fn clip_to(&mut self, region: &Aabb) {
        self.retain_triangles(|mesh, [a, b, c]| {
            let centroid = (mesh.position(a) + mesh.position(b) + mesh.position(c)) / 3.0;
            region.contains(&Point3::new(
                centroid.x as f64,
                centroid.y as f64,
                centroid.z as f64,
            ))
        });
    }

    /// Removes vertices no triangle references and renumbers the rest in order.
    pub fn compact(&mut self) {
        let mut remap = vec![u32::MAX; self.positions.len()];
        for &index in &self.indices {
            remap[index as usize] = 0;
        }
        let mut next = 0u32;
        for slot in remap.iter_mut().filter(|slot| **slot == 0) {
            *slot = next;
            next += 1;
        }

        let keep = |i: &usize| remap[*i] != u32::MAX;
        let positions = (0..self.positions.len())
            .filter(keep)
            .map(|i| self.positions[i])
            .collect();
        let vertex_atoms = (0..self.vertex_atoms.len())
            .filter(keep)
            .map(|i| self.vertex_atoms[i])
            .collect();
        let normals = if self.normals.len() == self.positions.len() {
            (0..self.normals.len())
                .filter(keep)
                .map(|i| self.normals[i])
                .collect()
        } else {
            Vec::new()
        };
        for index in &mut self.indices {
            *index = remap[*index as usize];
        }
        self.positions = positions;
        self.vertex_atoms = vertex_atoms;
        self.normals = normals;
    }

    /// Computes normals from triangle winding.
    ///
    /// Smooth shading sums the area-weighted face normals around each shared
    /// vertex. Flat shading gives every triangle its own three vertices.
    pub fn compute_normals(&mut self, smooth: bool) {
        if smooth {
            let mut sums = vec![Vector3::<f32>::zeros(); self.positions.len()];
            for [a, b, c] in self.triangles() {
                // Twice the area, so larger faces weigh more.
                let face = (self.position(b) - self.position(a))
                    .cross(&(self.position(c) - self.position(a)));
                for v in [a, b, c] {
                    sums[v as usize] += face;
                }
            }
            self.normals = sums.into_iter().map(normalized).collect();
            return;
        }

        let mut positions = Vec::with_capacity(self.indices.len());
        let mut normals = Vec::with_capacity(self.indices.len());
        let mut vertex_atoms = Vec::with_capacity(self.indices.len());
        for [a, b, c] in self.triangles() {
            let face = normalized(
                (self.position(b) - self.position(a))
                    .cross(&(self.position(c) - self.position(a))),
            );
            for v in [a, b, c] {
                positions.push(self.positions[v as usize]);
                normals.push(face);
                vertex_atoms.push(self.vertex_atoms.get(v as usize).copied().unwrap_or(UNOWNED));
            }
        }
        self.indices = (0..positions.len() as u32).collect();
        self.positions = positions;
        self.normals = normals;
        self.vertex_atoms = vertex_atoms;
    }

    /// Total surface area.
    pub fn area(&self) -> f64 {
        self.triangles()
            .map(|[a, b, c]| {
                let face = (self.position(b) - self.position(a))
                    .cross(&(self.position(c) - self.position(a)));
                face.norm() as f64 / 2.0
            })
            .sum()
    }
}

fn normalized(v: Vector3<f32>) -> [f32; 3] {
    let n = v.try_normalize(f32::EPSILON).unwrap_or_else(Vector3::zeros);
    [n.x, n.y, n.z]
}
